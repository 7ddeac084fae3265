use std::fmt;

/// A mailbox that matched a `LIST` command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailboxName {
    /// The mailbox name. When returned by
    /// [`Session::list_mailboxes`](crate::Session::list_mailboxes) this is the full address,
    /// server part included.
    pub name: String,
    /// The hierarchy delimiter, e.g. `.` or `/`. `None` means the name is flat.
    pub delimiter: Option<String>,
    /// Attributes the server reported for the name.
    pub attributes: Vec<NameAttribute>,
}

impl MailboxName {
    /// A name without attributes.
    pub fn new<S: Into<String>>(name: S, delimiter: Option<&str>) -> Self {
        MailboxName {
            name: name.into(),
            delimiter: delimiter.map(str::to_string),
            attributes: Vec::new(),
        }
    }

    /// Whether the name can be used as an argument to `SELECT`.
    pub fn is_selectable(&self) -> bool {
        !self.attributes.contains(&NameAttribute::NoSelect)
    }
}

impl fmt::Display for MailboxName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// An attribute set for an IMAP name.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum NameAttribute {
    /// No child levels exist now and none can be created in the future.
    NoInferiors,

    /// It is not possible to use this name as a selectable mailbox.
    NoSelect,

    /// The mailbox has been marked "interesting" by the server.
    Marked,

    /// The mailbox does not contain any additional messages since the
    /// last time the mailbox was selected.
    Unmarked,

    /// A non-standard user- or server-defined name attribute.
    Custom(String),
}

impl<'a> From<&'a str> for NameAttribute {
    fn from(s: &'a str) -> Self {
        match s {
            "\\Noinferiors" => NameAttribute::NoInferiors,
            "\\Noselect" => NameAttribute::NoSelect,
            "\\Marked" => NameAttribute::Marked,
            "\\Unmarked" => NameAttribute::Unmarked,
            _ => NameAttribute::Custom(s.to_string()),
        }
    }
}
