use std::fmt;

/// A single mailbox from an address header such as `From` or `Cc`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Address {
    /// The `local@domain` part. Empty for the placeholder sender of a message without `From`.
    pub address: String,
    /// The decoded display name, if the header carried one.
    pub name: Option<String>,
}

impl Address {
    /// An address with an optional display name.
    pub fn new<S: Into<String>>(address: S, name: Option<String>) -> Self {
        Address {
            address: address.into(),
            name,
        }
    }
}

/// Renders `Name <addr>` when a display name exists, the bare address otherwise.
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(ref name) if !name.is_empty() => write!(f, "{} <{}>", name, self.address),
            _ => f.write_str(&self.address),
        }
    }
}
