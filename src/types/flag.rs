use std::fmt;

use enumset::{EnumSet, EnumSetType};

use crate::error::{Error, Result};

/// With the exception of [`MessageFlag::Recent`], these are the system flags a client may set or
/// clear on a message, as described in [RFC 3501 section
/// 2.3.2](https://tools.ietf.org/html/rfc3501#section-2.3.2).
///
/// Keywords (non-system flags) are not part of this vocabulary and are rejected by
/// [`MessageFlag::normalize`].
#[derive(EnumSetType, Debug)]
pub enum MessageFlag {
    /// Message is "recently" arrived in this mailbox. This flag is managed by the server and can
    /// not be altered by the client.
    Recent,

    /// Message is "flagged" for urgent/special attention
    Flagged,

    /// Message has been answered
    Answered,

    /// Message is "deleted" for removal by later EXPUNGE
    Deleted,

    /// Message has been read
    Seen,

    /// Message has not completed composition (marked as a draft).
    Draft,
}

impl MessageFlag {
    /// Every flag of the vocabulary, in the order overviews report them.
    pub const ALL: [MessageFlag; 6] = [
        MessageFlag::Recent,
        MessageFlag::Flagged,
        MessageFlag::Answered,
        MessageFlag::Deleted,
        MessageFlag::Seen,
        MessageFlag::Draft,
    ];

    /// The lower-case name of the flag, without the leading backslash.
    pub fn name(self) -> &'static str {
        match self {
            MessageFlag::Recent => "recent",
            MessageFlag::Flagged => "flagged",
            MessageFlag::Answered => "answered",
            MessageFlag::Deleted => "deleted",
            MessageFlag::Seen => "seen",
            MessageFlag::Draft => "draft",
        }
    }

    /// The flag as it is spelled on the wire, e.g. `\Seen`.
    pub fn system_name(self) -> &'static str {
        match self {
            MessageFlag::Recent => "\\Recent",
            MessageFlag::Flagged => "\\Flagged",
            MessageFlag::Answered => "\\Answered",
            MessageFlag::Deleted => "\\Deleted",
            MessageFlag::Seen => "\\Seen",
            MessageFlag::Draft => "\\Draft",
        }
    }

    /// Whether a client may set or clear this flag.
    pub fn is_settable(self) -> bool {
        self != MessageFlag::Recent
    }

    /// Parse a flag as the server reports it (`\Seen`, `\Deleted`, ...). Keywords and the `\*`
    /// pseudo-flag yield `None`.
    pub fn from_system(s: &str) -> Option<Self> {
        let name = s.strip_prefix('\\')?;
        MessageFlag::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// Normalize a user-supplied flag name: leading backslashes are stripped and case is ignored.
    ///
    /// Names outside the vocabulary are rejected with [`Error::InvalidArgument`].
    pub fn normalize(name: &str) -> Result<Self> {
        let normalized = name.trim_start_matches('\\').to_ascii_lowercase();
        MessageFlag::ALL
            .iter()
            .copied()
            .find(|f| f.name() == normalized)
            .ok_or(Error::InvalidArgument(normalized))
    }
}

impl fmt::Display for MessageFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.system_name())
    }
}

/// Render a set of flags the way `STORE` expects them: `\Seen \Flagged`.
pub fn system_names(flags: EnumSet<MessageFlag>) -> String {
    crate::utils::iter_join(flags.iter(), " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_backslash_and_case() {
        assert_eq!(MessageFlag::normalize("\\SEEN").unwrap(), MessageFlag::Seen);
        assert_eq!(MessageFlag::normalize("Flagged").unwrap(), MessageFlag::Flagged);
        assert_eq!(MessageFlag::normalize("\\\\draft").unwrap(), MessageFlag::Draft);
    }

    #[test]
    fn normalize_rejects_unknown() {
        match MessageFlag::normalize("\\Bogus") {
            Err(Error::InvalidArgument(name)) => assert_eq!(name, "bogus"),
            r => panic!("unexpected result {:?}", r),
        }
    }

    #[test]
    fn from_system() {
        assert_eq!(MessageFlag::from_system("\\Seen"), Some(MessageFlag::Seen));
        assert_eq!(MessageFlag::from_system("\\RECENT"), Some(MessageFlag::Recent));
        assert_eq!(MessageFlag::from_system("$Forwarded"), None);
        assert_eq!(MessageFlag::from_system("\\*"), None);
    }

    #[test]
    fn store_rendering() {
        let flags = MessageFlag::Seen | MessageFlag::Flagged;
        assert_eq!(system_names(flags), "\\Flagged \\Seen");
    }
}
