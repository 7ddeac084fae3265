//! Sort keys for the IMAP SORT extension specified in [RFC
//! 5256](https://tools.ietf.org/html/rfc5256#section-3).
//!
//! [`Session::ordered_messages`](crate::Session::ordered_messages) takes a single
//! [`SortCriterion`] and a reverse switch; transports render the pair as a parenthesized
//! criteria list followed by the mandatory charset.

use std::fmt;

/// The order a mailbox listing can be sorted in. If the associated
/// [RFC-822](https://tools.ietf.org/html/rfc822) header for a particular criterion is absent,
/// it is treated as the empty string. The empty string always collates before non-empty strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortCriterion {
    /// Internal date and time of the message.
    Arrival,

    /// addr-mailbox of the first "cc" address.
    Cc,

    /// Sent date and time, as described in
    /// [section 2.2](https://tools.ietf.org/html/rfc5256#section-2.2).
    Date,

    /// addr-mailbox of the first "From" address.
    From,

    /// Size of the message in octets.
    Size,

    /// Base subject text.
    Subject,

    /// addr-mailbox of the first "To" address.
    To,
}

impl fmt::Display for SortCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use SortCriterion::*;

        match self {
            Arrival => write!(f, "ARRIVAL"),
            Cc => write!(f, "CC"),
            Date => write!(f, "DATE"),
            From => write!(f, "FROM"),
            Size => write!(f, "SIZE"),
            Subject => write!(f, "SUBJECT"),
            To => write!(f, "TO"),
        }
    }
}

/// A criterion together with its direction, rendered as `(DATE)` or `(REVERSE DATE)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SortCriteria {
    pub(crate) criterion: SortCriterion,
    pub(crate) reverse: bool,
}

impl fmt::Display for SortCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reverse {
            write!(f, "(REVERSE {})", self.criterion)
        } else {
            write!(f, "({})", self.criterion)
        }
    }
}

/// The charset argument is mandatory (unlike SEARCH) and indicates
/// the CHARSET of the strings that appear in the searching
/// criteria. The US-ASCII and UTF-8 charsets MUST be implemented.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SortCharset {
    /// Mandatory UTF-8
    Utf8,

    /// Mandatory US-ASCII
    #[allow(dead_code)]
    UsAscii,
}

impl fmt::Display for SortCharset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortCharset::Utf8 => write!(f, "UTF-8"),
            SortCharset::UsAscii => write!(f, "US-ASCII"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_criterion_to_string() {
        use SortCriterion::*;

        assert_eq!("ARRIVAL", Arrival.to_string());
        assert_eq!("CC", Cc.to_string());
        assert_eq!("DATE", Date.to_string());
        assert_eq!("FROM", From.to_string());
        assert_eq!("SIZE", Size.to_string());
        assert_eq!("SUBJECT", Subject.to_string());
        assert_eq!("TO", To.to_string());
    }

    #[test]
    fn test_criteria_to_string() {
        let forward = SortCriteria {
            criterion: SortCriterion::Arrival,
            reverse: false,
        };
        assert_eq!("(ARRIVAL)", forward.to_string());
        let backward = SortCriteria {
            criterion: SortCriterion::Date,
            reverse: true,
        };
        assert_eq!("(REVERSE DATE)", backward.to_string());
    }

    #[test]
    fn test_charset_to_string() {
        assert_eq!("UTF-8", SortCharset::Utf8.to_string());
        assert_eq!("US-ASCII", SortCharset::UsAscii.to_string());
    }
}
