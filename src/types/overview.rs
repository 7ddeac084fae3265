use super::{EnumSet, MessageFlag, Uid};

/// The lightweight summary of a message a server returns without touching its body.
///
/// Subject and date are kept exactly as the server sent them; decoding happens when a
/// [`Message`](crate::Message) is built.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Overview {
    /// The message uid.
    pub uid: Uid,
    /// The raw, possibly encoded-word, subject.
    pub subject: Option<String>,
    /// The raw `Date` header value.
    pub date: Option<String>,
    /// RFC 822 size in octets.
    pub size: u32,
    /// System flags set on the message.
    pub flags: EnumSet<MessageFlag>,
}

impl Overview {
    /// Whether `flag` is set.
    pub fn has(&self, flag: MessageFlag) -> bool {
        self.flags.contains(flag)
    }
}
