//! Value types shared by the session, message and transport layers.

pub use enumset::EnumSet;

/// From section [2.3.1.1 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-2.3.1.1).
///
/// A 32-bit value assigned to each message, which when used with the unique identifier validity
/// value forms a 64-bit value that will not refer to any other message in the mailbox or any
/// subsequent mailbox with the same name forever. Unique identifiers are assigned in a strictly
/// ascending fashion in the mailbox. Unlike message sequence numbers, unique identifiers are not
/// necessarily contiguous.
///
/// The unique identifier of a message will not change during the session, and will generally not
/// change between sessions.
pub type Uid = u32;

/// From section [2.3.1.2 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-2.3.1.2).
///
/// A relative position from 1 to the number of messages in the mailbox. This position is ordered
/// by ascending unique identifier. As each new message is added, it is assigned a message
/// sequence number that is 1 higher than the number of messages in the mailbox before that new
/// message was added.
///
/// Message sequence numbers can be reassigned during the session. For example, when a message is
/// permanently removed (expunged) from the mailbox, the message sequence number for all subsequent
/// messages is decremented.
pub type Seq = u32;

mod flag;
pub use self::flag::{system_names, MessageFlag};

mod connection_flag;
pub use self::connection_flag::{ConnectionFlag, FlagEntry, FlagValue};

mod address;
pub use self::address::Address;

mod overview;
pub use self::overview::Overview;

mod name;
pub use self::name::{MailboxName, NameAttribute};

mod structure;
pub use self::structure::{BodyPart, MediaType, TransferEncoding};

mod sequence;
pub use self::sequence::SequenceSet;
