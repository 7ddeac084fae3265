//! The primitives a [`Session`](crate::Session) needs from something that already speaks to a
//! mail server.
//!
//! A [`Connector`] opens a [`Transport`] for a mailbox address; the transport then serves every
//! per-stream request. [`TcpConnector`](crate::TcpConnector) is an implementation over a real
//! IMAP connection; the `testing` module has an in-memory one.

use enumset::EnumSet;

use crate::config::{AuthParams, MailOption, OpenOption};
use crate::error::Result;
use crate::extensions::sort::SortCriterion;
use crate::types::{BodyPart, MailboxName, MessageFlag, Overview, Seq, SequenceSet, Uid};

/// Everything needed to open a stream.
#[derive(Clone, Copy, Debug)]
pub struct OpenRequest<'a> {
    /// The full `{host...}mailbox` address.
    pub address: &'a str,
    /// Login name, if any.
    pub username: Option<&'a str>,
    /// Password, if any.
    pub password: Option<&'a str>,
    /// Open options.
    pub options: EnumSet<OpenOption>,
    /// Authentication parameters.
    pub params: &'a AuthParams,
}

/// Opens transports.
pub trait Connector {
    /// The stream this connector produces.
    type Transport: Transport;

    /// Open a stream on the mailbox named by `request.address`.
    fn open(&mut self, request: &OpenRequest<'_>) -> Result<Self::Transport>;
}

/// A stream on one mailbox of a server.
///
/// Message numbers are uids unless a method says otherwise. Soft failures, such as a server
/// refusing to create a mailbox, are reported as `Ok(false)`; `Err` is kept for failures of the
/// stream itself.
pub trait Transport {
    /// Re-point the stream at another mailbox address on the same server.
    fn reopen(&mut self, address: &str, options: EnumSet<OpenOption>) -> Result<()>;

    /// Number of messages in the open mailbox.
    fn num_messages(&mut self) -> Result<u32>;

    /// The uid of the message with sequence number `seq`.
    fn uid_for_sequence(&mut self, seq: Seq) -> Result<Option<Uid>>;

    /// Overview records for `uid`; empty if there is no such message.
    fn fetch_overview(&mut self, uid: Uid) -> Result<Vec<Overview>>;

    /// The raw header block of `uid`.
    fn fetch_header(&mut self, uid: Uid) -> Result<Vec<u8>>;

    /// The MIME structure of `uid`.
    fn fetch_structure(&mut self, uid: Uid) -> Result<BodyPart>;

    /// The still-encoded body of part `section` of `uid`, or the whole body text when `section`
    /// is `None`.
    fn fetch_body(&mut self, uid: Uid, section: Option<&str>) -> Result<Vec<u8>>;

    /// Uids matching `criteria`, in the order the server returned them.
    fn search(&mut self, criteria: &str) -> Result<Vec<Uid>>;

    /// Every uid of the mailbox, sorted by `criterion`.
    fn sort(&mut self, criterion: SortCriterion, reverse: bool) -> Result<Vec<Uid>>;

    /// Set (`enable`) or clear flags on the messages in `set`.
    fn store_flags(
        &mut self,
        set: &SequenceSet,
        flags: EnumSet<MessageFlag>,
        enable: bool,
        options: EnumSet<MailOption>,
    ) -> Result<bool>;

    /// Copy the messages in `set` to the mailbox at `destination` (a full address). With
    /// [`MailOption::Move`] the originals are marked deleted.
    fn copy(
        &mut self,
        set: &SequenceSet,
        destination: &str,
        options: EnumSet<MailOption>,
    ) -> Result<bool>;

    /// Mark the messages in `set` deleted.
    fn delete(&mut self, set: &SequenceSet, options: EnumSet<MailOption>) -> Result<bool> {
        self.store_flags(set, EnumSet::only(MessageFlag::Deleted), true, options)
    }

    /// Clear the deleted mark of the messages in `set`.
    fn undelete(&mut self, set: &SequenceSet, options: EnumSet<MailOption>) -> Result<bool> {
        self.store_flags(set, EnumSet::only(MessageFlag::Deleted), false, options)
    }

    /// Mailboxes matching `pattern` below `reference` (a full address).
    fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<MailboxName>>;

    /// Create the mailbox at `address`.
    fn create_mailbox(&mut self, address: &str) -> Result<bool>;

    /// Delete the mailbox at `address`.
    fn delete_mailbox(&mut self, address: &str) -> Result<bool>;

    /// Permanently remove messages marked deleted from the open mailbox.
    fn expunge(&mut self) -> Result<bool>;
}
