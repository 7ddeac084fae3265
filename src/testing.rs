//! An in-memory mail server for testing code built on [`Session`](crate::Session).
//!
//! Enable the `test_helpers` feature to use it outside this crate:
//!
//! ```toml
//! [dependencies]
//! imap-session = { version = "0.1" }
//!
//! [dev-dependencies]
//! # mirror the same configuration your dependencies and add test_helpers
//! imap-session = { version = "0.1", features = ["test_helpers"] }
//! ```
//!
//! ```ignore
//! use imap_session::testing::{MemoryServer, StoredMessage};
//! use imap_session::Session;
//!
//! let server = MemoryServer::new().with_mailbox("Archive");
//! server.append("INBOX", StoredMessage::text("Subject: hi\r\n\r\n", "hello"));
//!
//! let mut session = Session::new("mail.example.org", server.connector());
//! let messages = session.search("ALL", None).unwrap();
//! assert_eq!(messages[0].plaintext_body(), Some("hello"));
//! ```
//!
//! Mailboxes are flat names in one shared store; every session opened from the same
//! [`MemoryServer`] sees the same messages. An empty mailbox name means `INBOX`.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::rc::Rc;

use enumset::EnumSet;

use crate::config::{MailOption, OpenOption};
use crate::error::{Error, Result};
use crate::extensions::sort::SortCriterion;
use crate::headers::Headers;
use crate::server::mailbox_of;
use crate::transport::{Connector, OpenRequest, Transport};
use crate::types::{
    BodyPart, MailboxName, MediaType, MessageFlag, Overview, Seq, SequenceSet, Uid,
};

const INBOX: &str = "INBOX";
const DELIMITER: char = '.';

/// A message as the server stores it.
#[derive(Clone, Debug)]
pub struct StoredMessage {
    header: Vec<u8>,
    structure: BodyPart,
    body: Vec<u8>,
    sections: BTreeMap<String, Vec<u8>>,
    flags: EnumSet<MessageFlag>,
}

impl StoredMessage {
    /// A message with the given header block, structure, and whole-body text.
    pub fn new(header: &str, structure: BodyPart, body: &[u8]) -> Self {
        StoredMessage {
            header: header.as_bytes().to_vec(),
            structure,
            body: body.to_vec(),
            sections: BTreeMap::new(),
            flags: EnumSet::new(),
        }
    }

    /// A single-part `text/plain; charset=utf-8` message.
    pub fn text(header: &str, body: &str) -> Self {
        let structure = BodyPart::leaf(MediaType::Text, "plain")
            .with_param("charset", "utf-8")
            .with_octets(body.len() as u32);
        StoredMessage::new(header, structure, body.as_bytes())
    }

    /// Set the encoded content of body part `id`, e.g. `2.1`.
    pub fn with_section(mut self, id: &str, data: &[u8]) -> Self {
        self.sections.insert(id.to_string(), data.to_vec());
        self
    }

    /// Set the flags the message starts with.
    pub fn with_flags(mut self, flags: EnumSet<MessageFlag>) -> Self {
        self.flags = flags;
        self
    }

    fn headers(&self) -> Headers {
        Headers::parse(&self.header).unwrap_or_default()
    }

    fn size(&self) -> u32 {
        (self.header.len() + self.body.len()) as u32
    }

    fn overview(&self, uid: Uid) -> Overview {
        let headers = self.headers();
        Overview {
            uid,
            subject: headers.get("Subject").map(str::to_string),
            date: headers.get("Date").map(str::to_string),
            size: self.size(),
            flags: self.flags,
        }
    }
}

#[derive(Debug, Default)]
struct Store {
    mailboxes: BTreeMap<String, Vec<(Uid, StoredMessage)>>,
    next_uid: Uid,
    credentials: Option<(String, String)>,
    open_failure: Option<String>,
    opened: Vec<String>,
    fetched: Vec<Option<String>>,
}

impl Store {
    fn messages(&self, mailbox: &str) -> Result<&Vec<(Uid, StoredMessage)>> {
        self.mailboxes
            .get(mailbox)
            .ok_or_else(|| Error::No(format!("Mailbox doesn't exist: {}", mailbox)))
    }

    fn messages_mut(&mut self, mailbox: &str) -> Result<&mut Vec<(Uid, StoredMessage)>> {
        self.mailboxes
            .get_mut(mailbox)
            .ok_or_else(|| Error::No(format!("Mailbox doesn't exist: {}", mailbox)))
    }

    fn message(&self, mailbox: &str, uid: Uid) -> Result<&StoredMessage> {
        self.messages(mailbox)?
            .iter()
            .find(|(u, _)| *u == uid)
            .map(|(_, m)| m)
            .ok_or_else(|| Error::No(format!("No message with uid {}", uid)))
    }

    fn push(&mut self, mailbox: &str, message: StoredMessage) -> Result<Uid> {
        self.next_uid += 1;
        let uid = self.next_uid;
        self.messages_mut(mailbox)?.push((uid, message));
        Ok(uid)
    }
}

fn mailbox_name(address: &str) -> String {
    match mailbox_of(address) {
        "" => INBOX.to_string(),
        name => name.to_string(),
    }
}

/// A shared in-memory store of mailboxes. Clones share the store.
#[derive(Clone, Debug)]
pub struct MemoryServer {
    store: Rc<RefCell<Store>>,
}

impl Default for MemoryServer {
    fn default() -> Self {
        MemoryServer::new()
    }
}

impl MemoryServer {
    /// A server with an empty `INBOX`.
    pub fn new() -> Self {
        let mut store = Store::default();
        store.mailboxes.insert(INBOX.to_string(), Vec::new());
        MemoryServer {
            store: Rc::new(RefCell::new(store)),
        }
    }

    /// Add an empty mailbox.
    pub fn with_mailbox(self, name: &str) -> Self {
        self.store
            .borrow_mut()
            .mailboxes
            .entry(name.to_string())
            .or_default();
        self
    }

    /// Only accept logins with these credentials.
    pub fn with_credentials(self, username: &str, password: &str) -> Self {
        self.store.borrow_mut().credentials = Some((username.to_string(), password.to_string()));
        self
    }

    /// Refuse every subsequent open with a `NO` carrying `text`.
    pub fn fail_open_with(&self, text: &str) {
        self.store.borrow_mut().open_failure = Some(text.to_string());
    }

    /// Store `message` in `mailbox`, creating the mailbox if needed, and return its uid.
    pub fn append(&self, mailbox: &str, message: StoredMessage) -> Uid {
        let mut store = self.store.borrow_mut();
        store.next_uid += 1;
        let uid = store.next_uid;
        store
            .mailboxes
            .entry(mailbox.to_string())
            .or_default()
            .push((uid, message));
        uid
    }

    /// Whether `mailbox` exists.
    pub fn has_mailbox(&self, mailbox: &str) -> bool {
        self.store.borrow().mailboxes.contains_key(mailbox)
    }

    /// Uids in `mailbox`, in sequence order.
    pub fn uids(&self, mailbox: &str) -> Vec<Uid> {
        self.store
            .borrow()
            .mailboxes
            .get(mailbox)
            .map(|m| m.iter().map(|(uid, _)| *uid).collect())
            .unwrap_or_default()
    }

    /// Flags of one message.
    pub fn flags(&self, mailbox: &str, uid: Uid) -> Option<EnumSet<MessageFlag>> {
        self.store
            .borrow()
            .message(mailbox, uid)
            .ok()
            .map(|m| m.flags)
    }

    /// Every address a stream was opened or reopened on, in order.
    pub fn opened(&self) -> Vec<String> {
        self.store.borrow().opened.clone()
    }

    /// Every body section fetched so far, `None` standing for the whole body.
    pub fn fetched_sections(&self) -> Vec<Option<String>> {
        self.store.borrow().fetched.clone()
    }

    /// A connector opening streams on this server.
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            store: Rc::clone(&self.store),
        }
    }
}

/// Opens [`MemoryTransport`]s on a [`MemoryServer`].
#[derive(Clone, Debug)]
pub struct MemoryConnector {
    store: Rc<RefCell<Store>>,
}

impl Connector for MemoryConnector {
    type Transport = MemoryTransport;

    fn open(&mut self, request: &OpenRequest<'_>) -> Result<MemoryTransport> {
        {
            let store = self.store.borrow();
            if let Some(ref text) = store.open_failure {
                return Err(Error::No(text.clone()));
            }
            if let Some((ref user, ref pass)) = store.credentials {
                if request.username != Some(user.as_str()) || request.password != Some(pass.as_str())
                {
                    return Err(Error::No(
                        "[AUTHENTICATIONFAILED] Authentication failed.".to_string(),
                    ));
                }
            }
        }
        let mut transport = MemoryTransport {
            store: Rc::clone(&self.store),
            mailbox: String::new(),
        };
        transport.reopen(request.address, request.options)?;
        Ok(transport)
    }
}

/// A stream on one mailbox of a [`MemoryServer`].
#[derive(Debug)]
pub struct MemoryTransport {
    store: Rc<RefCell<Store>>,
    mailbox: String,
}

impl MemoryTransport {
    fn matching(&self, set: &SequenceSet, options: EnumSet<MailOption>) -> Result<Vec<Uid>> {
        let store = self.store.borrow();
        let messages = store.messages(&self.mailbox)?;
        let by_uid = options.contains(MailOption::Uid);
        let last = if by_uid {
            messages.last().map(|(uid, _)| *uid).unwrap_or(0)
        } else {
            messages.len() as u32
        };
        Ok(messages
            .iter()
            .enumerate()
            .filter(|(i, (uid, _))| {
                let n = if by_uid { *uid } else { *i as u32 + 1 };
                set.contains(n, last)
            })
            .map(|(_, (uid, _))| *uid)
            .collect())
    }
}

fn search_key(key: &str, flags: EnumSet<MessageFlag>) -> Result<bool> {
    Ok(match key {
        "ALL" => true,
        "RECENT" | "NEW" => flags.contains(MessageFlag::Recent),
        "OLD" => !flags.contains(MessageFlag::Recent),
        "SEEN" => flags.contains(MessageFlag::Seen),
        "UNSEEN" => !flags.contains(MessageFlag::Seen),
        "FLAGGED" => flags.contains(MessageFlag::Flagged),
        "UNFLAGGED" => !flags.contains(MessageFlag::Flagged),
        "DELETED" => flags.contains(MessageFlag::Deleted),
        "UNDELETED" => !flags.contains(MessageFlag::Deleted),
        "ANSWERED" => flags.contains(MessageFlag::Answered),
        "UNANSWERED" => !flags.contains(MessageFlag::Answered),
        "DRAFT" => flags.contains(MessageFlag::Draft),
        "UNDRAFT" => !flags.contains(MessageFlag::Draft),
        other => return Err(Error::Bad(format!("Unsupported search key {}", other))),
    })
}

fn sort_key(criterion: SortCriterion, uid: Uid, message: &StoredMessage) -> (i64, String) {
    let headers = message.headers();
    let text = |name: &str| headers.get(name).unwrap_or("").to_lowercase();
    match criterion {
        SortCriterion::Arrival => (i64::from(uid), String::new()),
        SortCriterion::Size => (i64::from(message.size()), String::new()),
        SortCriterion::Date => (
            headers
                .get("Date")
                .and_then(|d| mailparse::dateparse(d).ok())
                .unwrap_or(0),
            String::new(),
        ),
        SortCriterion::Subject => (0, text("Subject")),
        SortCriterion::From => (0, text("From")),
        SortCriterion::To => (0, text("To")),
        SortCriterion::Cc => (0, text("Cc")),
    }
}

fn pattern_matches(pattern: &[char], name: &[char]) -> bool {
    match pattern.split_first() {
        None => name.is_empty(),
        Some((&'*', rest)) => (0..=name.len()).any(|i| pattern_matches(rest, &name[i..])),
        Some((&'%', rest)) => {
            for i in 0..=name.len() {
                if pattern_matches(rest, &name[i..]) {
                    return true;
                }
                if i < name.len() && name[i] == DELIMITER {
                    break;
                }
            }
            false
        }
        Some((c, rest)) => name.first() == Some(c) && pattern_matches(rest, &name[1..]),
    }
}

impl Transport for MemoryTransport {
    fn reopen(&mut self, address: &str, options: EnumSet<OpenOption>) -> Result<()> {
        let mailbox = mailbox_name(address);
        let mut store = self.store.borrow_mut();
        if !options.contains(OpenOption::HalfOpen) {
            store.messages(&mailbox)?;
        }
        store.opened.push(address.to_string());
        self.mailbox = mailbox;
        Ok(())
    }

    fn num_messages(&mut self) -> Result<u32> {
        Ok(self.store.borrow().messages(&self.mailbox)?.len() as u32)
    }

    fn uid_for_sequence(&mut self, seq: Seq) -> Result<Option<Uid>> {
        let store = self.store.borrow();
        let messages = store.messages(&self.mailbox)?;
        Ok(seq
            .checked_sub(1)
            .and_then(|i| messages.get(i as usize))
            .map(|(uid, _)| *uid))
    }

    fn fetch_overview(&mut self, uid: Uid) -> Result<Vec<Overview>> {
        let store = self.store.borrow();
        Ok(store
            .message(&self.mailbox, uid)
            .map(|m| vec![m.overview(uid)])
            .unwrap_or_default())
    }

    fn fetch_header(&mut self, uid: Uid) -> Result<Vec<u8>> {
        Ok(self.store.borrow().message(&self.mailbox, uid)?.header.clone())
    }

    fn fetch_structure(&mut self, uid: Uid) -> Result<BodyPart> {
        Ok(self
            .store
            .borrow()
            .message(&self.mailbox, uid)?
            .structure
            .clone())
    }

    fn fetch_body(&mut self, uid: Uid, section: Option<&str>) -> Result<Vec<u8>> {
        let mut store = self.store.borrow_mut();
        let data = {
            let message = store.message(&self.mailbox, uid)?;
            match section {
                Some(id) => message.sections.get(id).cloned().unwrap_or_default(),
                None => message.body.clone(),
            }
        };
        store.fetched.push(section.map(str::to_string));
        Ok(data)
    }

    fn search(&mut self, criteria: &str) -> Result<Vec<Uid>> {
        let keys: Vec<String> = criteria
            .split_whitespace()
            .map(|k| k.to_ascii_uppercase())
            .collect();
        let store = self.store.borrow();
        let mut uids = Vec::new();
        for (uid, message) in store.messages(&self.mailbox)? {
            let mut matched = true;
            for key in &keys {
                matched &= search_key(key, message.flags)?;
            }
            if matched {
                uids.push(*uid);
            }
        }
        Ok(uids)
    }

    fn sort(&mut self, criterion: SortCriterion, reverse: bool) -> Result<Vec<Uid>> {
        let store = self.store.borrow();
        let mut keyed: Vec<((i64, String), Uid)> = store
            .messages(&self.mailbox)?
            .iter()
            .map(|(uid, m)| (sort_key(criterion, *uid, m), *uid))
            .collect();
        keyed.sort_by(|(a, ua), (b, ub)| {
            let order = a.cmp(b);
            let order = if reverse { order.reverse() } else { order };
            match order {
                Ordering::Equal => ua.cmp(ub),
                o => o,
            }
        });
        Ok(keyed.into_iter().map(|(_, uid)| uid).collect())
    }

    fn store_flags(
        &mut self,
        set: &SequenceSet,
        flags: EnumSet<MessageFlag>,
        enable: bool,
        options: EnumSet<MailOption>,
    ) -> Result<bool> {
        let uids = self.matching(set, options)?;
        let mut store = self.store.borrow_mut();
        for (uid, message) in store.messages_mut(&self.mailbox)? {
            if uids.contains(uid) {
                if enable {
                    message.flags |= flags;
                } else {
                    message.flags -= flags;
                }
            }
        }
        Ok(true)
    }

    fn copy(
        &mut self,
        set: &SequenceSet,
        destination: &str,
        options: EnumSet<MailOption>,
    ) -> Result<bool> {
        let target = mailbox_name(destination);
        let uids = self.matching(set, options)?;
        let mut store = self.store.borrow_mut();
        if !store.mailboxes.contains_key(&target) {
            return Ok(false);
        }
        let copies: Vec<StoredMessage> = store
            .messages(&self.mailbox)?
            .iter()
            .filter(|(uid, _)| uids.contains(uid))
            .map(|(_, m)| m.clone())
            .collect();
        for message in copies {
            store.push(&target, message)?;
        }
        if options.contains(MailOption::Move) {
            for (uid, message) in store.messages_mut(&self.mailbox)? {
                if uids.contains(uid) {
                    message.flags |= MessageFlag::Deleted;
                }
            }
        }
        Ok(true)
    }

    fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<MailboxName>> {
        let full: Vec<char> = format!("{}{}", mailbox_of(reference), pattern)
            .chars()
            .collect();
        let store = self.store.borrow();
        Ok(store
            .mailboxes
            .keys()
            .filter(|name| pattern_matches(&full, &name.chars().collect::<Vec<_>>()))
            .map(|name| MailboxName::new(name.as_str(), Some(".")))
            .collect())
    }

    fn create_mailbox(&mut self, address: &str) -> Result<bool> {
        let name = mailbox_of(address);
        let mut store = self.store.borrow_mut();
        if name.is_empty() || store.mailboxes.contains_key(name) {
            return Ok(false);
        }
        store.mailboxes.insert(name.to_string(), Vec::new());
        Ok(true)
    }

    fn delete_mailbox(&mut self, address: &str) -> Result<bool> {
        let name = mailbox_of(address);
        if name.eq_ignore_ascii_case(INBOX) {
            return Ok(false);
        }
        Ok(self.store.borrow_mut().mailboxes.remove(name).is_some())
    }

    fn expunge(&mut self) -> Result<bool> {
        let mut store = self.store.borrow_mut();
        store
            .messages_mut(&self.mailbox)?
            .retain(|(_, m)| !m.flags.contains(MessageFlag::Deleted));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn list_patterns() {
        assert!(pattern_matches(&chars("*"), &chars("INBOX.Sent")));
        assert!(pattern_matches(&chars("INBOX.%"), &chars("INBOX.Sent")));
        assert!(!pattern_matches(&chars("%"), &chars("INBOX.Sent")));
        assert!(pattern_matches(&chars("%"), &chars("INBOX")));
        assert!(!pattern_matches(&chars("Sent"), &chars("INBOX.Sent")));
    }

    #[test]
    fn open_checks_credentials() {
        let server = MemoryServer::new().with_credentials("joe", "secret");
        let params = Default::default();
        let mut request = OpenRequest {
            address: "{h}",
            username: Some("joe"),
            password: Some("wrong"),
            options: EnumSet::new(),
            params: &params,
        };
        assert!(matches!(server.connector().open(&request), Err(Error::No(_))));
        request.password = Some("secret");
        assert!(server.connector().open(&request).is_ok());
        assert_eq!(server.opened(), vec!["{h}".to_string()]);
    }

    #[test]
    fn open_missing_mailbox() {
        let server = MemoryServer::new();
        let params = Default::default();
        let mut request = OpenRequest {
            address: "{h}Nope",
            username: None,
            password: None,
            options: EnumSet::new(),
            params: &params,
        };
        assert!(server.connector().open(&request).is_err());
        request.options = EnumSet::only(OpenOption::HalfOpen);
        assert!(server.connector().open(&request).is_ok());
    }

    #[test]
    fn unknown_search_key() {
        let server = MemoryServer::new();
        server.append("INBOX", StoredMessage::text("Subject: x\r\n\r\n", "x"));
        let params = Default::default();
        let request = OpenRequest {
            address: "{h}INBOX",
            username: None,
            password: None,
            options: EnumSet::new(),
            params: &params,
        };
        let mut stream = server.connector().open(&request).unwrap();
        assert!(matches!(stream.search("FROM joe"), Err(Error::Bad(_))));
        assert_eq!(stream.search("all undeleted").unwrap().len(), 1);
    }
}
