//! A single message, loaded from a [`Session`] and decoded into bodies, addresses and
//! attachments.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use enumset::EnumSet;
use log::{debug, warn};
use mailparse::MailAddr;

use crate::attachment::Attachment;
use crate::config::MailOption;
use crate::error::{Error, Result};
use crate::headers::Headers;
use crate::mime;
use crate::session::Session;
use crate::transport::{Connector, Transport};
use crate::types::{Address, BodyPart, MediaType, MessageFlag, Overview, SequenceSet, Uid};
use crate::utils::iter_join;

const PLAINTEXT_SEPARATOR: &str = "\n\n";
const HTML_SEPARATOR: &str = "<br><br>";
const UNDISCLOSED: &str = "undisclosed-recipients";

/// The address headers of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressKind {
    /// `To`
    To,
    /// `Cc`
    Cc,
    /// `Bcc`
    Bcc,
    /// `From`
    From,
    /// `Sender`
    Sender,
    /// `Reply-To`
    ReplyTo,
}

impl AddressKind {
    fn header(self) -> &'static str {
        match self {
            AddressKind::To => "To",
            AddressKind::Cc => "Cc",
            AddressKind::Bcc => "Bcc",
            AddressKind::From => "From",
            AddressKind::Sender => "Sender",
            AddressKind::ReplyTo => "Reply-To",
        }
    }
}

impl FromStr for AddressKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "to" => Ok(AddressKind::To),
            "cc" => Ok(AddressKind::Cc),
            "bcc" => Ok(AddressKind::Bcc),
            "from" => Ok(AddressKind::From),
            "sender" => Ok(AddressKind::Sender),
            "reply-to" | "replyto" | "reply_to" => Ok(AddressKind::ReplyTo),
            _ => Err(Error::InvalidArgument(s.to_string())),
        }
    }
}

/// One message as it was on the server when it was loaded.
///
/// Everything is fetched and decoded when the message is built: overview, headers, structure,
/// and the body of every text part. Accessors do no I/O. Operations that change the message on
/// the server take the [`Session`] it came from and select the message's mailbox for their
/// duration.
#[derive(Clone, Debug)]
pub struct Message {
    uid: Uid,
    mailbox: String,
    overview: Overview,
    raw_headers: Vec<u8>,
    headers: Headers,
    structure: BodyPart,
    subject: Option<String>,
    date: Option<DateTime<FixedOffset>>,
    flags: EnumSet<MessageFlag>,
    to: Vec<Address>,
    cc: Vec<Address>,
    bcc: Vec<Address>,
    from: Vec<Address>,
    sender: Vec<Address>,
    reply_to: Vec<Address>,
    plaintext: Option<String>,
    html: Option<String>,
    attachments: Vec<Attachment>,
}

impl Message {
    /// Load the message with `uid` from the mailbox currently selected on `session`.
    ///
    /// Fails with [`Error::NotFound`] if the server has no overview for the uid.
    pub fn load<C: Connector>(session: &mut Session<C>, uid: Uid) -> Result<Message> {
        let mailbox = session.mailbox().to_string();
        let stream = session.stream()?;

        let overview = stream
            .fetch_overview(uid)?
            .into_iter()
            .next()
            .ok_or(Error::NotFound(uid))?;
        let raw_headers = stream.fetch_header(uid)?;
        let headers = Headers::parse(&raw_headers)?;
        let structure = stream.fetch_structure(uid)?;

        let mut message = Message {
            uid,
            mailbox,
            subject: mime::decode(overview.subject.as_deref()),
            date: overview.date.as_deref().and_then(parse_date),
            flags: overview.flags,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            from: Vec::new(),
            sender: Vec::new(),
            reply_to: Vec::new(),
            plaintext: None,
            html: None,
            attachments: Vec::new(),
            overview,
            raw_headers,
            headers,
            structure: structure.clone(),
        };
        message.load_addresses();

        if structure.parts.is_empty() {
            message.process_structure(stream, &structure, None)?;
        } else {
            for (i, part) in structure.parts.iter().enumerate() {
                message.process_structure(stream, part, Some((i + 1).to_string()))?;
            }
        }
        debug!(
            "loaded message {} from {:?}: {} attachment(s)",
            uid,
            message.mailbox,
            message.attachments.len()
        );
        Ok(message)
    }

    /// Fetch the message again from its mailbox.
    pub fn reload<C: Connector>(&self, session: &mut Session<C>) -> Result<Message> {
        let uid = self.uid;
        session.within_mailbox(&self.mailbox, |s| Message::load(s, uid))
    }

    fn load_addresses(&mut self) {
        self.to = self.header_addresses(AddressKind::To);
        self.cc = self.header_addresses(AddressKind::Cc);
        self.bcc = self.header_addresses(AddressKind::Bcc);
        self.sender = self.header_addresses(AddressKind::Sender);
        self.from = self.header_addresses(AddressKind::From);
        if self.from.is_empty() {
            self.from.push(Address::default());
        }
        self.reply_to = self.header_addresses(AddressKind::ReplyTo);
        if self.reply_to.is_empty() {
            self.reply_to = self.from.clone();
        }
    }

    fn header_addresses(&self, kind: AddressKind) -> Vec<Address> {
        match self.headers.get(kind.header()) {
            Some(value) => parse_addresses(value),
            None => Vec::new(),
        }
    }

    fn process_structure<T: Transport>(
        &mut self,
        stream: &mut T,
        part: &BodyPart,
        part_id: Option<String>,
    ) -> Result<()> {
        let parameters = part.parameters();

        if parameters.contains_key("name")
            || parameters.contains_key("filename")
            || part.subtype == "rfc822"
        {
            self.attachments
                .push(Attachment::new(self.uid, &self.mailbox, part, part_id.clone()));
        } else if part.media_type == MediaType::Text || part.media_type == MediaType::Multipart {
            let raw = stream.fetch_body(self.uid, part_id.as_deref())?;
            let decoded = mime::decode_transfer(&raw, &part.encoding);
            let charset = parameters.get("charset").map(String::as_str);
            let body = mime::convert_charset(&decoded, charset, &part.encoding);

            if part.subtype == "plain"
                || (part.media_type == MediaType::Multipart && part.subtype != "alternative")
            {
                append(&mut self.plaintext, PLAINTEXT_SEPARATOR, body.trim());
            } else if part.subtype == "html" {
                append(&mut self.html, HTML_SEPARATOR, &body);
            }
        }

        for (i, child) in part.parts.iter().enumerate() {
            let child_id = match part_id {
                Some(ref parent) => format!("{}.{}", parent, i + 1),
                None => (i + 1).to_string(),
            };
            self.process_structure(stream, child, Some(child_id))?;
        }
        Ok(())
    }

    /// The message uid.
    pub fn uid(&self) -> Uid {
        self.uid
    }

    /// The mailbox the message lives in.
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    /// The decoded subject.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// The date the message was sent, if the server reported one that parses.
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        self.date
    }

    /// Size in octets.
    pub fn size(&self) -> u32 {
        self.overview.size
    }

    /// The overview as the server sent it.
    pub fn overview(&self) -> &Overview {
        &self.overview
    }

    /// The raw header block.
    pub fn raw_headers(&self) -> &[u8] {
        &self.raw_headers
    }

    /// The parsed header fields.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The MIME structure.
    pub fn structure(&self) -> &BodyPart {
        &self.structure
    }

    /// Flags known to be set.
    pub fn status(&self) -> EnumSet<MessageFlag> {
        self.flags
    }

    /// Whether `flag` is set.
    pub fn check_flag(&self, flag: MessageFlag) -> bool {
        self.flags.contains(flag)
    }

    /// The body in the requested form.
    ///
    /// A missing HTML body is derived from the plain text by turning line breaks into `<br />`,
    /// and a missing plain text body is derived from the HTML by dropping tags. `None` if the
    /// message has neither.
    pub fn message_body(&self, html: bool) -> Option<String> {
        match (html, &self.plaintext, &self.html) {
            (true, _, Some(body)) => Some(body.clone()),
            (true, Some(plain), None) => Some(mime::nl2br(plain)),
            (false, Some(plain), _) => Some(plain.clone()),
            (false, None, Some(body)) => Some(mime::html_to_text(body)),
            _ => None,
        }
    }

    /// The plain text collected from the message, without substitution.
    pub fn plaintext_body(&self) -> Option<&str> {
        self.plaintext.as_deref()
    }

    /// The HTML collected from the message, without substitution.
    pub fn html_body(&self) -> Option<&str> {
        self.html.as_deref()
    }

    /// The addresses of one header. `From` always holds at least a placeholder entry, and
    /// `Reply-To` falls back to `From`.
    pub fn addresses(&self, kind: AddressKind) -> &[Address] {
        match kind {
            AddressKind::To => &self.to,
            AddressKind::Cc => &self.cc,
            AddressKind::Bcc => &self.bcc,
            AddressKind::From => &self.from,
            AddressKind::Sender => &self.sender,
            AddressKind::ReplyTo => &self.reply_to,
        }
    }

    /// The first `From` address.
    pub fn from(&self) -> Option<&Address> {
        self.from.first()
    }

    /// The first `Sender` address.
    pub fn sender(&self) -> Option<&Address> {
        self.sender.first()
    }

    /// The addresses of one header formatted for a header line, `Name <addr>, addr2`; `None`
    /// if there are none.
    pub fn addresses_string(&self, kind: AddressKind) -> Option<String> {
        let addresses = self.addresses(kind);
        if addresses.is_empty() {
            None
        } else {
            Some(iter_join(addresses, ", "))
        }
    }

    /// Every attachment, in structure order.
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// The attachments called `filename`.
    pub fn attachments_named(&self, filename: &str) -> Vec<&Attachment> {
        self.attachments
            .iter()
            .filter(|a| a.filename() == Some(filename))
            .collect()
    }

    /// Set or clear flags on the server.
    ///
    /// Names may carry a leading backslash and any case. A name outside the vocabulary, or
    /// `recent`, is an [`Error::InvalidArgument`], and nothing is changed locally or on the
    /// server. Returns whether the server accepted the change.
    pub fn set_flag<C: Connector>(
        &mut self,
        session: &mut Session<C>,
        names: &[&str],
        enable: bool,
    ) -> Result<bool> {
        let mut flags = EnumSet::new();
        for name in names {
            let flag = MessageFlag::normalize(name)?;
            if !flag.is_settable() {
                return Err(Error::InvalidArgument(flag.name().to_string()));
            }
            flags |= flag;
        }

        if enable {
            self.flags |= flags;
        } else {
            self.flags -= flags;
        }
        debug!(
            "{} {:?} on message {}",
            if enable { "setting" } else { "clearing" },
            flags,
            self.uid
        );

        let uid = self.uid;
        session.within_mailbox(&self.mailbox, |s| {
            s.stream()?.store_flags(
                &SequenceSet::single(uid),
                flags,
                enable,
                EnumSet::only(MailOption::Uid),
            )
        })
    }

    /// Mark the message deleted. It is removed by the next expunge of its mailbox.
    pub fn delete<C: Connector>(&self, session: &mut Session<C>) -> Result<bool> {
        let uid = self.uid;
        session.within_mailbox(&self.mailbox, |s| {
            s.stream()?
                .delete(&SequenceSet::single(uid), EnumSet::only(MailOption::Uid))
        })
    }

    /// Move the message to `mailbox` on the same server.
    ///
    /// The message's mailbox is selected for the copy and the expunge that follows it, and the
    /// session's previous selection is restored afterwards. The uid is not updated, so further
    /// server operations on this value need a fresh load.
    pub fn move_to_mailbox<C: Connector>(
        &mut self,
        session: &mut Session<C>,
        mailbox: &str,
    ) -> Result<bool> {
        let uid = self.uid;
        let destination = session.mailbox_address(mailbox);
        let moved = session.within_mailbox(&self.mailbox, |s| {
            let stream = s.stream()?;
            let copied = stream.copy(
                &SequenceSet::single(uid),
                &destination,
                MailOption::Uid | MailOption::Move,
            )?;
            stream.expunge()?;
            Ok(copied)
        })?;
        if moved {
            self.mailbox = mailbox.to_string();
        }
        Ok(moved)
    }

    /// The name of a numeric media type code.
    pub fn type_id_to_str(id: u8) -> &'static str {
        MediaType::from_code(id).as_str()
    }
}

fn append(body: &mut Option<String>, separator: &str, text: &str) {
    match *body {
        Some(ref mut existing) => {
            existing.push_str(separator);
            existing.push_str(text);
        }
        None => *body = Some(text.to_string()),
    }
}

fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date);
    }
    match mailparse::dateparse(value) {
        Ok(timestamp) => DateTime::from_timestamp(timestamp, 0).map(|d| d.fixed_offset()),
        Err(e) => {
            debug!("unparseable date {:?}: {}", value, e);
            None
        }
    }
}

fn parse_addresses(value: &str) -> Vec<Address> {
    let list = match mailparse::addrparse(value) {
        Ok(list) => list,
        Err(e) => {
            warn!("ignoring unparseable address list {:?}: {}", value, e);
            return Vec::new();
        }
    };

    let mut addresses = Vec::new();
    for addr in list.iter() {
        match *addr {
            MailAddr::Single(ref info) => push_address(&mut addresses, &info.addr, &info.display_name),
            MailAddr::Group(ref group) => {
                for info in &group.addrs {
                    push_address(&mut addresses, &info.addr, &info.display_name);
                }
            }
        }
    }
    addresses
}

fn push_address(addresses: &mut Vec<Address>, addr: &str, name: &Option<String>) {
    let local = addr.split('@').next().unwrap_or(addr);
    if local.eq_ignore_ascii_case(UNDISCLOSED) {
        return;
    }
    addresses.push(Address::new(addr, mime::decode(name.as_deref())));
}
