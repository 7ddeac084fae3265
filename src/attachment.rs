use std::collections::BTreeMap;

use log::debug;

use crate::error::Result;
use crate::mime;
use crate::session::Session;
use crate::transport::{Connector, Transport};
use crate::types::{BodyPart, TransferEncoding, Uid};

/// A part of a [`Message`](crate::Message) that carries a file name, or an embedded message.
///
/// Only metadata is kept; the content is fetched on demand with [`Attachment::data`]. Saving it
/// anywhere is up to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    uid: Uid,
    mailbox: String,
    part_id: Option<String>,
    filename: Option<String>,
    mime_type: String,
    encoding: TransferEncoding,
    size: u32,
    disposition: Option<String>,
    parameters: BTreeMap<String, String>,
}

impl Attachment {
    pub(crate) fn new(uid: Uid, mailbox: &str, part: &BodyPart, part_id: Option<String>) -> Self {
        let parameters = part.parameters();
        let filename = parameters
            .get("filename")
            .or_else(|| parameters.get("name"))
            .and_then(|name| mime::decode(Some(name.as_str())));
        Attachment {
            uid,
            mailbox: mailbox.to_string(),
            part_id,
            filename,
            mime_type: part.mime_type(),
            encoding: part.encoding.clone(),
            size: part.octets,
            disposition: part.disposition.clone(),
            parameters,
        }
    }

    /// The decoded file name, from the `filename` disposition parameter or else the `name`
    /// content-type parameter. Embedded messages usually have none.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// `type/subtype`.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Transfer encoding of the part on the server.
    pub fn encoding(&self) -> &TransferEncoding {
        &self.encoding
    }

    /// Encoded size in octets.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// `attachment` or `inline`, if the part declared a disposition.
    pub fn disposition(&self) -> Option<&str> {
        self.disposition.as_deref()
    }

    /// Merged content-type and disposition parameters.
    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// Where the part sits in the message structure, e.g. `2.1`; `None` if the message is this
    /// single part.
    pub fn part_id(&self) -> Option<&str> {
        self.part_id.as_deref()
    }

    /// Uid of the message the attachment belongs to.
    pub fn uid(&self) -> Uid {
        self.uid
    }

    /// Fetch the content and undo its transfer encoding.
    pub fn data<C: Connector>(&self, session: &mut Session<C>) -> Result<Vec<u8>> {
        debug!(
            "fetching attachment {:?} of message {}",
            self.part_id, self.uid
        );
        let raw = session.within_mailbox(&self.mailbox, |s| {
            s.stream()?.fetch_body(self.uid, self.part_id.as_deref())
        })?;
        Ok(mime::decode_transfer(&raw, &self.encoding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityPolicy;
    use crate::testing::{MemoryServer, StoredMessage};
    use crate::types::MediaType;
    use crate::Message;

    #[test]
    fn metadata() {
        let part = BodyPart::leaf(MediaType::Image, "PNG")
            .with_encoding(TransferEncoding::Base64)
            .with_param("name", "fallback.png")
            .with_disposition("inline", "filename", "=?utf-8?q?b=C3=A4r.png?=")
            .with_octets(2048);
        let attachment = Attachment::new(9, "INBOX", &part, Some("2".into()));
        assert_eq!(attachment.filename(), Some("bär.png"));
        assert_eq!(attachment.mime_type(), "image/png");
        assert_eq!(attachment.size(), 2048);
        assert_eq!(attachment.disposition(), Some("inline"));
        assert_eq!(attachment.part_id(), Some("2"));
        assert_eq!(
            attachment.parameters().get("name").map(String::as_str),
            Some("fallback.png")
        );
    }

    #[test]
    fn data_is_fetched_from_own_mailbox() {
        let server = MemoryServer::new().with_mailbox("Files");
        let structure = BodyPart::multipart(
            "mixed",
            vec![
                BodyPart::leaf(MediaType::Text, "plain"),
                BodyPart::leaf(MediaType::Application, "octet-stream")
                    .with_encoding(TransferEncoding::Base64)
                    .with_disposition("attachment", "filename", "blob.bin"),
            ],
        );
        let stored = StoredMessage::new("Subject: a\r\n\r\n", structure, b"")
            .with_section("1", b"see attached")
            .with_section("2", b"AAEC/w==\r\n");
        let uid = server.append("Files", stored);

        let mut s = Session::new("mail.example.org", server.connector()).with_policy(
            SecurityPolicy {
                ssl_enabled: true,
                ..SecurityPolicy::default()
            },
        );
        assert!(s.set_mailbox("Files").unwrap());
        let message = Message::load(&mut s, uid).unwrap();
        assert!(s.set_mailbox("INBOX").unwrap());

        let attachment = &message.attachments()[0];
        assert_eq!(attachment.filename(), Some("blob.bin"));
        assert_eq!(attachment.data(&mut s).unwrap(), vec![0u8, 1, 2, 255]);
        assert_eq!(s.mailbox(), "INBOX");
    }
}
