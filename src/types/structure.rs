use std::collections::BTreeMap;
use std::fmt;

/// Top-level media type of a body part, with the numeric codes mail libraries traditionally use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// `text/*` (code 0)
    Text,
    /// `multipart/*` (code 1)
    Multipart,
    /// `message/*` (code 2)
    Message,
    /// `application/*` (code 3)
    Application,
    /// `audio/*` (code 4)
    Audio,
    /// `image/*` (code 5)
    Image,
    /// `video/*` (code 6)
    Video,
    /// Anything else (code 7)
    Other,
}

impl MediaType {
    /// The numeric code of this type.
    pub fn code(self) -> u8 {
        match self {
            MediaType::Text => 0,
            MediaType::Multipart => 1,
            MediaType::Message => 2,
            MediaType::Application => 3,
            MediaType::Audio => 4,
            MediaType::Image => 5,
            MediaType::Video => 6,
            MediaType::Other => 7,
        }
    }

    /// The type for a numeric code; unknown codes map to [`MediaType::Other`].
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => MediaType::Text,
            1 => MediaType::Multipart,
            2 => MediaType::Message,
            3 => MediaType::Application,
            4 => MediaType::Audio,
            5 => MediaType::Image,
            6 => MediaType::Video,
            _ => MediaType::Other,
        }
    }

    /// The lower-case type name.
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Text => "text",
            MediaType::Multipart => "multipart",
            MediaType::Message => "message",
            MediaType::Application => "application",
            MediaType::Audio => "audio",
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Other => "other",
        }
    }
}

impl<'a> From<&'a str> for MediaType {
    fn from(s: &'a str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "text" => MediaType::Text,
            "multipart" => MediaType::Multipart,
            "message" => MediaType::Message,
            "application" => MediaType::Application,
            "audio" => MediaType::Audio,
            "image" => MediaType::Image,
            "video" => MediaType::Video,
            _ => MediaType::Other,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content-transfer encoding of a body part.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TransferEncoding {
    /// `7bit`
    SevenBit,
    /// `8bit`
    EightBit,
    /// `binary`
    Binary,
    /// `base64`
    Base64,
    /// `quoted-printable`
    QuotedPrintable,
    /// Any other token.
    Other(String),
}

impl<'a> From<&'a str> for TransferEncoding {
    fn from(s: &'a str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "7bit" => TransferEncoding::SevenBit,
            "8bit" => TransferEncoding::EightBit,
            "binary" => TransferEncoding::Binary,
            "base64" => TransferEncoding::Base64,
            "quoted-printable" => TransferEncoding::QuotedPrintable,
            other => TransferEncoding::Other(other.to_string()),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TransferEncoding::SevenBit => f.write_str("7bit"),
            TransferEncoding::EightBit => f.write_str("8bit"),
            TransferEncoding::Binary => f.write_str("binary"),
            TransferEncoding::Base64 => f.write_str("base64"),
            TransferEncoding::QuotedPrintable => f.write_str("quoted-printable"),
            TransferEncoding::Other(ref s) => f.write_str(s),
        }
    }
}

/// One node of a message's MIME structure, as returned by `BODYSTRUCTURE`.
///
/// Parameter names are stored lower-cased. Content-type parameters and content-disposition
/// parameters are kept apart; [`BodyPart::parameters`] gives the merged view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BodyPart {
    /// Top-level media type.
    pub media_type: MediaType,
    /// Lower-case subtype, e.g. `plain` or `alternative`.
    pub subtype: String,
    /// Content-transfer encoding; `7bit` for multipart nodes.
    pub encoding: TransferEncoding,
    /// Content-type parameters.
    pub params: BTreeMap<String, String>,
    /// Content-disposition type (`attachment`, `inline`), if any.
    pub disposition: Option<String>,
    /// Content-disposition parameters.
    pub disposition_params: BTreeMap<String, String>,
    /// Content-ID, if any.
    pub id: Option<String>,
    /// Content-description, if any.
    pub description: Option<String>,
    /// Size of the encoded body in octets.
    pub octets: u32,
    /// Children of a multipart node, in order.
    pub parts: Vec<BodyPart>,
}

impl BodyPart {
    /// A single, non-multipart part.
    pub fn leaf(media_type: MediaType, subtype: &str) -> Self {
        BodyPart {
            media_type,
            subtype: subtype.to_ascii_lowercase(),
            encoding: TransferEncoding::SevenBit,
            params: BTreeMap::new(),
            disposition: None,
            disposition_params: BTreeMap::new(),
            id: None,
            description: None,
            octets: 0,
            parts: Vec::new(),
        }
    }

    /// A `multipart/<subtype>` node holding `parts`.
    pub fn multipart(subtype: &str, parts: Vec<BodyPart>) -> Self {
        BodyPart {
            parts,
            ..BodyPart::leaf(MediaType::Multipart, subtype)
        }
    }

    /// Set the transfer encoding.
    pub fn with_encoding(mut self, encoding: TransferEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Add a content-type parameter.
    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Set the content disposition and add one of its parameters.
    pub fn with_disposition(mut self, disposition: &str, name: &str, value: &str) -> Self {
        self.disposition = Some(disposition.to_ascii_lowercase());
        self.disposition_params
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Set the encoded size.
    pub fn with_octets(mut self, octets: u32) -> Self {
        self.octets = octets;
        self
    }

    /// Content-type and content-disposition parameters merged into one map; disposition
    /// parameters win on conflicts.
    pub fn parameters(&self) -> BTreeMap<String, String> {
        let mut merged = self.params.clone();
        merged.extend(
            self.disposition_params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        merged
    }

    /// `type/subtype`, e.g. `text/plain`.
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.media_type, self.subtype)
    }

    /// Whether this node has child parts.
    pub fn is_multipart(&self) -> bool {
        !self.parts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes() {
        for code in 0..8 {
            assert_eq!(MediaType::from_code(code).code(), code);
        }
        assert_eq!(MediaType::from_code(42), MediaType::Other);
        assert_eq!(MediaType::from("IMAGE"), MediaType::Image);
    }

    #[test]
    fn merged_parameters_prefer_disposition() {
        let part = BodyPart::leaf(MediaType::Application, "PDF")
            .with_param("NAME", "a.pdf")
            .with_disposition("ATTACHMENT", "Filename", "b.pdf")
            .with_param("charset", "us-ascii");
        let params = part.parameters();
        assert_eq!(params.get("name").map(String::as_str), Some("a.pdf"));
        assert_eq!(params.get("filename").map(String::as_str), Some("b.pdf"));
        assert_eq!(part.mime_type(), "application/pdf");
        assert_eq!(part.disposition.as_deref(), Some("attachment"));
    }

    #[test]
    fn encoding_tokens() {
        assert_eq!(
            TransferEncoding::from("Quoted-Printable"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(
            TransferEncoding::from("x-uuencode"),
            TransferEncoding::Other("x-uuencode".into())
        );
        assert_eq!(TransferEncoding::Base64.to_string(), "base64");
    }
}
