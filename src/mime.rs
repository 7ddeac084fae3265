//! Decoding of MIME text: RFC 2047 encoded words in headers, content-transfer encodings of body
//! parts, character set conversion, and the conversions between plain and HTML bodies.
//!
//! Everything produced here is a Rust `String`, so the target charset is always
//! [`TARGET_CHARSET`].

use std::borrow::Cow;

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use charset::Charset;
use lazy_static::lazy_static;
use log::warn;
use regex::{Captures, Regex};

use crate::types::TransferEncoding;

/// The charset all decoded text ends up in.
pub const TARGET_CHARSET: &str = "UTF-8";

/// Charset substituted for the `default` marker some mailers put in encoded words.
const DEFAULT_CHARSET: &str = "us-ascii";

// Accepts missing or superfluous padding and stray trailing bits.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

lazy_static! {
    static ref ENCODED_WORD: Regex = Regex::new(r"=\?([^?\s]+)\?([QqBb])\?([^?\s]*)\?=").unwrap();
    static ref BR: Regex = Regex::new(r"(?i)\s*<br\s*/?>").unwrap();
    static ref TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref NEWLINE: Regex = Regex::new(r"\r\n|\n\r|\n|\r").unwrap();
}

/// Decode a header value that may contain RFC 2047 encoded words.
///
/// Each word is decoded with its own charset and the results are concatenated in order.
/// Whitespace that only separates two encoded words is dropped. Words that cannot be decoded
/// are kept verbatim. Returns `None` for `None`.
pub fn decode(text: Option<&str>) -> Option<String> {
    let text = text?;
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut after_word = false;

    for caps in ENCODED_WORD.captures_iter(text) {
        let whole = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };
        let gap = &text[last..whole.start()];
        if !(after_word && gap.trim().is_empty()) {
            out.push_str(gap);
        }
        match decode_word(&caps) {
            Some(decoded) => out.push_str(&decoded),
            None => out.push_str(whole.as_str()),
        }
        last = whole.end();
        after_word = true;
    }
    out.push_str(&text[last..]);
    Some(out)
}

fn decode_word(caps: &Captures<'_>) -> Option<String> {
    // RFC 2231 allows a language suffix: =?utf-8*en?Q?...?=
    let label = caps.get(1)?.as_str();
    let label = label.split('*').next().unwrap_or(label);
    let label = if label.eq_ignore_ascii_case("default") {
        DEFAULT_CHARSET
    } else {
        label
    };
    let payload = caps.get(3)?.as_str();

    let bytes = match caps.get(2)?.as_str() {
        "Q" | "q" => {
            let unspaced = payload.replace('_', " ");
            quoted_printable::decode(unspaced.as_bytes(), quoted_printable::ParseMode::Robust)
                .ok()?
        }
        _ => {
            let cleaned: Vec<u8> = payload.bytes().filter(|&b| b != b'=').collect();
            LENIENT_BASE64.decode(cleaned).ok()?
        }
    };
    Some(convert_charset(&bytes, Some(label), &TransferEncoding::Base64))
}

/// Undo the content-transfer encoding of a body part.
///
/// Quoted-printable and base64 are decoded; any other encoding is passed through. Input that does
/// not decode is returned unchanged.
pub fn decode_transfer(data: &[u8], encoding: &TransferEncoding) -> Vec<u8> {
    match *encoding {
        TransferEncoding::QuotedPrintable => {
            match quoted_printable::decode(data, quoted_printable::ParseMode::Robust) {
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!("leaving undecodable quoted-printable data as is: {}", e);
                    data.to_vec()
                }
            }
        }
        TransferEncoding::Base64 => {
            let cleaned: Vec<u8> = data
                .iter()
                .copied()
                .filter(|b| b.is_ascii_alphanumeric() || *b == b'+' || *b == b'/')
                .collect();
            match LENIENT_BASE64.decode(cleaned) {
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!("leaving undecodable base64 data as is: {}", e);
                    data.to_vec()
                }
            }
        }
        _ => data.to_vec(),
    }
}

/// Convert `data` from the declared `charset` to [`TARGET_CHARSET`].
///
/// Data without a declared charset is taken as UTF-8. When the declared charset is unknown, or
/// the data is not valid in it, a best-effort fallback applies: data that was sent as 7bit is
/// read as US-ASCII, anything else as UTF-8. Bytes that still do not fit are replaced with
/// U+FFFD.
pub fn convert_charset(data: &[u8], charset: Option<&str>, encoding: &TransferEncoding) -> String {
    let label = match charset {
        Some(label) if !label.trim().is_empty() => label,
        _ => return String::from_utf8_lossy(data).into_owned(),
    };
    if label.eq_ignore_ascii_case(TARGET_CHARSET) || label.eq_ignore_ascii_case("utf8") {
        if let Ok(s) = std::str::from_utf8(data) {
            return s.to_string();
        }
    } else if let Some(cs) = Charset::for_label(label.trim().as_bytes()) {
        let (decoded, had_errors) = cs.decode_without_bom_handling(data);
        if !had_errors {
            return decoded.into_owned();
        }
    }
    warn!(
        "cannot convert text from charset {:?}, falling back to best-effort decoding",
        label
    );
    fallback(data, encoding).into_owned()
}

fn fallback<'a>(data: &'a [u8], encoding: &TransferEncoding) -> Cow<'a, str> {
    match *encoding {
        TransferEncoding::SevenBit => charset::decode_ascii(data),
        _ => String::from_utf8_lossy(data),
    }
}

/// Derive plain text from HTML: `<br>` variants become line breaks, every other tag is removed.
pub fn html_to_text(html: &str) -> String {
    let text = BR.replace_all(html.trim(), "\n");
    TAG.replace_all(&text, "").into_owned()
}

/// Derive HTML from plain text by inserting `<br />` before every line break.
pub fn nl2br(text: &str) -> String {
    NEWLINE.replace_all(text, "<br />$0").into_owned()
}
