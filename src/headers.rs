use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, ParseError, Result};

lazy_static! {
    static ref FOLD: Regex = Regex::new(r"\r?\n([ \t])").unwrap();
}

/// The header fields of a message, in the order they appear.
///
/// Values are kept undecoded (encoded words intact) but unfolded onto one line, so they can be
/// handed to the address parser or to [`mime::decode`](crate::mime::decode).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// Parse a raw header block.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let (parsed, _) = mailparse::parse_headers(raw)
            .map_err(|_| Error::Parse(ParseError::Invalid(raw.to_vec())))?;
        let fields = parsed
            .iter()
            .map(|h| {
                let value = String::from_utf8_lossy(h.get_value_raw());
                (h.get_key(), FOLD.replace_all(value.trim(), "$1").into_owned())
            })
            .collect();
        Ok(Headers { fields })
    }

    /// The first value of the field called `name`, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of the field called `name`, ignoring case.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether a field called `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All fields as `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
