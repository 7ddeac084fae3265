use imap_proto::parser::parse_response;
use imap_proto::types::{
    AttributeValue, BodyContentCommon, BodyContentSinglePart, BodyStructure, Capability,
    ContentEncoding, MailboxDatum, Response, Status,
};
use lazy_static::lazy_static;
use log::trace;
use regex::Regex;

use super::error::{Error, ParseError, Result};
use super::types::*;

lazy_static! {
    static ref AUTH_RESP_REGEX: Regex = Regex::new("^\\+ ?(.*)\r\n").unwrap();
}

/// The base64 challenge of a `+` continuation line sent during `AUTHENTICATE`.
pub fn parse_authenticate_response(line: &str) -> Result<&str> {
    if let Some(cap) = AUTH_RESP_REGEX.captures(line) {
        let data = cap.get(1).map(|x| x.as_str()).unwrap_or("");
        return Ok(data);
    }

    Err(Error::Parse(ParseError::Authentication(line.to_string())))
}

enum MapOrNot<'a, T> {
    Map(T),
    Not(Response<'a>),
}

fn parse_many<'a, T, F>(mut lines: &'a [u8], mut map: F) -> Result<Vec<T>>
where
    F: FnMut(Response<'a>) -> Result<MapOrNot<'a, T>>,
{
    let mut things = Vec::new();
    loop {
        if lines.is_empty() {
            break Ok(things);
        }

        match parse_response(lines) {
            Ok((rest, resp)) => {
                lines = rest;

                match map(resp)? {
                    MapOrNot::Map(t) => things.push(t),
                    MapOrNot::Not(resp) => {
                        if let Some(resp) = handle_unilateral(resp) {
                            break Err(Error::Parse(ParseError::Unexpected(format!("{:?}", resp))));
                        }
                    }
                }
            }
            _ => {
                break Err(Error::Parse(ParseError::Invalid(lines.to_vec())));
            }
        }
    }
}

/// Swallows the status updates a server may send alongside any command. Returns the response if
/// it is not one of them.
fn handle_unilateral(res: Response<'_>) -> Option<Response<'_>> {
    match res {
        Response::Data {
            status: Status::Ok | Status::No | Status::Bad,
            ..
        }
        | Response::Expunge(_)
        | Response::Fetch(..)
        | Response::Capabilities(_)
        | Response::Vanished { .. } => {
            trace!("ignoring unsolicited {:?}", res);
            None
        }
        Response::MailboxData(MailboxDatum::Exists(_))
        | Response::MailboxData(MailboxDatum::Recent(_))
        | Response::MailboxData(MailboxDatum::Flags(_)) => None,
        res => Some(res),
    }
}

/// Tracks the message count of the selected mailbox through `EXISTS` and `EXPUNGE` responses.
pub fn parse_exists(lines: &[u8], exists: u32) -> Result<u32> {
    let mut count = exists;
    parse_many(lines, |resp| match resp {
        Response::MailboxData(MailboxDatum::Exists(n)) => {
            count = n;
            Ok(MapOrNot::Map(()))
        }
        Response::Expunge(_) => {
            count = count.saturating_sub(1);
            Ok(MapOrNot::Map(()))
        }
        resp => Ok(MapOrNot::Not(resp)),
    })?;
    Ok(count)
}

/// Sequence numbers of the `EXPUNGE` responses, in order.
pub fn parse_expunge(lines: &[u8]) -> Result<Vec<Seq>> {
    parse_many(lines, |resp| match resp {
        Response::Expunge(id) => Ok(MapOrNot::Map(id)),
        resp => Ok(MapOrNot::Not(resp)),
    })
}

pub fn parse_capabilities(lines: &[u8]) -> Result<Vec<String>> {
    let caps = parse_many(lines, |resp| match resp {
        Response::Capabilities(caps) => Ok(MapOrNot::Map(
            caps.iter()
                .map(|cap| match cap {
                    Capability::Imap4rev1 => "IMAP4REV1".to_string(),
                    Capability::Auth(mech) => format!("AUTH={}", mech.to_ascii_uppercase()),
                    Capability::Atom(atom) => atom.to_ascii_uppercase(),
                })
                .collect::<Vec<_>>(),
        )),
        resp => Ok(MapOrNot::Not(resp)),
    })?;
    Ok(caps.concat())
}

pub fn parse_names(lines: &[u8]) -> Result<Vec<MailboxName>> {
    parse_many(lines, |resp| match resp {
        Response::MailboxData(MailboxDatum::List {
            name_attributes,
            delimiter,
            name,
        }) => Ok(MapOrNot::Map(MailboxName {
            name: name.into_owned(),
            delimiter: delimiter.map(|d| d.into_owned()),
            attributes: name_attributes.iter().map(name_attribute).collect(),
        })),
        resp => Ok(MapOrNot::Not(resp)),
    })
}

fn name_attribute(attr: &imap_proto::NameAttribute<'_>) -> NameAttribute {
    use imap_proto::NameAttribute as Proto;

    match attr {
        Proto::NoInferiors => NameAttribute::NoInferiors,
        Proto::NoSelect => NameAttribute::NoSelect,
        Proto::Marked => NameAttribute::Marked,
        Proto::Unmarked => NameAttribute::Unmarked,
        Proto::All => NameAttribute::Custom("\\All".into()),
        Proto::Archive => NameAttribute::Custom("\\Archive".into()),
        Proto::Drafts => NameAttribute::Custom("\\Drafts".into()),
        Proto::Flagged => NameAttribute::Custom("\\Flagged".into()),
        Proto::Junk => NameAttribute::Custom("\\Junk".into()),
        Proto::Sent => NameAttribute::Custom("\\Sent".into()),
        Proto::Trash => NameAttribute::Custom("\\Trash".into()),
        Proto::Extension(s) => NameAttribute::Custom(s.to_string()),
        other => NameAttribute::Custom(format!("{:?}", other)),
    }
}

/// The ids of a `SEARCH` or `SORT` response, in server order.
pub fn parse_ids(lines: &[u8]) -> Result<Vec<u32>> {
    let ids = parse_many(lines, |resp| match resp {
        Response::MailboxData(MailboxDatum::Search(ids))
        | Response::MailboxData(MailboxDatum::Sort(ids)) => Ok(MapOrNot::Map(ids)),
        resp => Ok(MapOrNot::Not(resp)),
    })?;
    Ok(ids.concat())
}

/// Overviews built from `FETCH (UID RFC822.SIZE FLAGS ENVELOPE)` responses.
pub fn parse_overviews(lines: &[u8]) -> Result<Vec<Overview>> {
    parse_many(lines, |resp| match resp {
        Response::Fetch(_, attrs) => Ok(MapOrNot::Map(overview(&attrs))),
        resp => Ok(MapOrNot::Not(resp)),
    })
}

fn overview(attrs: &[AttributeValue<'_>]) -> Overview {
    let mut overview = Overview::default();
    for attr in attrs {
        match attr {
            AttributeValue::Uid(uid) => overview.uid = *uid,
            AttributeValue::Rfc822Size(size) => overview.size = *size,
            AttributeValue::Flags(flags) => {
                overview.flags = flags
                    .iter()
                    .filter_map(|f| MessageFlag::from_system(f))
                    .collect();
            }
            AttributeValue::Envelope(envelope) => {
                overview.subject = envelope
                    .subject
                    .as_ref()
                    .map(|s| String::from_utf8_lossy(s).into_owned());
                overview.date = envelope
                    .date
                    .as_ref()
                    .map(|d| String::from_utf8_lossy(d).into_owned());
            }
            _ => {}
        }
    }
    overview
}

/// `(sequence number, uid)` pairs of `FETCH (UID)` responses.
pub fn parse_uids(lines: &[u8]) -> Result<Vec<(Seq, Uid)>> {
    let pairs = parse_many(lines, |resp| match resp {
        Response::Fetch(seq, attrs) => Ok(MapOrNot::Map(attrs.iter().find_map(|a| match a {
            AttributeValue::Uid(uid) => Some((seq, *uid)),
            _ => None,
        }))),
        resp => Ok(MapOrNot::Not(resp)),
    })?;
    Ok(pairs.into_iter().flatten().collect())
}

/// The body section data fetched for `uid`. A section the server sent as `NIL` is empty.
pub fn parse_body_section(lines: &[u8], uid: Uid) -> Result<Option<Vec<u8>>> {
    let sections = parse_many(lines, |resp| match resp {
        Response::Fetch(_, attrs) => {
            let mut matches = false;
            let mut data = None;
            for attr in &attrs {
                match attr {
                    AttributeValue::Uid(u) => matches = *u == uid,
                    AttributeValue::BodySection { data: d, .. }
                    | AttributeValue::Rfc822(d)
                    | AttributeValue::Rfc822Header(d)
                    | AttributeValue::Rfc822Text(d) => {
                        data = Some(d.as_deref().unwrap_or_default().to_vec());
                    }
                    _ => {}
                }
            }
            Ok(MapOrNot::Map(if matches { data } else { None }))
        }
        resp => Ok(MapOrNot::Not(resp)),
    })?;
    Ok(sections.into_iter().flatten().next())
}

/// The MIME structure fetched for `uid`.
pub fn parse_structure(lines: &[u8], uid: Uid) -> Result<Option<BodyPart>> {
    let parts = parse_many(lines, |resp| match resp {
        Response::Fetch(_, attrs) => {
            let mut matches = false;
            let mut part = None;
            for attr in &attrs {
                match attr {
                    AttributeValue::Uid(u) => matches = *u == uid,
                    AttributeValue::BodyStructure(bs) => part = Some(body_part(bs)),
                    _ => {}
                }
            }
            Ok(MapOrNot::Map(if matches { part } else { None }))
        }
        resp => Ok(MapOrNot::Not(resp)),
    })?;
    Ok(parts.into_iter().flatten().next())
}

fn body_part(bs: &BodyStructure<'_>) -> BodyPart {
    match bs {
        BodyStructure::Basic { common, other, .. } | BodyStructure::Text { common, other, .. } => {
            single_part(common, other)
        }
        BodyStructure::Message {
            common, other, body, ..
        } => {
            let mut part = single_part(common, other);
            part.parts.push(body_part(body));
            part
        }
        BodyStructure::Multipart { common, bodies, .. } => {
            let mut part =
                BodyPart::multipart(&common.ty.subtype, bodies.iter().map(body_part).collect());
            apply_common(&mut part, common);
            part
        }
    }
}

fn single_part(common: &BodyContentCommon<'_>, other: &BodyContentSinglePart<'_>) -> BodyPart {
    let mut part = BodyPart::leaf(MediaType::from(&*common.ty.ty), &common.ty.subtype)
        .with_encoding(transfer_encoding(&other.transfer_encoding))
        .with_octets(other.octets);
    part.id = other.id.as_ref().map(|id| id.to_string());
    part.description = other.description.as_ref().map(|d| d.to_string());
    apply_common(&mut part, common);
    part
}

fn apply_common(part: &mut BodyPart, common: &BodyContentCommon<'_>) {
    for (name, value) in common.ty.params.iter().flatten() {
        part.params.insert(name.to_ascii_lowercase(), value.to_string());
    }
    if let Some(ref disposition) = common.disposition {
        part.disposition = Some(disposition.ty.to_ascii_lowercase());
        for (name, value) in disposition.params.iter().flatten() {
            part.disposition_params
                .insert(name.to_ascii_lowercase(), value.to_string());
        }
    }
}

fn transfer_encoding(encoding: &ContentEncoding<'_>) -> TransferEncoding {
    match encoding {
        ContentEncoding::SevenBit => TransferEncoding::SevenBit,
        ContentEncoding::EightBit => TransferEncoding::EightBit,
        ContentEncoding::Binary => TransferEncoding::Binary,
        ContentEncoding::Base64 => TransferEncoding::Base64,
        ContentEncoding::QuotedPrintable => TransferEncoding::QuotedPrintable,
        ContentEncoding::Other(other) => TransferEncoding::from(other.as_ref()),
    }
}
