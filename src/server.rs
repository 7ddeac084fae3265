//! The `{host[:port][/service][/flag]*}mailbox` address string used to name a mailbox on a
//! particular server.

use std::fmt;

use nom::{
    bytes::complete::{is_not, take_while1},
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res, opt, rest},
    multi::many0,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use enumset::EnumSet;

use crate::config::{OpenOption, SecurityPolicy};
use crate::error::{Error, ParseError, Result};
use crate::types::{ConnectionFlag, FlagEntry};

/// The service a server string names when it does not say otherwise.
pub const DEFAULT_SERVICE: &str = "imap";

const SERVICES: &[&str] = &["imap", "imap2", "imap4", "imap4rev1", "pop3", "nntp"];

/// Everything between the braces of a mailbox address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerSpec {
    /// Host name or address literal.
    pub host: String,
    /// Port, if not the service default.
    pub port: Option<u16>,
    /// Protocol name; only rendered when it differs from [`DEFAULT_SERVICE`].
    pub service: String,
    /// Connection flags in insertion order.
    pub flags: Vec<FlagEntry>,
}

impl ServerSpec {
    /// The server part for `host` with the default service and no flags.
    pub fn new<S: Into<String>>(host: S) -> Self {
        ServerSpec {
            host: host.into(),
            port: None,
            service: DEFAULT_SERVICE.to_string(),
            flags: Vec::new(),
        }
    }

    /// A copy carrying only the flags `policy` lets through.
    pub fn filtered(&self, policy: &SecurityPolicy) -> ServerSpec {
        ServerSpec {
            flags: policy.filter(&self.flags),
            ..self.clone()
        }
    }

    /// Whether `flag` is among the flags.
    pub fn has_flag(&self, flag: &ConnectionFlag) -> bool {
        self.flags.iter().any(|e| &e.flag == flag)
    }

    /// The value of the first `name=value` flag called `name`.
    pub fn flag_value(&self, name: &str) -> Option<&str> {
        self.flags
            .iter()
            .find(|e| e.flag.name().eq_ignore_ascii_case(name))
            .and_then(|e| e.value.as_deref())
    }

    /// Open options the flags ask for: `readonly`, `debug`, `anonymous` and `secure`.
    pub fn implied_options(&self) -> EnumSet<OpenOption> {
        self.flags
            .iter()
            .filter_map(|e| match e.flag {
                ConnectionFlag::ReadOnly => Some(OpenOption::ReadOnly),
                ConnectionFlag::Debug => Some(OpenOption::Debug),
                ConnectionFlag::Anonymous => Some(OpenOption::Anonymous),
                ConnectionFlag::Secure => Some(OpenOption::Secure),
                _ => None,
            })
            .collect()
    }

    /// Whether the service is one of the IMAP spellings.
    pub fn is_imap(&self) -> bool {
        self.service.to_ascii_lowercase().starts_with("imap")
    }

    /// The full address of `mailbox` on this server.
    pub fn address(&self, mailbox: &str) -> String {
        format!("{}{}", self, mailbox)
    }

    /// Parse a full address into the server part and the mailbox path.
    pub fn parse(address: &str) -> Result<(ServerSpec, String)> {
        match all_consuming(address_string)(address) {
            Ok((_, parsed)) => Ok(parsed),
            Err(_) => Err(Error::Parse(ParseError::Address(address.to_string()))),
        }
    }
}

impl fmt::Display for ServerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        if !self.service.eq_ignore_ascii_case(DEFAULT_SERVICE) {
            write!(f, "/{}", self.service)?;
        }
        for entry in &self.flags {
            write!(f, "/{}", entry)?;
        }
        f.write_str("}")
    }
}

/// The mailbox path of a full address, or the input itself when it has no server part.
pub fn mailbox_of(address: &str) -> &str {
    match (address.starts_with('{'), address.find('}')) {
        (true, Some(end)) => &address[end + 1..],
        _ => address,
    }
}

fn host(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c != ':' && c != '/' && c != '}')(input)
}

fn port(input: &str) -> IResult<&str, u16> {
    preceded(char(':'), map_res(digit1, |d: &str| d.parse::<u16>()))(input)
}

fn segment(input: &str) -> IResult<&str, &str> {
    preceded(char('/'), is_not("/}"))(input)
}

type Parsed = (ServerSpec, String);

fn address_string(input: &str) -> IResult<&str, Parsed> {
    let (input, ((host, port, segments), mailbox)) = pair(
        delimited(char('{'), tuple((host, opt(port), many0(segment))), char('}')),
        rest,
    )(input)?;

    let mut spec = ServerSpec::new(host);
    spec.port = port;
    for (i, seg) in segments.into_iter().enumerate() {
        let (name, value) = match seg.find('=') {
            Some(eq) => (&seg[..eq], Some(seg[eq + 1..].to_string())),
            None => (seg, None),
        };
        if name.eq_ignore_ascii_case("service") {
            spec.service = value.unwrap_or_default();
        } else if i == 0 && value.is_none() && SERVICES.iter().any(|s| s.eq_ignore_ascii_case(name)) {
            spec.service = name.to_ascii_lowercase();
        } else {
            spec.flags.push(FlagEntry {
                flag: ConnectionFlag::from(name),
                value,
            });
        }
    }
    Ok((input, (spec, mailbox.to_string())))
}
