//! Session configuration: the deserializable connection settings, the per-session security
//! policy, open options and authentication parameters.

use std::collections::BTreeMap;

use enumset::{EnumSet, EnumSetType};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::{ConnectionFlag, FlagEntry};

/// Options applied when the transport is opened. Each option occupies the bit position
/// traditional mail libraries use, so a numeric mask from an existing configuration keeps its
/// meaning; see [`Session::set_options`](crate::Session::set_options).
#[derive(EnumSetType, Debug)]
pub enum OpenOption {
    /// Log the protocol exchange at `debug` level instead of `trace`.
    Debug = 0,
    /// Open the mailbox read-only (`EXAMINE` instead of `SELECT`).
    ReadOnly = 1,
    /// Log in anonymously.
    Anonymous = 2,
    /// Connect and authenticate without selecting a mailbox.
    HalfOpen = 6,
    /// Do not send a plaintext password.
    Secure = 8,
    /// Expunge deleted messages when the transport is closed.
    ExpungeOnClose = 15,
}

/// Modifiers for the bulk message operations of a [`Session`](crate::Session).
#[derive(EnumSetType, Debug)]
pub enum MailOption {
    /// The message set holds uids rather than sequence numbers.
    Uid,
    /// Remove the messages from the source mailbox after copying.
    Move,
}

/// A value in the authentication parameter map handed to the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamValue {
    /// A single string.
    Text(String),
    /// A number.
    Number(i64),
    /// A list of strings, such as mechanisms to skip.
    List(Vec<String>),
}

impl<'a> From<&'a str> for ParamValue {
    fn from(s: &'a str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Number(n)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        ParamValue::List(v)
    }
}

/// Free-form authentication parameters, keyed by name.
pub type AuthParams = BTreeMap<String, ParamValue>;

/// The parameter naming authentication mechanisms the transport should not try.
pub const DISABLE_AUTHENTICATOR: &str = "DISABLE_AUTHENTICATOR";

/// Mechanisms skipped when fast authentication is requested.
pub const SLOW_AUTHENTICATORS: [&str; 2] = ["GSSAPI", "NTLM"];

/// Which connection flags a session may use and which of them exclude each other.
///
/// Each [`Session`](crate::Session) owns its policy, so two sessions in one process never
/// interfere with each other.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityPolicy {
    /// Whether the transport can do TLS. When false, flags that need it are dropped.
    pub ssl_enabled: bool,
    /// Pairs of flags of which at most one may be set.
    pub exclusive_pairs: Vec<(ConnectionFlag, ConnectionFlag)>,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        SecurityPolicy {
            ssl_enabled: cfg!(feature = "native-tls"),
            exclusive_pairs: vec![
                (ConnectionFlag::ValidateCert, ConnectionFlag::NoValidateCert),
                (ConnectionFlag::Tls, ConnectionFlag::NoTls),
            ],
        }
    }
}

impl SecurityPolicy {
    /// The flag `flag` excludes, if it belongs to an exclusive pair.
    pub fn counterpart(&self, flag: &ConnectionFlag) -> Option<&ConnectionFlag> {
        self.exclusive_pairs.iter().find_map(|(a, b)| {
            if a == flag {
                Some(b)
            } else if b == flag {
                Some(a)
            } else {
                None
            }
        })
    }

    /// Whether a flag may be used at all.
    pub fn allows(&self, flag: &ConnectionFlag) -> bool {
        self.ssl_enabled || !flag.requires_ssl()
    }

    /// The flags that survive the policy, in their original order. When both flags of an
    /// exclusive pair are present the later one wins.
    pub fn filter(&self, flags: &[FlagEntry]) -> Vec<FlagEntry> {
        flags
            .iter()
            .enumerate()
            .filter(|(_, entry)| self.allows(&entry.flag))
            .filter(|&(i, entry)| match self.counterpart(&entry.flag) {
                Some(other) => !flags[i + 1..].iter().any(|later| &later.flag == other),
                None => true,
            })
            .map(|(_, entry)| entry.clone())
            .collect()
    }
}

/// An option mask as it may appear in a configuration file: a number, or a string holding one.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OptionsValue {
    /// A numeric mask.
    Bits(u32),
    /// A string that should hold a numeric mask.
    Text(String),
}

impl OptionsValue {
    /// The numeric mask, or [`Error::Options`] if the value is not numeric.
    pub fn bits(&self) -> Result<u32> {
        match *self {
            OptionsValue::Bits(bits) => Ok(bits),
            OptionsValue::Text(ref s) => s
                .trim()
                .parse::<u32>()
                .map_err(|_| Error::Options(s.clone())),
        }
    }
}

/// Connection settings, typically deserialized from a configuration file.
///
/// ```
/// # use imap_session::config::SessionConfig;
/// let config = SessionConfig::new("imap.example.org");
/// assert_eq!(config.server_path, "imap.example.org");
/// assert!(config.fast_auth);
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Host name of the server.
    pub server_path: String,
    /// Port; 143 and 993 also imply default flags.
    pub port: Option<u16>,
    /// Service name, `imap` when absent.
    pub service: Option<String>,
    /// Login name.
    pub username: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Mailbox to select once connected.
    pub mailbox: Option<String>,
    /// Extra connection flags, `name` or `name=value`.
    pub flags: Vec<String>,
    /// Open options mask.
    pub options: Option<OptionsValue>,
    /// Skip slow authentication mechanisms.
    pub fast_auth: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            server_path: String::new(),
            port: None,
            service: None,
            username: None,
            password: None,
            mailbox: None,
            flags: Vec::new(),
            options: None,
            fast_auth: true,
        }
    }
}

impl SessionConfig {
    /// Settings for `server_path` with everything else defaulted.
    pub fn new<S: Into<String>>(server_path: S) -> Self {
        SessionConfig {
            server_path: server_path.into(),
            ..SessionConfig::default()
        }
    }

    /// Flags implied by the configured port: 143 accepts any certificate, 993 uses implicit TLS.
    pub fn port_flags(&self) -> Vec<FlagEntry> {
        match self.port {
            Some(143) => vec![FlagEntry::bare(ConnectionFlag::NoValidateCert)],
            Some(993) => vec![FlagEntry::bare(ConnectionFlag::Ssl)],
            _ => Vec::new(),
        }
    }

    /// The open options, if configured.
    pub fn open_options(&self) -> Result<Option<EnumSet<OpenOption>>> {
        match self.options {
            Some(ref value) => open_options_from_bits(value.bits()?).map(Some),
            None => Ok(None),
        }
    }
}

/// Convert a numeric mask into open options. Unknown bits are an [`Error::Options`].
pub fn open_options_from_bits(bits: u32) -> Result<EnumSet<OpenOption>> {
    EnumSet::try_from_u32(bits).ok_or_else(|| Error::Options(bits.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_bits_match_traditional_values() {
        assert_eq!(EnumSet::only(OpenOption::Debug).as_u32(), 1);
        assert_eq!(EnumSet::only(OpenOption::ReadOnly).as_u32(), 2);
        assert_eq!(EnumSet::only(OpenOption::HalfOpen).as_u32(), 64);
        assert_eq!(EnumSet::only(OpenOption::ExpungeOnClose).as_u32(), 32768);
        assert_eq!(
            open_options_from_bits(66).unwrap(),
            OpenOption::ReadOnly | OpenOption::HalfOpen
        );
        assert!(matches!(open_options_from_bits(1 << 20), Err(Error::Options(_))));
    }

    #[test]
    fn options_value() {
        assert_eq!(OptionsValue::Bits(2).bits().unwrap(), 2);
        assert_eq!(OptionsValue::Text(" 64 ".into()).bits().unwrap(), 64);
        match OptionsValue::Text("fast".into()).bits() {
            Err(Error::Options(v)) => assert_eq!(v, "fast"),
            r => panic!("unexpected result {:?}", r),
        }
    }

    #[test]
    fn policy_filters_ssl_flags() {
        let policy = SecurityPolicy {
            ssl_enabled: false,
            ..SecurityPolicy::default()
        };
        let flags = vec![
            FlagEntry::bare(ConnectionFlag::Ssl),
            FlagEntry::bare(ConnectionFlag::ReadOnly),
            FlagEntry::bare(ConnectionFlag::NoTls),
        ];
        assert_eq!(
            policy.filter(&flags),
            vec![FlagEntry::bare(ConnectionFlag::ReadOnly)]
        );
    }

    #[test]
    fn policy_keeps_later_of_exclusive_pair() {
        let policy = SecurityPolicy {
            ssl_enabled: true,
            ..SecurityPolicy::default()
        };
        let flags = vec![
            FlagEntry::bare(ConnectionFlag::ValidateCert),
            FlagEntry::bare(ConnectionFlag::Ssl),
            FlagEntry::bare(ConnectionFlag::NoValidateCert),
        ];
        assert_eq!(
            policy.filter(&flags),
            vec![
                FlagEntry::bare(ConnectionFlag::Ssl),
                FlagEntry::bare(ConnectionFlag::NoValidateCert)
            ]
        );
        assert_eq!(
            policy.counterpart(&ConnectionFlag::NoTls),
            Some(&ConnectionFlag::Tls)
        );
        assert_eq!(policy.counterpart(&ConnectionFlag::Ssl), None);
    }

    #[test]
    fn port_defaults() {
        let mut config = SessionConfig::new("imap.example.org");
        config.port = Some(993);
        assert_eq!(config.port_flags(), vec![FlagEntry::bare(ConnectionFlag::Ssl)]);
        config.port = Some(143);
        assert_eq!(
            config.port_flags(),
            vec![FlagEntry::bare(ConnectionFlag::NoValidateCert)]
        );
        config.port = Some(10143);
        assert!(config.port_flags().is_empty());
    }

    #[test]
    fn deserialize_from_toml() {
        let config: SessionConfig = toml::from_str(
            r#"
            server_path = "imap.example.org"
            port = 993
            username = "joe"
            password = "secret"
            flags = ["novalidate-cert", "user=joe"]
            options = "2"
            "#,
        )
        .unwrap();
        assert_eq!(config.port, Some(993));
        assert_eq!(config.flags.len(), 2);
        assert!(config.fast_auth);
        assert_eq!(
            config.open_options().unwrap(),
            Some(EnumSet::only(OpenOption::ReadOnly))
        );

        let numeric: SessionConfig =
            toml::from_str("server_path = \"h\"\noptions = 64\n").unwrap();
        assert_eq!(numeric.options, Some(OptionsValue::Bits(64)));
    }
}
