use std::fmt;

/// A flag modifying how a connection to the server is made. Flags are rendered as `/name` or
/// `/name=value` segments of the server address string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionFlag {
    /// Connect over an implicit TLS socket.
    Ssl,
    /// Validate the server certificate.
    ValidateCert,
    /// Accept self-signed or otherwise unverifiable certificates.
    NoValidateCert,
    /// Upgrade a plain connection with `STARTTLS`.
    Tls,
    /// Never upgrade with `STARTTLS`.
    NoTls,
    /// Do not transmit a plaintext password.
    Secure,
    /// Do not try to pre-authenticate with rsh.
    NoRsh,
    /// Open the mailbox read-only.
    ReadOnly,
    /// Log the protocol exchange.
    Debug,
    /// Log in anonymously.
    Anonymous,
    /// Any other flag, such as `user` or `authuser`.
    Other(String),
}

impl ConnectionFlag {
    /// The flag name as written in an address string.
    pub fn name(&self) -> &str {
        match *self {
            ConnectionFlag::Ssl => "ssl",
            ConnectionFlag::ValidateCert => "validate-cert",
            ConnectionFlag::NoValidateCert => "novalidate-cert",
            ConnectionFlag::Tls => "tls",
            ConnectionFlag::NoTls => "notls",
            ConnectionFlag::Secure => "secure",
            ConnectionFlag::NoRsh => "norsh",
            ConnectionFlag::ReadOnly => "readonly",
            ConnectionFlag::Debug => "debug",
            ConnectionFlag::Anonymous => "anonymous",
            ConnectionFlag::Other(ref name) => name,
        }
    }

    /// Flags that only make sense when the transport can do TLS.
    pub fn requires_ssl(&self) -> bool {
        matches!(
            *self,
            ConnectionFlag::Ssl
                | ConnectionFlag::ValidateCert
                | ConnectionFlag::NoValidateCert
                | ConnectionFlag::Tls
                | ConnectionFlag::NoTls
        )
    }
}

impl<'a> From<&'a str> for ConnectionFlag {
    fn from(s: &'a str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "ssl" => ConnectionFlag::Ssl,
            "validate-cert" => ConnectionFlag::ValidateCert,
            "novalidate-cert" => ConnectionFlag::NoValidateCert,
            "tls" => ConnectionFlag::Tls,
            "notls" => ConnectionFlag::NoTls,
            "secure" => ConnectionFlag::Secure,
            "norsh" => ConnectionFlag::NoRsh,
            "readonly" => ConnectionFlag::ReadOnly,
            "debug" => ConnectionFlag::Debug,
            "anonymous" => ConnectionFlag::Anonymous,
            _ => ConnectionFlag::Other(s.to_string()),
        }
    }
}

impl From<String> for ConnectionFlag {
    fn from(s: String) -> Self {
        ConnectionFlag::from(s.as_str())
    }
}

impl fmt::Display for ConnectionFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What [`Session::set_flag`](crate::Session::set_flag) should do with a flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlagValue {
    /// Add the bare flag if it is not already set.
    On,
    /// Remove the flag.
    Off,
    /// Set the flag as `name=value`, replacing an earlier value.
    Value(String),
}

impl From<bool> for FlagValue {
    fn from(b: bool) -> Self {
        if b {
            FlagValue::On
        } else {
            FlagValue::Off
        }
    }
}

impl<'a> From<&'a str> for FlagValue {
    fn from(s: &'a str) -> Self {
        FlagValue::Value(s.to_string())
    }
}

impl From<String> for FlagValue {
    fn from(s: String) -> Self {
        FlagValue::Value(s)
    }
}

impl From<u32> for FlagValue {
    fn from(n: u32) -> Self {
        FlagValue::Value(n.to_string())
    }
}

/// One `/flag` or `/flag=value` segment of a server address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlagEntry {
    /// The flag.
    pub flag: ConnectionFlag,
    /// Its value, for flags of the form `name=value`.
    pub value: Option<String>,
}

impl FlagEntry {
    /// A flag without a value.
    pub fn bare(flag: ConnectionFlag) -> Self {
        FlagEntry { flag, value: None }
    }
}

impl fmt::Display for FlagEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(ref v) => write!(f, "{}={}", self.flag, v),
            None => write!(f, "{}", self.flag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for name in &["ssl", "validate-cert", "novalidate-cert", "tls", "notls", "readonly"] {
            assert_eq!(ConnectionFlag::from(*name).name(), *name);
        }
        assert_eq!(
            ConnectionFlag::from("authuser"),
            ConnectionFlag::Other("authuser".to_string())
        );
    }

    #[test]
    fn entry_display() {
        let entry = FlagEntry {
            flag: ConnectionFlag::from("user"),
            value: Some("joe".into()),
        };
        assert_eq!(entry.to_string(), "user=joe");
        assert_eq!(FlagEntry::bare(ConnectionFlag::Ssl).to_string(), "ssl");
    }
}
