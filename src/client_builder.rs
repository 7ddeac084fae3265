use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use enumset::EnumSet;
use log::debug;
#[cfg(feature = "native-tls")]
use native_tls::{TlsConnector, TlsStream};

use crate::authenticator::{Anonymous, Plain};
use crate::client::{Client, ImapStream};
use crate::config::{AuthParams, OpenOption, ParamValue, DISABLE_AUTHENTICATOR};
use crate::conn::Connection;
use crate::error::{Error, Result};
use crate::server::ServerSpec;
use crate::transport::{Connector, OpenRequest, Transport};
use crate::types::ConnectionFlag;

const IMAP_PORT: u16 = 143;
const IMAPS_PORT: u16 = 993;

/// How the socket is secured, decided by the address flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Security {
    Plain,
    StartTls,
    Implicit,
}

impl Security {
    fn of(spec: &ServerSpec) -> Self {
        if spec.has_flag(&ConnectionFlag::Ssl) {
            Security::Implicit
        } else if spec.has_flag(&ConnectionFlag::Tls) && !spec.has_flag(&ConnectionFlag::NoTls) {
            Security::StartTls
        } else {
            Security::Plain
        }
    }

    fn default_port(self) -> u16 {
        match self {
            Security::Implicit => IMAPS_PORT,
            _ => IMAP_PORT,
        }
    }
}

/// A [`Connector`] that speaks IMAP over TCP, interpreting the address string a
/// [`Session`](crate::Session) builds:
///
/// - `/ssl` connects with implicit TLS (port 993 unless the address names one), `/tls` upgrades a
///   plain connection with `STARTTLS`, anything else stays plaintext on port 143;
/// - `/novalidate-cert` accepts certificates that do not verify;
/// - `/user=name` overrides the session's user name;
/// - `/readonly`, `/anonymous`, `/secure` and `/debug` act like the matching open options.
///
/// TLS needs the `native-tls` feature; without it, TLS addresses fail to open.
///
/// ```no_run
/// # use imap_session::{Session, TcpConnector};
/// # use std::time::Duration;
/// # fn main() -> imap_session::Result<()> {
/// let connector = TcpConnector::new().timeout(Duration::from_secs(30));
/// let mut session = Session::new("imap.example.com", connector);
/// session.set_flag("ssl", true);
/// session.set_authentication("user", "secret", true);
/// println!("{} messages", session.num_messages("")?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct TcpConnector {
    timeout: Option<Duration>,
}

impl TcpConnector {
    /// A connector without socket timeouts.
    pub fn new() -> Self {
        TcpConnector::default()
    }

    /// Give up on reads and writes that block for longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn connect(&self, spec: &ServerSpec, security: Security) -> Result<TcpStream> {
        let port = spec.port.unwrap_or_else(|| security.default_port());
        debug!("connecting to {}:{} ({:?})", spec.host, port, security);
        let tcp = TcpStream::connect((spec.host.as_str(), port))?;
        tcp.set_read_timeout(self.timeout)?;
        tcp.set_write_timeout(self.timeout)?;
        Ok(tcp)
    }
}

#[cfg(feature = "native-tls")]
fn handshake(spec: &ServerSpec, tcp: TcpStream) -> Result<TlsStream<TcpStream>> {
    let ssl_conn = TlsConnector::builder()
        .danger_accept_invalid_certs(spec.has_flag(&ConnectionFlag::NoValidateCert))
        .build()?;
    Ok(TlsConnector::connect(&ssl_conn, &spec.host, tcp)?)
}

#[cfg(not(feature = "native-tls"))]
fn handshake(spec: &ServerSpec, _: TcpStream) -> Result<TcpStream> {
    Err(Error::Io(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        format!("cannot secure connection to {}: built without TLS", spec.host),
    )))
}

impl Connector for TcpConnector {
    type Transport = ImapStream<Connection>;

    fn open(&mut self, request: &OpenRequest<'_>) -> Result<Self::Transport> {
        let (spec, _) = ServerSpec::parse(request.address)?;
        if !spec.is_imap() {
            return Err(Error::InvalidArgument(spec.service));
        }
        let security = Security::of(&spec);
        let options = request.options | spec.implied_options();

        let tcp = self.connect(&spec, security)?;
        let stream: Connection = match security {
            Security::Plain => Box::new(tcp),
            Security::Implicit => Box::new(handshake(&spec, tcp)?),
            Security::StartTls => {
                let mut client = Client::new(tcp);
                client.read_greeting()?;
                client.run_command_and_check_ok("STARTTLS")?;
                Box::new(handshake(&spec, client.into_inner()?)?)
            }
        };

        let mut client = Client::new(stream);
        client.debug = options.contains(OpenOption::Debug);
        // the greeting was already read before STARTTLS
        let preauth = security != Security::StartTls
            && client.read_greeting()?.starts_with(b"* PREAUTH");
        if !preauth {
            authenticate(
                &mut client,
                &spec,
                request,
                options,
                security != Security::Plain,
            )?;
        }

        let mut stream = ImapStream::new(client);
        stream.reopen(request.address, request.options)?;
        Ok(stream)
    }
}

/// Mechanisms listed under [`DISABLE_AUTHENTICATOR`].
fn disabled_mechanisms(params: &AuthParams) -> Vec<String> {
    match params.get(DISABLE_AUTHENTICATOR) {
        Some(ParamValue::List(mechs)) => mechs.iter().map(|m| m.to_ascii_uppercase()).collect(),
        Some(ParamValue::Text(mech)) => vec![mech.to_ascii_uppercase()],
        _ => Vec::new(),
    }
}

fn authenticate<T: Read + Write>(
    client: &mut Client<T>,
    spec: &ServerSpec,
    request: &OpenRequest<'_>,
    options: EnumSet<OpenOption>,
    encrypted: bool,
) -> Result<()> {
    let username = spec.flag_value("user").or(request.username);
    if options.contains(OpenOption::Anonymous) {
        debug!("authenticating anonymously");
        return client.authenticate(
            "ANONYMOUS",
            &Anonymous {
                trace: username.unwrap_or(""),
            },
        );
    }

    let (username, password) = match (username, request.password) {
        (Some(username), Some(password)) => (username, password),
        _ => {
            debug!("no credentials given, staying unauthenticated");
            return Ok(());
        }
    };
    if options.contains(OpenOption::Secure) && !encrypted {
        return Err(Error::No(
            "[PRIVACYREQUIRED] refusing to send a password over an unencrypted connection"
                .to_string(),
        ));
    }

    let capabilities = client.capabilities()?;
    let disabled = disabled_mechanisms(request.params);
    let offered = |mech: &str| {
        capabilities.iter().any(|c| *c == format!("AUTH={}", mech))
            && !disabled.iter().any(|d| d == mech)
    };
    if offered("PLAIN") {
        debug!("authenticating {} with PLAIN", username);
        client.authenticate("PLAIN", &Plain { username, password })
    } else if capabilities.iter().any(|c| c == "LOGINDISABLED") {
        Err(Error::No(
            "[PRIVACYREQUIRED] server does not accept LOGIN on this connection".to_string(),
        ))
    } else {
        debug!("logging in {}", username);
        client.login(username, password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_stream::MockStream;

    fn spec(address: &str) -> ServerSpec {
        ServerSpec::parse(address).unwrap().0
    }

    fn request<'a>(
        address: &'a str,
        username: Option<&'a str>,
        password: Option<&'a str>,
        params: &'a AuthParams,
    ) -> OpenRequest<'a> {
        OpenRequest {
            address,
            username,
            password,
            options: EnumSet::empty(),
            params,
        }
    }

    fn written(client: Client<MockStream>) -> String {
        let stream = client.into_inner().unwrap();
        String::from_utf8(stream.written_buf).unwrap()
    }

    #[test]
    fn security_from_flags() {
        assert_eq!(Security::of(&spec("{h/ssl}")), Security::Implicit);
        assert_eq!(Security::of(&spec("{h/tls}")), Security::StartTls);
        assert_eq!(Security::of(&spec("{h/tls/notls}")), Security::Plain);
        assert_eq!(Security::of(&spec("{h/novalidate-cert}")), Security::Plain);
        assert_eq!(Security::Implicit.default_port(), 993);
        assert_eq!(Security::StartTls.default_port(), 143);
    }

    #[test]
    fn disabled_mechanisms_from_params() {
        let mut params = AuthParams::new();
        assert!(disabled_mechanisms(&params).is_empty());
        params.insert(
            DISABLE_AUTHENTICATOR.to_string(),
            ParamValue::List(vec!["gssapi".into(), "NTLM".into()]),
        );
        assert_eq!(disabled_mechanisms(&params), vec!["GSSAPI", "NTLM"]);
        params.insert(
            DISABLE_AUTHENTICATOR.to_string(),
            ParamValue::Text("plain".into()),
        );
        assert_eq!(disabled_mechanisms(&params), vec!["PLAIN"]);
    }

    #[test]
    fn prefers_plain_when_offered() {
        let response = b"* CAPABILITY IMAP4rev1 AUTH=PLAIN\r\na1 OK done\r\n+ \r\na2 OK Logged in\r\n";
        let mut client = Client::new(MockStream::new(response.to_vec()));
        let params = AuthParams::new();
        let address = "{h/ssl}";
        let req = request(address, Some("joe"), Some("secret"), &params);
        authenticate(&mut client, &spec(address), &req, EnumSet::empty(), true).unwrap();
        assert_eq!(
            written(client),
            "a1 CAPABILITY\r\na2 AUTHENTICATE PLAIN\r\nAGpvZQBzZWNyZXQ=\r\n"
        );
    }

    #[test]
    fn disabled_plain_falls_back_to_login() {
        let response = b"* CAPABILITY IMAP4rev1 AUTH=PLAIN\r\na1 OK done\r\na2 OK Logged in\r\n";
        let mut client = Client::new(MockStream::new(response.to_vec()));
        let mut params = AuthParams::new();
        params.insert(
            DISABLE_AUTHENTICATOR.to_string(),
            ParamValue::Text("PLAIN".into()),
        );
        let address = "{h/user=ann}";
        let req = request(address, Some("joe"), Some("secret"), &params);
        authenticate(&mut client, &spec(address), &req, EnumSet::empty(), false).unwrap();
        assert_eq!(
            written(client),
            "a1 CAPABILITY\r\na2 LOGIN \"ann\" \"secret\"\r\n"
        );
    }

    #[test]
    fn login_disabled_is_refused() {
        let response = b"* CAPABILITY IMAP4rev1 STARTTLS LOGINDISABLED\r\na1 OK done\r\n";
        let mut client = Client::new(MockStream::new(response.to_vec()));
        let params = AuthParams::new();
        let address = "{h}";
        let req = request(address, Some("joe"), Some("secret"), &params);
        let result = authenticate(&mut client, &spec(address), &req, EnumSet::empty(), false);
        assert!(matches!(result, Err(Error::No(_))));
        assert_eq!(written(client), "a1 CAPABILITY\r\n");
    }

    #[test]
    fn secure_refuses_plaintext_password() {
        let mut client = Client::new(MockStream::default());
        let params = AuthParams::new();
        let address = "{h/secure}";
        let req = request(address, Some("joe"), Some("secret"), &params);
        let options = spec(address).implied_options();
        let result = authenticate(&mut client, &spec(address), &req, options, false);
        assert!(matches!(result, Err(Error::No(_))));
        assert_eq!(written(client), "");
    }

    #[test]
    fn anonymous_uses_sasl() {
        let response = b"+ \r\na1 OK Welcome\r\n";
        let mut client = Client::new(MockStream::new(response.to_vec()));
        let params = AuthParams::new();
        let address = "{h/anonymous}";
        let req = request(address, Some("joe@example.org"), None, &params);
        let options = spec(address).implied_options();
        authenticate(&mut client, &spec(address), &req, options, false).unwrap();
        assert_eq!(
            written(client),
            "a1 AUTHENTICATE ANONYMOUS\r\nam9lQGV4YW1wbGUub3Jn\r\n"
        );
    }

    #[test]
    fn no_credentials_sends_nothing() {
        let mut client = Client::new(MockStream::default());
        let params = AuthParams::new();
        let address = "{h}";
        let req = request(address, None, None, &params);
        authenticate(&mut client, &spec(address), &req, EnumSet::empty(), false).unwrap();
        assert_eq!(written(client), "");
    }

    #[test]
    fn other_services_are_rejected() {
        let params = AuthParams::new();
        let req = request("{news.example.org/nntp}comp.lang.rust", None, None, &params);
        assert!(matches!(
            TcpConnector::new().open(&req),
            Err(Error::InvalidArgument(service)) if service == "nntp"
        ));
    }
}
