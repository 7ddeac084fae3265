//! IMAP session error types.

use std::error::Error as StdError;
use std::fmt;
use std::io::Error as IoError;
#[cfg(feature = "native-tls")]
use std::net::TcpStream;
use std::result;
use std::str::Utf8Error;

use bufstream::IntoInnerError as BufError;
#[cfg(feature = "native-tls")]
use native_tls::Error as TlsError;
#[cfg(feature = "native-tls")]
use native_tls::HandshakeError as TlsHandshakeError;

use crate::types::Uid;

/// A convenience wrapper around `Result` for `imap_session::Error`.
pub type Result<T> = result::Result<T, Error>;

/// A set of errors that can occur while talking to a mail server through a
/// [`Session`](crate::Session).
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// An `io::Error` that occurred while trying to read or write to a network stream.
    Io(IoError),
    /// An error from the `native_tls` library during the TLS handshake.
    #[cfg(feature = "native-tls")]
    TlsHandshake(TlsHandshakeError<TcpStream>),
    /// An error from the `native_tls` library while managing the socket.
    #[cfg(feature = "native-tls")]
    Tls(TlsError),
    /// A BAD response from the IMAP server.
    Bad(String),
    /// A NO response from the IMAP server.
    No(String),
    /// The connection was terminated unexpectedly.
    ConnectionLost,
    /// Error parsing a server response.
    Parse(ParseError),
    /// Command inputs were not valid [IMAP
    /// strings](https://tools.ietf.org/html/rfc3501#section-4.3).
    Validate(ValidateError),
    /// Opening or reopening the transport failed. Holds the underlying transport error.
    Connection(Box<Error>),
    /// The server returned no overview for the given uid.
    NotFound(Uid),
    /// An argument the session cannot use, such as an unknown flag name, a malformed message
    /// set or an unsupported service.
    InvalidArgument(String),
    /// A value that should have been an option bitmask was not.
    Options(String),
}

impl Error {
    pub(crate) fn connection(err: Error) -> Self {
        match err {
            e @ Error::Connection(_) => e,
            e => Error::Connection(Box::new(e)),
        }
    }

    /// Whether the error leaves the stream unusable, as opposed to a failure of one request.
    pub fn is_fatal(&self) -> bool {
        match *self {
            Error::Io(_) | Error::ConnectionLost | Error::Connection(_) => true,
            #[cfg(feature = "native-tls")]
            Error::Tls(_) | Error::TlsHandshake(_) => true,
            _ => false,
        }
    }
}

impl From<IoError> for Error {
    fn from(err: IoError) -> Error {
        Error::Io(err)
    }
}

impl<T> From<BufError<T>> for Error {
    fn from(err: BufError<T>) -> Error {
        Error::Io(err.into())
    }
}

#[cfg(feature = "native-tls")]
impl From<TlsHandshakeError<TcpStream>> for Error {
    fn from(err: TlsHandshakeError<TcpStream>) -> Error {
        Error::TlsHandshake(err)
    }
}

#[cfg(feature = "native-tls")]
impl From<TlsError> for Error {
    fn from(err: TlsError) -> Error {
        Error::Tls(err)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Error {
        Error::Parse(err)
    }
}

impl From<ValidateError> for Error {
    fn from(err: ValidateError) -> Error {
        Error::Validate(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Io(ref e) => fmt::Display::fmt(e, f),
            #[cfg(feature = "native-tls")]
            Error::Tls(ref e) => fmt::Display::fmt(e, f),
            #[cfg(feature = "native-tls")]
            Error::TlsHandshake(ref e) => fmt::Display::fmt(e, f),
            Error::Validate(ref e) => fmt::Display::fmt(e, f),
            Error::Parse(ref e) => fmt::Display::fmt(e, f),
            Error::No(ref data) => write!(f, "No Response: {}", data),
            Error::Bad(ref data) => write!(f, "Bad Response: {}", data),
            Error::ConnectionLost => f.write_str("Connection Lost"),
            Error::Connection(ref e) => write!(f, "Cannot open mailbox stream: {}", e),
            Error::NotFound(uid) => write!(f, "Message with uid {} not found", uid),
            Error::InvalidArgument(ref arg) => write!(f, "Invalid argument \"{}\"", arg),
            Error::Options(ref value) => {
                write!(f, "Expected a numeric option bitmask, got \"{}\"", value)
            }
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            Error::Io(ref e) => Some(e),
            #[cfg(feature = "native-tls")]
            Error::Tls(ref e) => Some(e),
            #[cfg(feature = "native-tls")]
            Error::TlsHandshake(ref e) => Some(e),
            Error::Parse(ParseError::DataNotUtf8(_, ref e)) => Some(e),
            Error::Connection(ref e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// An error occured while trying to parse a server response.
#[derive(Debug)]
pub enum ParseError {
    /// Indicates an error parsing the status response. Such as OK, NO, and BAD.
    Invalid(Vec<u8>),
    /// The client received data that was not UTF-8 encoded.
    DataNotUtf8(Vec<u8>, Utf8Error),
    /// The server address string was not of the form `{host[:port][/flag]*}mailbox`.
    Address(String),
    /// The client could not find or decode the server's authentication challenge.
    Authentication(String),
    /// The client received an unexpected response while waiting for a different one.
    Unexpected(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ParseError::Invalid(_) => f.write_str("Unable to parse status response"),
            ParseError::DataNotUtf8(_, _) => f.write_str("Unable to parse data as UTF-8 text"),
            ParseError::Address(ref addr) => write!(f, "Unable to parse mailbox address {:?}", addr),
            ParseError::Authentication(_) => f.write_str("Unable to parse authentication response"),
            ParseError::Unexpected(_) => f.write_str("Encountered unexpected parse response"),
        }
    }
}

impl StdError for ParseError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            ParseError::DataNotUtf8(_, ref e) => Some(e),
            _ => None,
        }
    }
}

/// An [invalid character](https://tools.ietf.org/html/rfc3501#section-4.3) was found in an input
/// string.
#[derive(Debug, PartialEq, Eq)]
pub struct ValidateError(pub char);

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // print character in debug form because invalid ones are often whitespaces
        write!(f, "Invalid character in input: {:?}", self.0)
    }
}

impl StdError for ValidateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_keeps_server_text() {
        let err = Error::connection(Error::No("[AUTHENTICATIONFAILED] bad password".into()));
        assert_eq!(
            err.to_string(),
            "Cannot open mailbox stream: No Response: [AUTHENTICATIONFAILED] bad password"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn connection_error_is_not_nested_twice() {
        let err = Error::connection(Error::connection(Error::ConnectionLost));
        match err {
            Error::Connection(inner) => assert!(matches!(*inner, Error::ConnectionLost)),
            e => panic!("unexpected error {:?}", e),
        }
    }

    #[test]
    fn fatal_errors() {
        assert!(Error::ConnectionLost.is_fatal());
        assert!(Error::connection(Error::No("down".into())).is_fatal());
        assert!(!Error::NotFound(7).is_fatal());
        assert!(!Error::Bad("syntax".into()).is_fatal());
    }

    #[test]
    fn validate_error_shows_whitespace() {
        assert_eq!(
            ValidateError('\n').to_string(),
            "Invalid character in input: '\\n'"
        );
    }
}
