//! SASL mechanisms the wire client can run with `AUTHENTICATE`.

/// This allows pluggable authentication mechanisms.
///
/// `process` receives each decoded server challenge and returns the response to send back;
/// the client takes care of the base64 framing.
pub trait Authenticator {
    /// The type of the response to the challenge. This will usually be a `Vec<u8>` or `String`.
    type Response: AsRef<[u8]>;

    /// Each base64-decoded server challenge will be passed to `process`.
    fn process(&self, challenge: &[u8]) -> Self::Response;
}

/// The `PLAIN` mechanism of [RFC 4616](https://tools.ietf.org/html/rfc4616).
#[derive(Debug)]
pub(crate) struct Plain<'a> {
    pub(crate) username: &'a str,
    pub(crate) password: &'a str,
}

impl Authenticator for Plain<'_> {
    type Response = Vec<u8>;

    fn process(&self, _: &[u8]) -> Self::Response {
        let mut response = Vec::with_capacity(self.username.len() + self.password.len() + 2);
        response.push(0);
        response.extend_from_slice(self.username.as_bytes());
        response.push(0);
        response.extend_from_slice(self.password.as_bytes());
        response
    }
}

/// The `ANONYMOUS` mechanism of [RFC 4505](https://tools.ietf.org/html/rfc4505); the trace
/// string is usually an email address or left empty.
#[derive(Debug)]
pub(crate) struct Anonymous<'a> {
    pub(crate) trace: &'a str,
}

impl Authenticator for Anonymous<'_> {
    type Response = String;

    fn process(&self, _: &[u8]) -> Self::Response {
        self.trace.to_string()
    }
}
