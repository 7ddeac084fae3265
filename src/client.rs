use std::io::{BufRead, Read, Write};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bufstream::BufStream;
use enumset::EnumSet;
use imap_proto::parser::parse_response;
use imap_proto::types::{Response, Status};
use log::{debug, log, Level};

use super::authenticator::Authenticator;
use super::config::{MailOption, OpenOption};
use super::error::{Error, ParseError, Result, ValidateError};
use super::extensions::sort::{SortCharset, SortCriteria, SortCriterion};
use super::parse::{
    parse_authenticate_response, parse_body_section, parse_capabilities, parse_exists,
    parse_expunge, parse_ids, parse_names, parse_overviews, parse_structure, parse_uids,
};
use super::server::{mailbox_of, ServerSpec};
use super::transport::Transport;
use super::types::*;

const TAG_PREFIX: &str = "a";
const INITIAL_TAG: u32 = 0;
const CR: u8 = 0x0d;
const LF: u8 = 0x0a;

/// The mailbox selected when an address names none.
const INBOX: &str = "INBOX";

macro_rules! quote {
    ($x:expr) => {
        format!("\"{}\"", $x.replace(r"\", r"\\").replace("\"", "\\\""))
    };
}

pub(crate) fn validate_str(value: &str) -> Result<String> {
    let quoted = quote!(value);
    if quoted.contains('\n') {
        return Err(Error::Validate(ValidateError('\n')));
    }
    if quoted.contains('\r') {
        return Err(Error::Validate(ValidateError('\r')));
    }
    Ok(quoted)
}

/// Stream to interface with the IMAP server. This interface is only for the command stream.
#[derive(Debug)]
pub struct Client<T: Read + Write> {
    stream: BufStream<T>,
    tag: u32,
    /// Log the protocol exchange at `debug` level instead of `trace`.
    pub debug: bool,
}

impl<T: Read + Write> Client<T> {
    /// Creates a new client over the given stream. The server greeting has not been read yet.
    pub fn new(stream: T) -> Client<T> {
        Client {
            stream: BufStream::new(stream),
            tag: INITIAL_TAG,
            debug: false,
        }
    }

    /// Hand back the underlying stream, e.g. to wrap it in TLS after `STARTTLS`.
    pub(crate) fn into_inner(self) -> Result<T> {
        Ok(self.stream.into_inner()?)
    }

    /// Read the untagged greeting line.
    pub fn read_greeting(&mut self) -> Result<Vec<u8>> {
        let mut v = Vec::new();
        self.readline(&mut v)?;
        Ok(v)
    }

    /// The capabilities the server advertises, upper-cased.
    pub fn capabilities(&mut self) -> Result<Vec<String>> {
        let lines = self.run_command_and_read_response("CAPABILITY")?;
        parse_capabilities(&lines)
    }

    /// Log in with the plaintext `LOGIN` command. The password is kept out of the log.
    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let command = self.create_command(format!(
            "LOGIN {} {}",
            validate_str(username)?,
            validate_str(password)?
        ));
        let shown = format!("{}{} LOGIN {} ***", TAG_PREFIX, self.tag, quote!(username));
        self.write_secret_line(command.as_bytes(), &shown)?;
        self.read_response().map(|_| ())
    }

    /// Run a SASL exchange for `mechanism`, answering each challenge with `authenticator`.
    pub fn authenticate<A: Authenticator>(
        &mut self,
        mechanism: &str,
        authenticator: &A,
    ) -> Result<()> {
        self.run_command(&format!("AUTHENTICATE {}", mechanism))?;
        self.do_auth_handshake(authenticator)
    }

    fn do_auth_handshake<A: Authenticator>(&mut self, authenticator: &A) -> Result<()> {
        loop {
            let mut line = Vec::new();
            self.readline(&mut line)?;

            if !line.starts_with(b"+") {
                return self.read_response_onto(&mut line);
            }

            let line = String::from_utf8(line).map_err(|e| {
                let err = e.utf8_error();
                Error::Parse(ParseError::DataNotUtf8(e.into_bytes(), err))
            })?;
            let data = parse_authenticate_response(&line)?;
            let challenge = BASE64
                .decode(data)
                .map_err(|_| Error::Parse(ParseError::Authentication(data.to_string())))?;
            let response = BASE64.encode(authenticator.process(&challenge));
            self.write_secret_line(response.as_bytes(), "***")?;
        }
    }

    /// `SELECT` (or `EXAMINE` when `read_only`) `mailbox` and return its message count.
    pub fn select(&mut self, mailbox: &str, read_only: bool) -> Result<u32> {
        let command = if read_only { "EXAMINE" } else { "SELECT" };
        let lines =
            self.run_command_and_read_response(&format!("{} {}", command, validate_str(mailbox)?))?;
        parse_exists(&lines, 0)
    }

    /// Runs a command and checks if it returns OK.
    pub fn run_command_and_check_ok(&mut self, command: &str) -> Result<()> {
        self.run_command_and_read_response(command).map(|_| ())
    }

    /// Runs any command passed to it.
    pub fn run_command(&mut self, untagged_command: &str) -> Result<()> {
        let command = self.create_command(untagged_command.to_string());
        self.write_line(command.as_bytes())
    }

    /// Run a raw IMAP command and read back its response.
    pub fn run_command_and_read_response(&mut self, untagged_command: &str) -> Result<Vec<u8>> {
        self.run_command(untagged_command)?;
        self.read_response()
    }

    fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut v = Vec::new();
        self.read_response_onto(&mut v)?;
        Ok(v)
    }

    fn read_response_onto(&mut self, data: &mut Vec<u8>) -> Result<()> {
        let mut continue_from = None;
        let mut try_first = !data.is_empty();
        let match_tag = format!("{}{}", TAG_PREFIX, self.tag);
        loop {
            let line_start = if try_first {
                try_first = false;
                0
            } else {
                let start_new = data.len();
                self.readline(data)?;
                continue_from.take().unwrap_or(start_new)
            };

            let break_with = {
                let line = &data[line_start..];

                match parse_response(line) {
                    Ok((
                        _,
                        Response::Done {
                            tag,
                            status,
                            information,
                            ..
                        },
                    )) => {
                        if tag.as_bytes() != match_tag.as_bytes() {
                            Some(Err((Status::Bye, None)))
                        } else {
                            Some(match status {
                                Status::Bad | Status::No => {
                                    Err((status, information.map(|s| s.to_string())))
                                }
                                Status::Ok => Ok(()),
                                status => Err((status, None)),
                            })
                        }
                    }
                    Ok(..) => None,
                    Err(nom::Err::Incomplete(..)) => {
                        continue_from = Some(line_start);
                        None
                    }
                    _ => Some(Err((Status::Bye, None))),
                }
            };

            match break_with {
                Some(Ok(_)) => {
                    data.truncate(line_start);
                    break Ok(());
                }
                Some(Err((status, expl))) => match status {
                    Status::Bad => {
                        break Err(Error::Bad(
                            expl.unwrap_or_else(|| "no explanation given".to_string()),
                        ))
                    }
                    Status::No => {
                        break Err(Error::No(
                            expl.unwrap_or_else(|| "no explanation given".to_string()),
                        ))
                    }
                    _ => break Err(Error::Parse(ParseError::Invalid(data.split_off(0)))),
                },
                None => {}
            }
        }
    }

    fn readline(&mut self, into: &mut Vec<u8>) -> Result<usize> {
        let read = self.stream.read_until(LF, into)?;
        if read == 0 {
            return Err(Error::ConnectionLost);
        }

        let len = into.len();
        self.log_line("S", &into[len - read..]);
        Ok(read)
    }

    fn create_command(&mut self, command: String) -> String {
        self.tag += 1;
        format!("{}{} {}", TAG_PREFIX, self.tag, command)
    }

    fn write_line(&mut self, buf: &[u8]) -> Result<()> {
        self.write_raw(buf)?;
        self.log_line("C", buf);
        Ok(())
    }

    fn write_secret_line(&mut self, buf: &[u8], shown: &str) -> Result<()> {
        self.write_raw(buf)?;
        self.log_line("C", shown.as_bytes());
        Ok(())
    }

    fn write_raw(&mut self, buf: &[u8]) -> Result<()> {
        self.stream.write_all(buf)?;
        self.stream.write_all(&[CR, LF])?;
        self.stream.flush()?;
        Ok(())
    }

    fn log_line(&self, direction: &str, line: &[u8]) {
        let level = if self.debug {
            Level::Debug
        } else {
            Level::Trace
        };
        let line = line.strip_suffix(b"\r\n").unwrap_or(line);
        log!(level, "{}: {}", direction, String::from_utf8_lossy(line));
    }
}

/// A [`Transport`] over an authenticated [`Client`], as produced by
/// [`TcpConnector`](crate::TcpConnector).
///
/// Message numbers are sent as uids (`UID FETCH`, `UID SEARCH`, ...) except where
/// [`MailOption::Uid`] is absent from a bulk operation's options.
#[derive(Debug)]
pub struct ImapStream<T: Read + Write> {
    client: Client<T>,
    selected: Option<String>,
    exists: u32,
    expunge_on_close: bool,
}

impl<T: Read + Write> ImapStream<T> {
    /// Wrap a client that is already past authentication. Nothing is selected yet.
    pub fn new(client: Client<T>) -> Self {
        ImapStream {
            client,
            selected: None,
            exists: 0,
            expunge_on_close: false,
        }
    }

    /// The mailbox currently selected, if any.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    fn uid_fetch(&mut self, uid: Uid, query: &str) -> Result<Vec<u8>> {
        self.client
            .run_command_and_read_response(&format!("UID FETCH {} {}", uid, query))
    }
}

fn uid_prefix(options: EnumSet<MailOption>) -> &'static str {
    if options.contains(MailOption::Uid) {
        "UID "
    } else {
        ""
    }
}

/// A NO answer is a refusal, not a broken stream.
fn soft(result: Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(Error::No(text)) => {
            debug!("server refused: {}", text);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

impl<T: Read + Write> Transport for ImapStream<T> {
    fn reopen(&mut self, address: &str, options: EnumSet<OpenOption>) -> Result<()> {
        let (spec, mailbox) = ServerSpec::parse(address)?;
        let options = options | spec.implied_options();
        self.client.debug = options.contains(OpenOption::Debug);
        self.expunge_on_close = options.contains(OpenOption::ExpungeOnClose);
        if options.contains(OpenOption::HalfOpen) {
            return Ok(());
        }

        let mailbox = if mailbox.is_empty() {
            INBOX.to_string()
        } else {
            mailbox
        };
        self.exists = self
            .client
            .select(&mailbox, options.contains(OpenOption::ReadOnly))?;
        self.selected = Some(mailbox);
        Ok(())
    }

    fn num_messages(&mut self) -> Result<u32> {
        let lines = self.client.run_command_and_read_response("NOOP")?;
        self.exists = parse_exists(&lines, self.exists)?;
        Ok(self.exists)
    }

    fn uid_for_sequence(&mut self, seq: Seq) -> Result<Option<Uid>> {
        let lines = match self
            .client
            .run_command_and_read_response(&format!("FETCH {} (UID)", seq))
        {
            Ok(lines) => lines,
            Err(Error::Bad(_)) | Err(Error::No(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(parse_uids(&lines)?
            .into_iter()
            .find(|&(s, _)| s == seq)
            .map(|(_, uid)| uid))
    }

    fn fetch_overview(&mut self, uid: Uid) -> Result<Vec<Overview>> {
        let lines = self.uid_fetch(uid, "(UID RFC822.SIZE FLAGS ENVELOPE)")?;
        Ok(parse_overviews(&lines)?
            .into_iter()
            .filter(|o| o.uid == uid)
            .collect())
    }

    fn fetch_header(&mut self, uid: Uid) -> Result<Vec<u8>> {
        let lines = self.uid_fetch(uid, "BODY.PEEK[HEADER]")?;
        parse_body_section(&lines, uid)?.ok_or(Error::NotFound(uid))
    }

    fn fetch_structure(&mut self, uid: Uid) -> Result<BodyPart> {
        let lines = self.uid_fetch(uid, "BODYSTRUCTURE")?;
        parse_structure(&lines, uid)?.ok_or(Error::NotFound(uid))
    }

    fn fetch_body(&mut self, uid: Uid, section: Option<&str>) -> Result<Vec<u8>> {
        let query = format!("BODY.PEEK[{}]", section.unwrap_or("TEXT"));
        let lines = self.uid_fetch(uid, &query)?;
        Ok(parse_body_section(&lines, uid)?.unwrap_or_default())
    }

    fn search(&mut self, criteria: &str) -> Result<Vec<Uid>> {
        let lines = self
            .client
            .run_command_and_read_response(&format!("UID SEARCH {}", criteria))?;
        parse_ids(&lines)
    }

    fn sort(&mut self, criterion: SortCriterion, reverse: bool) -> Result<Vec<Uid>> {
        let criteria = SortCriteria { criterion, reverse };
        let lines = self.client.run_command_and_read_response(&format!(
            "UID SORT {} {} ALL",
            criteria,
            SortCharset::Utf8
        ))?;
        parse_ids(&lines)
    }

    fn store_flags(
        &mut self,
        set: &SequenceSet,
        flags: EnumSet<MessageFlag>,
        enable: bool,
        options: EnumSet<MailOption>,
    ) -> Result<bool> {
        if flags.is_empty() {
            return Ok(true);
        }
        let command = format!(
            "{}STORE {} {}FLAGS.SILENT ({})",
            uid_prefix(options),
            set,
            if enable { '+' } else { '-' },
            system_names(flags)
        );
        soft(self.client.run_command_and_check_ok(&command))
    }

    fn copy(
        &mut self,
        set: &SequenceSet,
        destination: &str,
        options: EnumSet<MailOption>,
    ) -> Result<bool> {
        let command = format!(
            "{}COPY {} {}",
            uid_prefix(options),
            set,
            validate_str(mailbox_of(destination))?
        );
        let copied = soft(self.client.run_command_and_check_ok(&command))?;
        if copied && options.contains(MailOption::Move) {
            return self.delete(set, options);
        }
        Ok(copied)
    }

    fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<MailboxName>> {
        let lines = self.client.run_command_and_read_response(&format!(
            "LIST {} {}",
            validate_str(mailbox_of(reference))?,
            validate_str(pattern)?
        ))?;
        parse_names(&lines)
    }

    fn create_mailbox(&mut self, address: &str) -> Result<bool> {
        let command = format!("CREATE {}", validate_str(mailbox_of(address))?);
        soft(self.client.run_command_and_check_ok(&command))
    }

    fn delete_mailbox(&mut self, address: &str) -> Result<bool> {
        let command = format!("DELETE {}", validate_str(mailbox_of(address))?);
        soft(self.client.run_command_and_check_ok(&command))
    }

    fn expunge(&mut self) -> Result<bool> {
        match self.client.run_command_and_read_response("EXPUNGE") {
            Ok(lines) => {
                let gone = parse_expunge(&lines)?;
                self.exists = self.exists.saturating_sub(gone.len() as u32);
                Ok(true)
            }
            Err(Error::No(text)) => {
                debug!("server refused to expunge: {}", text);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

impl<T: Read + Write> Drop for ImapStream<T> {
    fn drop(&mut self) {
        if self.expunge_on_close && self.selected.is_some() {
            // CLOSE removes \Deleted messages without reporting them
            if let Err(e) = self.client.run_command_and_check_ok("CLOSE") {
                debug!("failed to close {:?}: {}", self.selected, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::authenticator::Plain;
    use super::super::mock_stream::MockStream;
    use super::*;

    const SELECT_RESPONSE: &str = "* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n\
        * OK [PERMANENTFLAGS (\\* \\Answered \\Flagged \\Deleted \\Draft \\Seen)] Limited\r\n\
        * 3 EXISTS\r\n\
        * 1 RECENT\r\n\
        * OK [UNSEEN 1] First unseen.\r\n\
        * OK [UIDVALIDITY 1257842737] UIDs valid\r\n\
        * OK [UIDNEXT 9] Predicted next UID\r\n";

    fn stream(responses: &str) -> ImapStream<MockStream> {
        ImapStream::new(Client::new(MockStream::new(responses.as_bytes().to_vec())))
    }

    fn written(stream: &ImapStream<MockStream>) -> String {
        String::from_utf8(stream.client.stream.get_ref().written_buf.clone()).unwrap()
    }

    #[test]
    fn read_response() {
        let response = "a0 OK Logged in.\r\n";
        let mock_stream = MockStream::new(response.as_bytes().to_vec());
        let mut client = Client::new(mock_stream);
        let actual_response = client.read_response().unwrap();
        assert_eq!(Vec::<u8>::new(), actual_response);
    }

    #[test]
    fn fetch_body() {
        let response = "a0 OK Logged in.\r\n\
                        * 2 FETCH (BODY[TEXT] {3}\r\nfoo)\r\n\
                        a0 OK FETCH completed\r\n";
        let mock_stream = MockStream::new(response.as_bytes().to_vec());
        let mut client = Client::new(mock_stream);
        client.read_response().unwrap();
        client.read_response().unwrap();
    }

    #[test]
    fn read_greeting() {
        let greeting = "* OK Dovecot ready.\r\n";
        let mock_stream = MockStream::new(greeting.as_bytes().to_vec());
        let mut client = Client::new(mock_stream);
        assert_eq!(client.read_greeting().unwrap(), greeting.as_bytes().to_vec());
    }

    #[test]
    fn readline_delay_read() {
        let greeting = "* OK Dovecot ready.\r\n";
        let expected_response: String = greeting.to_string();
        let mock_stream = MockStream::default()
            .with_buf(greeting.as_bytes().to_vec())
            .with_delay();
        let mut client = Client::new(mock_stream);
        let mut v = Vec::new();
        client.readline(&mut v).unwrap();
        let actual_response = String::from_utf8(v).unwrap();
        assert_eq!(expected_response, actual_response);
    }

    #[test]
    fn readline_eof() {
        let mock_stream = MockStream::default().with_eof();
        let mut client = Client::new(mock_stream);
        let mut v = Vec::new();
        if let Err(Error::ConnectionLost) = client.readline(&mut v) {
        } else {
            unreachable!("EOF read did not return connection lost");
        }
    }

    #[test]
    fn readline_err() {
        let mock_stream = MockStream::default().with_err();
        let mut client = Client::new(mock_stream);
        let mut v = Vec::new();
        assert!(matches!(client.readline(&mut v), Err(Error::Io(_))));
    }

    #[test]
    fn create_command() {
        let base_command = "CHECK";
        let mock_stream = MockStream::default();
        let mut imap_stream = Client::new(mock_stream);

        let expected_command = format!("a1 {}", base_command);
        let command = imap_stream.create_command(String::from(base_command));
        assert!(
            command == expected_command,
            "expected command doesn't equal actual command"
        );

        let expected_command2 = format!("a2 {}", base_command);
        let command2 = imap_stream.create_command(String::from(base_command));
        assert!(
            command2 == expected_command2,
            "expected command doesn't equal actual command"
        );
    }

    #[test]
    fn login() {
        let response = b"a1 OK Logged in\r\n".to_vec();
        let username = "username";
        let password = "password";
        let command = format!("a1 LOGIN {} {}\r\n", quote!(username), quote!(password));
        let mock_stream = MockStream::new(response);
        let mut client = Client::new(mock_stream);
        client.login(username, password).unwrap();
        assert!(
            client.stream.get_ref().written_buf == command.as_bytes().to_vec(),
            "Invalid login command"
        );
    }

    #[test]
    fn login_rejects_line_breaks() {
        let mut client = Client::new(MockStream::default());
        assert!(matches!(
            client.login("user", "pass\r\nword"),
            Err(Error::Validate(ValidateError('\n')))
        ));
        assert!(client.stream.get_ref().written_buf.is_empty());
    }

    #[test]
    fn no_response_is_error() {
        let response = b"a1 NO [AUTHENTICATIONFAILED] Authentication failed.\r\n".to_vec();
        let mut client = Client::new(MockStream::new(response));
        match client.login("user", "wrong") {
            Err(Error::No(text)) => assert!(text.contains("Authentication failed.")),
            r => panic!("unexpected result {:?}", r),
        }
    }

    #[test]
    fn authenticate_plain() {
        let response = b"+ \r\na1 OK Logged in\r\n".to_vec();
        let mut client = Client::new(MockStream::new(response));
        let plain = Plain {
            username: "joe",
            password: "secret",
        };
        client.authenticate("PLAIN", &plain).unwrap();
        assert_eq!(
            client.stream.get_ref().written_buf,
            b"a1 AUTHENTICATE PLAIN\r\nAGpvZQBzZWNyZXQ=\r\n".to_vec()
        );
    }

    #[test]
    fn capability() {
        let response = b"* CAPABILITY IMAP4rev1 STARTTLS AUTH=GSSAPI LOGINDISABLED\r\n\
                        a1 OK CAPABILITY completed\r\n"
            .to_vec();
        let mut client = Client::new(MockStream::new(response));
        let capabilities = client.capabilities().unwrap();
        assert_eq!(
            client.stream.get_ref().written_buf,
            b"a1 CAPABILITY\r\n".to_vec()
        );
        assert!(capabilities.contains(&"AUTH=GSSAPI".to_string()));
        assert!(capabilities.contains(&"LOGINDISABLED".to_string()));
    }

    #[test]
    fn select_counts_messages() {
        let response = format!("{}a1 OK [READ-WRITE] Select completed.\r\n", SELECT_RESPONSE);
        let mut client = Client::new(MockStream::new(response.into_bytes()));
        assert_eq!(client.select("INBOX", false).unwrap(), 3);
        assert_eq!(
            client.stream.get_ref().written_buf,
            b"a1 SELECT \"INBOX\"\r\n".to_vec()
        );
    }

    #[test]
    fn reopen_selects_mailbox_of_address() {
        let mut s = stream(&format!("{}a1 OK [READ-ONLY] done\r\n", SELECT_RESPONSE));
        s.reopen("{mail.example.org:993/ssl}INBOX.Archive", EnumSet::only(OpenOption::ReadOnly))
            .unwrap();
        assert_eq!(written(&s), "a1 EXAMINE \"INBOX.Archive\"\r\n");
        assert_eq!(s.selected(), Some("INBOX.Archive"));

        let mut s = stream(&format!("{}a1 OK done\r\n", SELECT_RESPONSE));
        s.reopen("{mail.example.org}", EnumSet::empty()).unwrap();
        assert_eq!(written(&s), "a1 SELECT \"INBOX\"\r\n");
    }

    #[test]
    fn readonly_flag_examines() {
        let mut s = stream(&format!("{}a1 OK [READ-ONLY] done\r\n", SELECT_RESPONSE));
        s.reopen("{mail.example.org/readonly}Sent", EnumSet::empty())
            .unwrap();
        assert_eq!(written(&s), "a1 EXAMINE \"Sent\"\r\n");
    }

    #[test]
    fn half_open_selects_nothing() {
        let mut s = stream("");
        s.reopen("{mail.example.org}INBOX", EnumSet::only(OpenOption::HalfOpen))
            .unwrap();
        assert_eq!(written(&s), "");
        assert_eq!(s.selected(), None);
    }

    #[test]
    fn num_messages_follows_exists() {
        let mut s = stream(&format!(
            "{}a1 OK done\r\na2 OK NOOP completed\r\n* 5 EXISTS\r\na3 OK NOOP completed\r\n",
            SELECT_RESPONSE
        ));
        s.reopen("{mail.example.org}INBOX", EnumSet::empty()).unwrap();
        assert_eq!(s.num_messages().unwrap(), 3);
        assert_eq!(s.num_messages().unwrap(), 5);
    }

    #[test]
    fn uid_for_sequence() {
        let mut s = stream("* 2 FETCH (UID 40)\r\na1 OK done\r\na2 BAD Invalid messageset\r\n");
        assert_eq!(s.uid_for_sequence(2).unwrap(), Some(40));
        assert_eq!(s.uid_for_sequence(99).unwrap(), None);
        assert_eq!(written(&s), "a1 FETCH 2 (UID)\r\na2 FETCH 99 (UID)\r\n");
    }

    #[test]
    fn fetch_overview() {
        let mut s = stream(
            "* 1 FETCH (UID 7 RFC822.SIZE 512 FLAGS (\\Seen) ENVELOPE (\"Mon, 7 Feb 1994 21:52:25 -0800\" \"Hello\" NIL NIL NIL NIL NIL NIL NIL NIL))\r\n\
             a1 OK FETCH completed\r\n",
        );
        let overviews = s.fetch_overview(7).unwrap();
        assert_eq!(
            written(&s),
            "a1 UID FETCH 7 (UID RFC822.SIZE FLAGS ENVELOPE)\r\n"
        );
        assert_eq!(overviews.len(), 1);
        assert_eq!(overviews[0].subject.as_deref(), Some("Hello"));
        assert_eq!(overviews[0].size, 512);
        assert!(overviews[0].has(MessageFlag::Seen));
    }

    #[test]
    fn fetch_overview_of_missing_uid_is_empty() {
        let mut s = stream("a1 OK FETCH completed\r\n");
        assert!(s.fetch_overview(99).unwrap().is_empty());
    }

    #[test]
    fn fetch_header_and_body() {
        let mut s = stream(
            "* 1 FETCH (UID 7 BODY[HEADER] {15}\r\nSubject: hi\r\n\r\n)\r\n\
             a1 OK FETCH completed\r\n\
             * 1 FETCH (UID 7 BODY[1.2] {5}\r\nhello)\r\n\
             a2 OK FETCH completed\r\n\
             * 1 FETCH (UID 7 BODY[TEXT] {3}\r\nall)\r\n\
             a3 OK FETCH completed\r\n",
        );
        assert_eq!(s.fetch_header(7).unwrap(), b"Subject: hi\r\n\r\n".to_vec());
        assert_eq!(s.fetch_body(7, Some("1.2")).unwrap(), b"hello".to_vec());
        assert_eq!(s.fetch_body(7, None).unwrap(), b"all".to_vec());
        assert_eq!(
            written(&s),
            "a1 UID FETCH 7 BODY.PEEK[HEADER]\r\n\
             a2 UID FETCH 7 BODY.PEEK[1.2]\r\n\
             a3 UID FETCH 7 BODY.PEEK[TEXT]\r\n"
        );
    }

    #[test]
    fn fetch_structure() {
        let mut s = stream(
            "* 1 FETCH (UID 7 BODYSTRUCTURE (\"TEXT\" \"PLAIN\" (\"CHARSET\" \"utf-8\") NIL NIL \"7BIT\" 11 1 NIL NIL NIL NIL))\r\n\
             a1 OK FETCH completed\r\n\
             a2 OK FETCH completed\r\n",
        );
        let part = s.fetch_structure(7).unwrap();
        assert_eq!(part.mime_type(), "text/plain");
        assert_eq!(part.params.get("charset").map(String::as_str), Some("utf-8"));
        assert!(matches!(s.fetch_structure(8), Err(Error::NotFound(8))));
    }

    #[test]
    fn search_and_sort() {
        let mut s = stream(
            "* SEARCH 9 4\r\na1 OK SEARCH completed\r\n* SORT 4 9\r\na2 OK SORT completed\r\n",
        );
        assert_eq!(s.search("UNSEEN").unwrap(), vec![9, 4]);
        assert_eq!(s.sort(SortCriterion::Date, true).unwrap(), vec![4, 9]);
        assert_eq!(
            written(&s),
            "a1 UID SEARCH UNSEEN\r\na2 UID SORT (REVERSE DATE) UTF-8 ALL\r\n"
        );
    }

    #[test]
    fn store_flags() {
        let mut s = stream("a1 OK STORE completed\r\na2 OK STORE completed\r\n");
        let set = SequenceSet::parse("2:4").unwrap();
        assert!(s
            .store_flags(
                &set,
                MessageFlag::Seen | MessageFlag::Flagged,
                true,
                EnumSet::only(MailOption::Uid)
            )
            .unwrap());
        assert!(s
            .store_flags(&set, EnumSet::only(MessageFlag::Deleted), false, EnumSet::empty())
            .unwrap());
        assert_eq!(
            written(&s),
            "a1 UID STORE 2:4 +FLAGS.SILENT (\\Flagged \\Seen)\r\n\
             a2 STORE 2:4 -FLAGS.SILENT (\\Deleted)\r\n"
        );
    }

    #[test]
    fn move_copies_then_marks_deleted() {
        let mut s = stream("a1 OK COPY completed\r\na2 OK STORE completed\r\n");
        let set = SequenceSet::parse("7").unwrap();
        assert!(s
            .copy(
                &set,
                "{mail.example.org}Archive",
                MailOption::Uid | MailOption::Move
            )
            .unwrap());
        assert_eq!(
            written(&s),
            "a1 UID COPY 7 \"Archive\"\r\na2 UID STORE 7 +FLAGS.SILENT (\\Deleted)\r\n"
        );
    }

    #[test]
    fn refused_copy_is_false() {
        let mut s = stream("a1 NO [TRYCREATE] Mailbox doesn't exist\r\n");
        let set = SequenceSet::parse("1:*").unwrap();
        assert!(!s
            .copy(&set, "{mail.example.org}Nope", EnumSet::only(MailOption::Move))
            .unwrap());
        assert_eq!(written(&s), "a1 COPY 1:* \"Nope\"\r\n");
    }

    #[test]
    fn list() {
        let mut s = stream(
            "* LIST (\\HasNoChildren) \".\" \"INBOX\"\r\n\
             * LIST (\\HasChildren) \".\" \"INBOX.Archive\"\r\n\
             a1 OK LIST completed\r\n",
        );
        let names = s.list("{mail.example.org}", "*").unwrap();
        assert_eq!(written(&s), "a1 LIST \"\" \"*\"\r\n");
        let names: Vec<_> = names.into_iter().map(|n| n.name).collect();
        assert_eq!(names, vec!["INBOX", "INBOX.Archive"]);
    }

    #[test]
    fn mailbox_administration() {
        let mut s = stream(
            "a1 OK CREATE completed\r\na2 NO Mailbox exists\r\na3 OK DELETE completed\r\n",
        );
        assert!(s.create_mailbox("{mail.example.org}INBOX.New").unwrap());
        assert!(!s.create_mailbox("{mail.example.org}INBOX.New").unwrap());
        assert!(s.delete_mailbox("{mail.example.org}INBOX.New").unwrap());
        assert_eq!(
            written(&s),
            "a1 CREATE \"INBOX.New\"\r\na2 CREATE \"INBOX.New\"\r\na3 DELETE \"INBOX.New\"\r\n"
        );
    }

    #[test]
    fn bad_response_is_error() {
        let mut s = stream("a1 BAD Command unknown\r\n");
        match s.create_mailbox("{mail.example.org}X") {
            Err(Error::Bad(text)) => assert_eq!(text, "Command unknown"),
            r => panic!("unexpected result {:?}", r),
        }
    }

    #[test]
    fn expunge_lowers_count() {
        let mut s = stream(&format!(
            "{}a1 OK done\r\n* 2 EXPUNGE\r\n* 2 EXPUNGE\r\na2 OK EXPUNGE completed\r\n",
            SELECT_RESPONSE
        ));
        s.reopen("{mail.example.org}INBOX", EnumSet::empty()).unwrap();
        assert!(s.expunge().unwrap());
        assert_eq!(s.exists, 1);
    }

    #[test]
    fn expunge_on_close() {
        let mut s = stream(&format!("{}a1 OK done\r\na2 OK CLOSE completed\r\n", SELECT_RESPONSE));
        s.reopen(
            "{mail.example.org}INBOX",
            EnumSet::only(OpenOption::ExpungeOnClose),
        )
        .unwrap();
        drop(s);
    }

    #[test]
    fn quote_backslash() {
        assert_eq!("\"test\\\\text\"", quote!(r"test\text"));
    }

    #[test]
    fn quote_dquote() {
        assert_eq!("\"test\\\"text\"", quote!("test\"text"));
    }

    #[test]
    fn validate_random() {
        assert_eq!(
            "\"~iCQ_k;>[&\\\"sVCvUW`e<<P!wJ\"",
            &validate_str("~iCQ_k;>[&\"sVCvUW`e<<P!wJ").unwrap()
        );
    }

    #[test]
    fn validate_newline() {
        if let Err(ref e) = validate_str("test\nstring") {
            if let &Error::Validate(ref ve) = e {
                if ve.0 == '\n' {
                    return;
                }
            }
            panic!("Wrong error: {:?}", e);
        }
        panic!("No error");
    }

    #[test]
    fn validate_carriage_return() {
        if let Err(ref e) = validate_str("test\rstring") {
            if let &Error::Validate(ref ve) = e {
                if ve.0 == '\r' {
                    return;
                }
            }
            panic!("Wrong error: {:?}", e);
        }
        panic!("No error");
    }
}
