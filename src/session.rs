use std::fmt;

use enumset::EnumSet;
use log::debug;

use crate::config::{
    open_options_from_bits, AuthParams, MailOption, OpenOption, ParamValue, SecurityPolicy,
    SessionConfig, DISABLE_AUTHENTICATOR, SLOW_AUTHENTICATORS,
};
use crate::error::{Error, Result};
use crate::extensions::sort::SortCriterion;
use crate::message::Message;
use crate::server::ServerSpec;
use crate::transport::{Connector, OpenRequest, Transport};
use crate::types::{ConnectionFlag, FlagEntry, FlagValue, MailboxName, SequenceSet, Uid};
use crate::utils::take_limit;

/// Messages returned by [`Session::ordered_messages`], in sort order, together with the uids
/// that were dropped because their message could not be built.
#[derive(Debug, Default)]
pub struct OrderedMessages {
    /// The messages, in the order the server sorted them.
    pub messages: Vec<Message>,
    /// Uids the server listed but whose message could not be loaded.
    pub skipped: Vec<Uid>,
}

/// A connection to one account on a mail server, with one selected mailbox.
///
/// The session holds the connection parameters, builds the `{host...}mailbox` address string
/// from them, and owns the transport. The transport is opened lazily on first use and reopened,
/// never recreated, when another mailbox is selected.
///
/// A session is not meant to be shared: several operations select another mailbox for their
/// duration and restore the previous selection afterwards.
///
/// ```no_run
/// # use imap_session::{Session, TcpConnector};
/// # fn main() -> imap_session::error::Result<()> {
/// let mut session = Session::new("imap.example.org", TcpConnector::new());
/// session.set_port(Some(993));
/// session.set_flag("ssl", true);
/// session.set_authentication("joe", "secret", true);
///
/// for message in session.search("UNSEEN", Some(10))? {
///     println!("{}: {:?}", message.uid(), message.subject());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Session<C: Connector> {
    spec: ServerSpec,
    username: Option<String>,
    password: Option<String>,
    auth_params: AuthParams,
    options: EnumSet<OpenOption>,
    policy: SecurityPolicy,
    mailbox: String,
    connector: C,
    stream: Option<C::Transport>,
}

impl<C: Connector> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("spec", &self.spec)
            .field("username", &self.username)
            .field("options", &self.options)
            .field("mailbox", &self.mailbox)
            .field("open", &self.stream.is_some())
            .finish()
    }
}

impl<C: Connector> Session<C> {
    /// A session for the server at `server_path`, using `connector` to open the transport.
    pub fn new<S: Into<String>>(server_path: S, connector: C) -> Self {
        Session {
            spec: ServerSpec::new(server_path),
            username: None,
            password: None,
            auth_params: AuthParams::new(),
            options: EnumSet::new(),
            policy: SecurityPolicy::default(),
            mailbox: String::new(),
            connector,
            stream: None,
        }
    }

    /// A session built from configuration.
    ///
    /// Port 143 implies `novalidate-cert` and port 993 implies `ssl`. The configured mailbox is
    /// taken as is and only checked when the transport opens.
    pub fn from_config(config: &SessionConfig, connector: C) -> Result<Self> {
        Session::from_config_with_policy(config, connector, SecurityPolicy::default())
    }

    /// Like [`Session::from_config`], but the configured flags are checked against `policy`
    /// rather than the default one.
    pub fn from_config_with_policy(
        config: &SessionConfig,
        connector: C,
        policy: SecurityPolicy,
    ) -> Result<Self> {
        let mut session = Session::new(config.server_path.clone(), connector).with_policy(policy);
        session.spec.port = config.port;
        for entry in config.port_flags() {
            session.set_flag(entry.flag, FlagValue::On);
        }
        if let Some(ref service) = config.service {
            session.spec.service = service.clone();
        }
        for flag in &config.flags {
            match flag.find('=') {
                Some(eq) => session.set_flag(&flag[..eq], &flag[eq + 1..]),
                None => session.set_flag(flag.as_str(), FlagValue::On),
            }
        }
        if let Some(ref username) = config.username {
            let password = config.password.as_deref().unwrap_or("");
            session.set_authentication(username, password, config.fast_auth);
        }
        if let Some(options) = config.open_options()? {
            session.options = options;
        }
        if let Some(ref mailbox) = config.mailbox {
            session.mailbox = mailbox.clone();
        }
        Ok(session)
    }

    /// Replace the security policy.
    pub fn with_policy(mut self, policy: SecurityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The security policy in effect.
    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    /// Set the port; `None` uses the service default.
    pub fn set_port(&mut self, port: Option<u16>) {
        self.spec.port = port;
    }

    /// Set the service name, `imap` by default.
    pub fn set_service<S: Into<String>>(&mut self, service: S) {
        self.spec.service = service.into();
    }

    /// Store credentials for the next open. With `try_faster_auth` the transport is also told
    /// to skip the GSSAPI and NTLM mechanisms.
    pub fn set_authentication(&mut self, username: &str, password: &str, try_faster_auth: bool) {
        self.username = Some(username.to_string());
        self.password = Some(password.to_string());
        if try_faster_auth {
            self.set_param(
                DISABLE_AUTHENTICATOR,
                ParamValue::List(SLOW_AUTHENTICATORS.iter().map(|s| s.to_string()).collect()),
            );
        }
    }

    /// Add, change or remove a connection flag.
    ///
    /// [`FlagValue::Off`] removes the flag. [`FlagValue::Value`] stores `flag=value`, replacing an
    /// earlier value of the same flag. [`FlagValue::On`] adds the bare flag unless it is already
    /// set. Setting one flag of an exclusive pair first removes the other one, and flags that need
    /// TLS are ignored when the policy disables it.
    pub fn set_flag<F, V>(&mut self, flag: F, value: V)
    where
        F: Into<ConnectionFlag>,
        V: Into<FlagValue>,
    {
        let flag = flag.into();
        if !self.policy.allows(&flag) {
            debug!("ignoring flag {}: TLS is disabled", flag);
            return;
        }
        if let Some(other) = self.policy.counterpart(&flag).cloned() {
            self.spec.flags.retain(|e| e.flag != other);
        }

        match value.into() {
            FlagValue::Off => self.spec.flags.retain(|e| e.flag != flag),
            FlagValue::Value(value) => {
                match self.spec.flags.iter_mut().find(|e| e.flag == flag) {
                    Some(entry) => entry.value = Some(value),
                    None => self.spec.flags.push(FlagEntry {
                        flag,
                        value: Some(value),
                    }),
                }
            }
            FlagValue::On => {
                if !self.spec.flags.iter().any(|e| e.flag == flag && e.value.is_none()) {
                    self.spec.flags.push(FlagEntry::bare(flag));
                }
            }
        }
    }

    /// The connection flags currently set, in insertion order.
    pub fn flags(&self) -> &[FlagEntry] {
        &self.spec.flags
    }

    /// Set the open options from a numeric mask. Bits that do not name an option are an
    /// [`Error::Options`] and leave the options unchanged.
    pub fn set_options(&mut self, bits: u32) -> Result<()> {
        self.options = open_options_from_bits(bits)?;
        Ok(())
    }

    /// Set the open options.
    pub fn set_open_options(&mut self, options: EnumSet<OpenOption>) {
        self.options = options;
    }

    /// The open options.
    pub fn open_options(&self) -> EnumSet<OpenOption> {
        self.options
    }

    /// Set an authentication parameter passed to the transport on open.
    pub fn set_param<K: Into<String>, V: Into<ParamValue>>(&mut self, key: K, value: V) {
        self.auth_params.insert(key.into(), value.into());
    }

    /// The authentication parameters.
    pub fn params(&self) -> &AuthParams {
        &self.auth_params
    }

    /// The selected mailbox; empty until one is selected.
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    /// Select `mailbox`. Returns `false`, changing nothing, if the server does not have it. An
    /// open transport is reopened on the new mailbox.
    pub fn set_mailbox(&mut self, mailbox: &str) -> Result<bool> {
        if !self.has_mailbox(mailbox)? {
            debug!("not selecting missing mailbox {:?}", mailbox);
            return Ok(false);
        }
        self.select_unchecked(mailbox.to_string())?;
        Ok(true)
    }

    /// `{host[:port][/service][/flag]*}` with the policy applied to the flags.
    pub fn server_spec_string(&self) -> String {
        self.spec.filtered(&self.policy).to_string()
    }

    /// The full address of the selected mailbox.
    pub fn server_string(&self) -> String {
        self.mailbox_address(&self.mailbox)
    }

    /// The full address of `mailbox` on this server.
    pub fn mailbox_address(&self, mailbox: &str) -> String {
        format!("{}{}", self.server_spec_string(), mailbox)
    }

    /// Whether the transport has been opened.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// The transport, opened on first use. A failure to open is an [`Error::Connection`].
    pub fn stream(&mut self) -> Result<&mut C::Transport> {
        if self.stream.is_none() {
            let address = self.server_string();
            debug!("opening {}", address);
            let request = OpenRequest {
                address: &address,
                username: self.username.as_deref(),
                password: self.password.as_deref(),
                options: self.options,
                params: &self.auth_params,
            };
            let stream = self.connector.open(&request).map_err(Error::connection)?;
            self.stream = Some(stream);
        }
        self.stream.as_mut().ok_or(Error::ConnectionLost)
    }

    fn reopen(&mut self) -> Result<()> {
        let address = self.server_string();
        let options = self.options;
        if let Some(stream) = self.stream.as_mut() {
            debug!("reopening on {}", address);
            stream.reopen(&address, options).map_err(Error::connection)?;
        }
        Ok(())
    }

    fn select_unchecked(&mut self, mailbox: String) -> Result<()> {
        self.mailbox = mailbox;
        self.reopen()
    }

    /// Run `op` with `mailbox` selected, then select the previous mailbox again, whether or not
    /// `op` succeeded.
    pub(crate) fn within_mailbox<T, F>(&mut self, mailbox: &str, op: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        if mailbox == self.mailbox {
            return op(self);
        }
        let previous = std::mem::replace(&mut self.mailbox, mailbox.to_string());
        let result = self.reopen().and_then(|_| op(self));
        let restored = self.select_unchecked(previous);
        let value = result?;
        restored?;
        Ok(value)
    }

    /// Number of messages in `mailbox`, or in the selected mailbox if `mailbox` is empty. A
    /// mailbox the server does not have counts 0.
    pub fn num_messages(&mut self, mailbox: &str) -> Result<u32> {
        if mailbox.is_empty() || mailbox == self.mailbox {
            return self.stream()?.num_messages();
        }
        if !self.has_mailbox(mailbox)? {
            return Ok(0);
        }
        self.within_mailbox(mailbox, |s| s.stream()?.num_messages())
    }

    /// Messages of the selected mailbox matching the search `criteria` (RFC 3501 syntax, e.g.
    /// `ALL` or `UNSEEN FROM "ann"`), at most `limit` of them, in the order the server returned.
    pub fn search(&mut self, criteria: &str, limit: Option<usize>) -> Result<Vec<Message>> {
        let uids = self.stream()?.search(criteria)?;
        take_limit(uids, limit)
            .into_iter()
            .map(|uid| Message::load(self, uid))
            .collect()
    }

    /// Recently arrived messages.
    pub fn recent_messages(&mut self, limit: Option<usize>) -> Result<Vec<Message>> {
        self.search("RECENT", limit)
    }

    /// The first `limit` messages of the selected mailbox in sequence order.
    pub fn messages(&mut self, limit: Option<usize>) -> Result<Vec<Message>> {
        let mut count = self.stream()?.num_messages()?;
        if let Some(limit) = limit {
            count = count.min(u32::try_from(limit).unwrap_or(u32::MAX));
        }
        let mut messages = Vec::with_capacity(count as usize);
        for seq in 1..=count {
            if let Some(uid) = self.stream()?.uid_for_sequence(seq)? {
                messages.push(Message::load(self, uid)?);
            }
        }
        Ok(messages)
    }

    /// The first `limit` messages of the selected mailbox sorted by `criterion`.
    ///
    /// A uid whose message cannot be built is left out and reported in
    /// [`OrderedMessages::skipped`] rather than failing the whole listing.
    pub fn ordered_messages(
        &mut self,
        criterion: SortCriterion,
        reverse: bool,
        limit: Option<usize>,
    ) -> Result<OrderedMessages> {
        let uids = self.stream()?.sort(criterion, reverse)?;
        let mut ordered = OrderedMessages::default();
        for uid in take_limit(uids, limit) {
            match self.message_by_uid(uid)? {
                Some(message) => ordered.messages.push(message),
                None => {
                    debug!("dropping uid {} from sorted listing", uid);
                    ordered.skipped.push(uid);
                }
            }
        }
        Ok(ordered)
    }

    /// The message with `uid` in the selected mailbox, or `None` if it cannot be built. Only
    /// failures of the transport itself are errors.
    pub fn message_by_uid(&mut self, uid: Uid) -> Result<Option<Message>> {
        match Message::load(self, uid) {
            Ok(message) => Ok(Some(message)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                debug!("message {} unavailable: {}", uid, e);
                Ok(None)
            }
        }
    }

    /// Permanently remove the messages marked deleted from the selected mailbox.
    pub fn expunge(&mut self) -> Result<bool> {
        self.stream()?.expunge()
    }

    /// Whether the server has `mailbox`.
    pub fn has_mailbox(&mut self, mailbox: &str) -> Result<bool> {
        if mailbox.is_empty() {
            return Ok(false);
        }
        Ok(!self.mailbox_details(mailbox)?.is_empty())
    }

    /// The mailboxes matching `mailbox`, with full addresses as names.
    pub fn mailbox_details(&mut self, mailbox: &str) -> Result<Vec<MailboxName>> {
        self.list_mailboxes(mailbox)
    }

    /// Create `mailbox`.
    pub fn create_mailbox(&mut self, mailbox: &str) -> Result<bool> {
        let address = self.mailbox_address(mailbox);
        debug!("creating {}", address);
        self.stream()?.create_mailbox(&address)
    }

    /// Delete `mailbox`.
    pub fn delete_mailbox(&mut self, mailbox: &str) -> Result<bool> {
        let address = self.mailbox_address(mailbox);
        debug!("deleting {}", address);
        self.stream()?.delete_mailbox(&address)
    }

    /// Mailboxes matching `pattern` (`*` matches anything, `%` anything but the hierarchy
    /// delimiter). Names are full addresses, e.g. `{imap.example.org}INBOX.Sent`.
    pub fn list_mailboxes(&mut self, pattern: &str) -> Result<Vec<MailboxName>> {
        let reference = self.server_spec_string();
        let names = self.stream()?.list(&reference, pattern)?;
        Ok(names
            .into_iter()
            .map(|mut name| {
                name.name = format!("{}{}", reference, name.name);
                name
            })
            .collect())
    }

    /// Move the messages in `msglist` (e.g. `"1,2:4"`) to `mailbox`.
    pub fn move_mail_to_mailbox(
        &mut self,
        msglist: &str,
        mailbox: &str,
        options: EnumSet<MailOption>,
    ) -> Result<bool> {
        let set = SequenceSet::parse(msglist)?;
        let destination = self.mailbox_address(mailbox);
        self.stream()?
            .copy(&set, &destination, options | MailOption::Move)
    }

    /// Copy the messages in `msglist` to `mailbox`.
    pub fn copy_mail_to_mailbox(
        &mut self,
        msglist: &str,
        mailbox: &str,
        options: EnumSet<MailOption>,
    ) -> Result<bool> {
        let set = SequenceSet::parse(msglist)?;
        let destination = self.mailbox_address(mailbox);
        self.stream()?
            .copy(&set, &destination, options - MailOption::Move)
    }

    /// Mark the messages in `msglist` deleted.
    pub fn delete_mail(&mut self, msglist: &str, options: EnumSet<MailOption>) -> Result<bool> {
        let set = SequenceSet::parse(msglist)?;
        self.stream()?.delete(&set, options)
    }

    /// Clear the deleted mark of the messages in `msglist`.
    pub fn undelete_mail(&mut self, msglist: &str, options: EnumSet<MailOption>) -> Result<bool> {
        let set = SequenceSet::parse(msglist)?;
        self.stream()?.undelete(&set, options)
    }
}
