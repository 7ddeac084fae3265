//! A mailbox-oriented IMAP client for Rust.
//!
//! A [`Session`] keeps the connection parameters of one account, builds the
//! `{host[:port][/service][/flag]*}mailbox` address string from them, and lazily opens a
//! [`Transport`](transport::Transport) through a [`Connector`](transport::Connector). Messages
//! are loaded as [`Message`]s: decoded headers, the MIME structure walked into a plain text
//! body, an HTML body and [`Attachment`]s, plus the flag and mailbox operations on them.
//!
//! # Usage
//!
//! ```no_run
//! use imap_session::{AddressKind, Session, TcpConnector};
//!
//! fn main() -> imap_session::Result<()> {
//!     let mut session = Session::new("imap.example.org", TcpConnector::new());
//!     session.set_flag("ssl", true);
//!     session.set_authentication("joe", "secret", true);
//!
//!     println!("{} messages in INBOX", session.num_messages("")?);
//!
//!     for message in session.recent_messages(Some(5))? {
//!         println!(
//!             "{} from {:?}: {:?}",
//!             message.uid(),
//!             message.addresses_string(AddressKind::From),
//!             message.subject()
//!         );
//!         for attachment in message.attachments() {
//!             let data = attachment.data(&mut session)?;
//!             println!("  {:?} ({} bytes)", attachment.filename(), data.len());
//!         }
//!     }
//!
//!     if session.create_mailbox("Archive")? {
//!         session.move_mail_to_mailbox("1:3", "Archive", Default::default())?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Wire traffic and session decisions are logged through the [`log`] facade; the `debug` open
//! option or address flag raises the wire log from `trace` to `debug`.

mod authenticator;
mod conn;
mod parse;
mod utils;

pub mod attachment;
pub mod client;
pub mod client_builder;
pub mod config;
pub mod error;
pub mod extensions;
pub mod headers;
pub mod message;
pub mod mime;
pub mod server;
pub mod session;
pub mod transport;
mod types;

#[cfg(any(test, feature = "test_helpers"))]
pub mod testing;

pub use crate::attachment::Attachment;
pub use crate::authenticator::Authenticator;
pub use crate::client::{Client, ImapStream};
pub use crate::client_builder::TcpConnector;
pub use crate::conn::{Connection, ImapConnection};
pub use crate::error::{Error, Result};
pub use crate::message::{AddressKind, Message};
pub use crate::session::{OrderedMessages, Session};
pub use crate::types::*;

#[cfg(test)]
mod mock_stream;
