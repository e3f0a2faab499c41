//! Mail collaborators: the mailbox the watcher polls and the relay replies go through.

pub mod imap;
pub mod message;
pub mod smtp;

mod error;

pub use error::{Error, Result};
pub use imap::ImapConnector;
pub use message::{InboundMessage, MessageId, OutboundEmail, parse_message};
pub use smtp::SmtpOutbound;

use std::{future::Future, pin::Pin};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An authenticated mailbox session.
pub trait Mailbox
where
	Self: Send,
{
	fn select_folder<'a>(&'a mut self, name: &'a str) -> BoxFuture<'a, Result<()>>;

	/// Ids of every message without the seen flag in the selected folder, in ascending order.
	fn search_unseen(&mut self) -> BoxFuture<'_, Result<Vec<MessageId>>>;

	/// Raw RFC 822 bytes. Must not set the seen flag as a side effect.
	fn fetch(&mut self, id: MessageId) -> BoxFuture<'_, Result<Vec<u8>>>;

	/// Once marked, `id` never appears in `search_unseen` again.
	fn mark_seen(&mut self, id: MessageId) -> BoxFuture<'_, Result<()>>;
}

/// Opens mailbox sessions. Rejected credentials surface as [`Error::Auth`].
pub trait MailboxConnector
where
	Self: Send + Sync,
{
	fn connect(&self) -> BoxFuture<'_, Result<Box<dyn Mailbox>>>;
}

pub trait Outbound
where
	Self: Send + Sync,
{
	fn send<'a>(&'a self, email: &'a OutboundEmail) -> BoxFuture<'a, Result<()>>;
}
