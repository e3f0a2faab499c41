//! IMAP over implicit TLS.

use std::{future::Future, sync::Arc, time::Duration};

use async_imap::{Session, error::Error as ImapError};
use futures::TryStreamExt;
use tokio::net::TcpStream;
use tokio_rustls::{
	TlsConnector,
	client::TlsStream,
	rustls::{ClientConfig, RootCertStore, crypto::ring, pki_types::ServerName},
};

use crate::{BoxFuture, Error, Mailbox, MailboxConnector, MessageId, Result};
use faqbot_config::Account;

const FETCH_ITEMS: &str = "BODY.PEEK[]";
const SEEN_FLAG: &str = "+FLAGS (\\Seen)";
/// Response codes that mean the server rejected the credentials themselves.
const CREDENTIAL_CODES: [&str; 3] = ["AUTHENTICATIONFAILED", "AUTHORIZATIONFAILED", "EXPIRED"];

type ImapStream = TlsStream<TcpStream>;

pub struct ImapConnector {
	host: String,
	port: u16,
	account: Account,
	timeout: Duration,
}
impl ImapConnector {
	pub fn new(cfg: &faqbot_config::Mailbox, account: &Account) -> Self {
		Self {
			host: cfg.host.clone(),
			port: cfg.port,
			account: account.clone(),
			timeout: Duration::from_secs(cfg.timeout_seconds),
		}
	}

	async fn open(&self) -> Result<ImapMailbox> {
		let stream =
			with_timeout(self.timeout, "connect", open_tls(&self.host, self.port)).await?;
		let client = async_imap::Client::new(stream);
		let login = client.login(&self.account.username, &self.account.credential);
		let session = with_timeout(self.timeout, "login", async {
			login.await.map_err(|(err, _client)| login_error(err))
		})
		.await?;

		tracing::info!(host = %self.host, port = self.port, "Connected to the IMAP server.");

		Ok(ImapMailbox { session, timeout: self.timeout })
	}
}
impl MailboxConnector for ImapConnector {
	fn connect(&self) -> BoxFuture<'_, Result<Box<dyn Mailbox>>> {
		Box::pin(async move {
			let mailbox = self.open().await?;

			Ok(Box::new(mailbox) as Box<dyn Mailbox>)
		})
	}
}

pub struct ImapMailbox {
	session: Session<ImapStream>,
	timeout: Duration,
}
impl Mailbox for ImapMailbox {
	fn select_folder<'a>(&'a mut self, name: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let session = &mut self.session;

			with_timeout(self.timeout, "select", async {
				session.select(name).await.map_err(imap_error)?;

				Ok(())
			})
			.await
		})
	}

	fn search_unseen(&mut self) -> BoxFuture<'_, Result<Vec<MessageId>>> {
		Box::pin(async move {
			let session = &mut self.session;
			let uids = with_timeout(self.timeout, "search", async {
				session.uid_search("UNSEEN").await.map_err(imap_error)
			})
			.await?;
			let mut ids: Vec<MessageId> = uids.into_iter().map(MessageId).collect();

			ids.sort_unstable();

			Ok(ids)
		})
	}

	fn fetch(&mut self, id: MessageId) -> BoxFuture<'_, Result<Vec<u8>>> {
		Box::pin(async move {
			let session = &mut self.session;

			with_timeout(self.timeout, "fetch", async {
				let stream =
					session.uid_fetch(id.0.to_string(), FETCH_ITEMS).await.map_err(imap_error)?;
				let fetches: Vec<_> = stream.try_collect().await.map_err(imap_error)?;

				fetches
					.iter()
					.filter(|fetch| fetch.uid.is_none_or(|uid| uid == id.0))
					.find_map(|fetch| fetch.body().map(<[u8]>::to_vec))
					.ok_or_else(|| Error::Protocol {
						message: format!("Server returned no body for message {id}."),
					})
			})
			.await
		})
	}

	fn mark_seen(&mut self, id: MessageId) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			let session = &mut self.session;

			with_timeout(self.timeout, "store", async {
				let stream =
					session.uid_store(id.0.to_string(), SEEN_FLAG).await.map_err(imap_error)?;
				let _updates: Vec<_> = stream.try_collect().await.map_err(imap_error)?;

				Ok(())
			})
			.await
		})
	}
}

async fn open_tls(host: &str, port: u16) -> Result<ImapStream> {
	let tcp = TcpStream::connect((host, port))
		.await
		.map_err(|err| Error::Connection { message: format!("{host}:{port}: {err}") })?;
	let mut roots = RootCertStore::empty();

	roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

	let config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
		.with_safe_default_protocol_versions()
		.map_err(|err| Error::Connection { message: err.to_string() })?
		.with_root_certificates(roots)
		.with_no_client_auth();
	let server_name = ServerName::try_from(host.to_string())
		.map_err(|err| Error::Connection { message: format!("{host}: {err}") })?;

	TlsConnector::from(Arc::new(config))
		.connect(server_name, tcp)
		.await
		.map_err(|err| Error::Connection { message: format!("TLS handshake with {host}: {err}") })
}

async fn with_timeout<T, F>(timeout: Duration, operation: &'static str, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	tokio::time::timeout(timeout, fut)
		.await
		.map_err(|_| Error::Timeout { operation, seconds: timeout.as_secs() })?
}

/// Maps a failed LOGIN.
///
/// A NO carrying a credential response code, or no code at all, is a rejected login. Any other
/// code (`UNAVAILABLE`, `SERVERBUG`, `INUSE`, ...) is a server-side condition worth retrying.
fn login_error(err: ImapError) -> Error {
	match err {
		ImapError::No(message) => match response_code(&message) {
			Some(code) if !CREDENTIAL_CODES.contains(&code.as_str()) => {
				Error::Connection { message }
			},
			_ => Error::Auth { message },
		},
		other => imap_error(other),
	}
}

/// First bracketed response code in a tagged reply, upper-cased.
fn response_code(message: &str) -> Option<String> {
	let start = message.find('[')? + 1;
	let len = message[start..].find(']')?;
	let code = message[start..start + len].split_whitespace().next()?;

	Some(code.to_ascii_uppercase())
}

fn imap_error(err: ImapError) -> Error {
	match err {
		ImapError::Io(err) => Error::Connection { message: err.to_string() },
		ImapError::ConnectionLost => {
			Error::Connection { message: "Connection lost.".to_string() }
		},
		other => Error::Protocol { message: other.to_string() },
	}
}
