//! SMTP submission with STARTTLS.

use std::time::Duration;

use lettre::{
	AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
	message::{Mailbox as Address, header::ContentType},
	transport::smtp::authentication::Credentials,
};

use crate::{BoxFuture, Error, Outbound, OutboundEmail, Result};
use faqbot_config::Account;

pub struct SmtpOutbound {
	transport: AsyncSmtpTransport<Tokio1Executor>,
	host: String,
}
impl SmtpOutbound {
	pub fn new(cfg: &faqbot_config::Smtp, account: &Account) -> Result<Self> {
		let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
			.map_err(|err| Error::Connection { message: err.to_string() })?
			.port(cfg.port)
			.credentials(Credentials::new(account.username.clone(), account.credential.clone()))
			.timeout(Some(Duration::from_secs(cfg.timeout_seconds)))
			.build();

		Ok(Self { transport, host: cfg.host.clone() })
	}
}
impl Outbound for SmtpOutbound {
	fn send<'a>(&'a self, email: &'a OutboundEmail) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let message = compose(email)?;

			tracing::debug!(to = %email.to, smtp_host = %self.host, "Submitting reply.");

			self.transport
				.send(message)
				.await
				.map_err(|err| Error::Delivery { message: err.to_string() })?;

			Ok(())
		})
	}
}

/// Builds a plain-text message from `email`.
pub fn compose(email: &OutboundEmail) -> Result<Message> {
	let from = parse_address(&email.from)?;
	let to = parse_address(&email.to)?;

	Message::builder()
		.from(from)
		.to(to)
		.subject(email.subject.as_str())
		.header(ContentType::TEXT_PLAIN)
		.body(email.body.clone())
		.map_err(|err| Error::Compose { message: err.to_string() })
}

fn parse_address(raw: &str) -> Result<Address> {
	raw.parse::<Address>()
		.map_err(|source| Error::Address { address: raw.to_string(), source })
}
