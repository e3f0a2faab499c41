//! Test doubles and fixtures shared by the workspace's integration tests.

pub mod mailbox;
pub mod outbound;

mod error;

pub use error::{Error, Result};
pub use mailbox::{Fault, InMemoryMailbox, InMemoryServer, Operation};
pub use outbound::RecordingOutbound;

use std::path::PathBuf;

use time::{OffsetDateTime, format_description::well_known::Rfc2822};

use faqbot_config::{
	Account, BacklogPolicy, Catalog, Config, EmbeddingKind, EmbeddingProviderConfig, Mailbox,
	Providers, SeenPolicy, Service, Smtp, Watch,
};
use faqbot_matching::ReferenceItem;

pub const FAQ_ADDRESS: &str = "faq@example.com";

/// Two-entry catalog used across the workspace tests.
pub fn faq_catalog() -> Vec<ReferenceItem> {
	vec![
		ReferenceItem::new("shipping", "Ships in 3 days"),
		ReferenceItem::new("returns", "30-day returns"),
	]
}

pub fn local_embedding_config(dimensions: u32) -> EmbeddingProviderConfig {
	EmbeddingProviderConfig {
		kind: EmbeddingKind::LocalHash,
		provider_id: "local".to_string(),
		model: "hash-trigram-v1".to_string(),
		dimensions,
		batch_size: 64,
		api_base: String::new(),
		api_key: String::new(),
		path: "/embeddings".to_string(),
		timeout_ms: 10_000,
		default_headers: serde_json::Map::new(),
		model_dir: PathBuf::from("model-cache"),
		max_tokens: 256,
		hub_url: "https://huggingface.co".to_string(),
		download: false,
	}
}

/// Valid configuration pointing at `catalog_path`, with the local embedder and default policies.
pub fn sample_config(catalog_path: impl Into<PathBuf>) -> Config {
	Config {
		service: Service { log_level: "info".to_string() },
		mailbox: Mailbox {
			host: "imap.example.com".to_string(),
			port: 993,
			folder: "INBOX".to_string(),
			timeout_seconds: 30,
		},
		smtp: Smtp {
			host: "smtp.example.com".to_string(),
			port: 587,
			from_address: None,
			reply_subject: "Re: Your Inquiry".to_string(),
			timeout_seconds: 30,
		},
		account: Account { username: FAQ_ADDRESS.to_string(), credential: "app-password".to_string() },
		catalog: Catalog { path: catalog_path.into() },
		watch: Watch {
			poll_interval_seconds: 2,
			seen_policy: SeenPolicy::Always,
			backlog_policy: BacklogPolicy::Skip,
		},
		providers: Providers { embedding: local_embedding_config(384) },
	}
}

/// Renders a single-part plain-text RFC 822 message addressed to [`FAQ_ADDRESS`].
pub fn raw_message(
	from: &str,
	subject: &str,
	date: OffsetDateTime,
	body: &str,
) -> Result<Vec<u8>> {
	let date = date
		.format(&Rfc2822)
		.map_err(|err| Error::Message(format!("Failed to format Date header: {err}.")))?;

	Ok(format!(
		"From: {from}\r\nTo: {FAQ_ADDRESS}\r\nSubject: {subject}\r\nDate: {date}\r\n\
		 MIME-Version: 1.0\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{body}\r\n"
	)
	.into_bytes())
}

/// A message the parser must reject because it carries no `Date` header.
pub fn raw_message_without_date(from: &str, body: &str) -> Vec<u8> {
	format!("From: {from}\r\nTo: {FAQ_ADDRESS}\r\nSubject: No date\r\n\r\n{body}\r\n").into_bytes()
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;
	use faqbot_mail::MessageId;

	#[test]
	fn raw_message_round_trips_through_the_parser() {
		let at = datetime!(2026-10-19 08:00:05 UTC);
		let raw = raw_message("alice@example.com", "Returns", at, "What's your return policy?")
			.expect("Fixture must render.");
		let message = faqbot_mail::parse_message(MessageId(1), &raw).expect("Fixture must parse.");

		assert_eq!(message.sender, "alice@example.com");
		assert_eq!(message.subject, "Returns");
		assert_eq!(message.body.trim(), "What's your return policy?");
		assert_eq!(message.received_at, at);
	}

	#[test]
	fn dateless_message_is_rejected() {
		let raw = raw_message_without_date("alice@example.com", "Hello");

		assert!(faqbot_mail::parse_message(MessageId(1), &raw).is_err());
	}
}
