use std::fmt;

use mailparse::{DispositionType, MailAddr, MailHeaderMap, ParsedMail};
use time::OffsetDateTime;

use crate::{Error, Result};

/// Mailbox handle for one message. The IMAP adapter uses UIDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u32);
impl fmt::Display for MessageId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[derive(Clone, Debug)]
pub struct InboundMessage {
	pub id: MessageId,
	/// Bare address from the `From` header, without display name.
	pub sender: String,
	pub subject: String,
	/// Plain-text body. Empty when the message carries no readable text part.
	pub body: String,
	/// `Date` header converted to UTC.
	pub received_at: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundEmail {
	pub from: String,
	pub to: String,
	pub subject: String,
	pub body: String,
}

/// Parses a raw RFC 822 message.
///
/// Missing or malformed `From` and `Date` headers are errors. An undecodable body is not: it
/// becomes an empty body so the caller can decide what an unanswerable message means.
pub fn parse_message(id: MessageId, raw: &[u8]) -> Result<InboundMessage> {
	let parse_err = |message: String| Error::Parse { id, message };
	let mail = mailparse::parse_mail(raw).map_err(|err| parse_err(err.to_string()))?;
	let headers = mail.get_headers();
	let from = headers
		.get_first_value("From")
		.ok_or_else(|| parse_err("missing From header".to_string()))?;
	let sender =
		sender_address(&from).ok_or_else(|| parse_err(format!("no address in {from:?}")))?;
	let subject = headers.get_first_value("Subject").unwrap_or_default();
	let date = headers
		.get_first_value("Date")
		.ok_or_else(|| parse_err("missing Date header".to_string()))?;
	let received_at =
		parse_date(&date).ok_or_else(|| parse_err(format!("invalid Date {date:?}")))?;
	let body = plain_text_body(id, &mail);

	Ok(InboundMessage { id, sender, subject, body, received_at })
}

fn sender_address(from: &str) -> Option<String> {
	let addrs = mailparse::addrparse(from).ok()?;

	addrs.iter().find_map(|addr| match addr {
		MailAddr::Single(info) => Some(info.addr.clone()),
		MailAddr::Group(group) => group.addrs.first().map(|info| info.addr.clone()),
	})
}

fn parse_date(raw: &str) -> Option<OffsetDateTime> {
	let timestamp = mailparse::dateparse(raw).ok()?;

	OffsetDateTime::from_unix_timestamp(timestamp).ok()
}

fn plain_text_body(id: MessageId, mail: &ParsedMail<'_>) -> String {
	let Some(part) = first_text_part(mail, true) else {
		tracing::debug!(message_id = %id, "Message has no plain-text part.");

		return String::new();
	};

	match part.get_body() {
		Ok(body) => body,
		Err(err) => {
			tracing::warn!(message_id = %id, error = %err, "Failed to decode message body.");

			String::new()
		},
	}
}

/// Depth-first search for the first inline `text/plain` leaf. A single-part message is accepted
/// when it is any `text/*` type.
fn first_text_part<'m, 'a>(
	mail: &'m ParsedMail<'a>,
	top_level: bool,
) -> Option<&'m ParsedMail<'a>> {
	if !mail.subparts.is_empty() {
		return mail.subparts.iter().find_map(|part| first_text_part(part, false));
	}
	if matches!(mail.get_content_disposition().disposition, DispositionType::Attachment) {
		return None;
	}

	let mimetype = mail.ctype.mimetype.as_str();

	if mimetype == "text/plain" || (top_level && mimetype.starts_with("text/")) {
		Some(mail)
	} else {
		None
	}
}
