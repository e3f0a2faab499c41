use crate::{DispatchError, Matcher};
use faqbot_mail::{InboundMessage, Outbound, OutboundEmail};

/// What was sent for one inbound message.
#[derive(Clone, Debug, PartialEq)]
pub struct DispatchReceipt {
	pub to: String,
	pub catalog_index: usize,
	pub score: f32,
}

/// Turns one inbound message into exactly one reply attempt.
pub struct Responder {
	matcher: Matcher,
	outbound: Box<dyn Outbound>,
	from: String,
	subject: String,
}
impl Responder {
	pub fn new(
		matcher: Matcher,
		outbound: Box<dyn Outbound>,
		from: impl Into<String>,
		subject: impl Into<String>,
	) -> Self {
		Self { matcher, outbound, from: from.into(), subject: subject.into() }
	}

	/// Matches the body and sends the response to the sender.
	///
	/// Nothing is sent when matching fails. A send is attempted once and never retried here.
	pub async fn dispatch(&self, message: &InboundMessage) -> Result<DispatchReceipt, DispatchError> {
		let outcome = self
			.matcher
			.respond(&message.body)
			.await
			.map_err(|source| DispatchError::Match { id: message.id, source })?;

		tracing::info!(
			id = %message.id,
			catalog_index = outcome.index,
			score = outcome.score,
			"Generated response."
		);

		let email = OutboundEmail {
			from: self.from.clone(),
			to: message.sender.clone(),
			subject: self.subject.clone(),
			body: outcome.response,
		};

		match self.outbound.send(&email).await {
			Ok(()) => {
				tracing::info!(id = %message.id, to = %email.to, "Reply sent.");

				Ok(DispatchReceipt {
					to: email.to,
					catalog_index: outcome.index,
					score: outcome.score,
				})
			},
			Err(source) => Err(DispatchError::Send { id: message.id, source }),
		}
	}
}
