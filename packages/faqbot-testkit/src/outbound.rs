use std::sync::{Arc, Mutex, MutexGuard};

use faqbot_mail::{BoxFuture, Error, Outbound, OutboundEmail, Result};

#[derive(Default)]
struct Ledger {
	attempts: Vec<OutboundEmail>,
	delivered: Vec<OutboundEmail>,
	failing: bool,
}

/// Outbound double that records every send. Clones share the same ledger.
#[derive(Clone, Default)]
pub struct RecordingOutbound {
	ledger: Arc<Mutex<Ledger>>,
}
impl RecordingOutbound {
	pub fn new() -> Self {
		Self::default()
	}

	/// Every send fails with [`Error::Delivery`] until [`Self::set_failing`] clears it.
	pub fn failing() -> Self {
		let outbound = Self::default();

		outbound.set_failing(true);

		outbound
	}

	pub fn set_failing(&self, failing: bool) {
		self.lock().failing = failing;
	}

	/// Every send attempt, delivered or not.
	pub fn attempts(&self) -> Vec<OutboundEmail> {
		self.lock().attempts.clone()
	}

	pub fn delivered(&self) -> Vec<OutboundEmail> {
		self.lock().delivered.clone()
	}

	fn lock(&self) -> MutexGuard<'_, Ledger> {
		self.ledger.lock().unwrap_or_else(|err| err.into_inner())
	}
}
impl Outbound for RecordingOutbound {
	fn send<'a>(&'a self, email: &'a OutboundEmail) -> BoxFuture<'a, Result<()>> {
		let result = {
			let mut ledger = self.lock();

			ledger.attempts.push(email.clone());

			if ledger.failing {
				Err(Error::Delivery { message: format!("550 Mailbox unavailable: {}.", email.to) })
			} else {
				ledger.delivered.push(email.clone());

				Ok(())
			}
		};

		Box::pin(async move { result })
	}
}
