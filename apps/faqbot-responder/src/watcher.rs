//! Inbox polling loop.
//!
//! The watcher owns at most one mailbox session. It starts `Disconnected`, connects, then polls
//! the configured folder every interval. A transport failure drops the session and the next
//! interval reconnects; rejected credentials stop the loop.

use std::time::Duration;

use time::OffsetDateTime;

use crate::error::{PollError, WatchError};
use faqbot_config::{BacklogPolicy, SeenPolicy};
use faqbot_mail::{Error as MailError, InboundMessage, Mailbox, MailboxConnector, MessageId};
use faqbot_service::Responder;

/// Instant the process started watching. Only mail dated after it is current.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchSession {
	started_at: OffsetDateTime,
}
impl WatchSession {
	pub fn new(started_at: OffsetDateTime) -> Self {
		Self { started_at }
	}

	pub fn started_at(&self) -> OffsetDateTime {
		self.started_at
	}

	/// Strictly after the start. A message dated exactly at the start is backlog.
	pub fn admits(&self, received_at: OffsetDateTime) -> bool {
		received_at > self.started_at
	}

	pub fn is_current(&self, message: &InboundMessage) -> bool {
		self.admits(message.received_at)
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WatchPolicy {
	pub seen: SeenPolicy,
	pub backlog: BacklogPolicy,
}
impl From<&faqbot_config::Watch> for WatchPolicy {
	fn from(cfg: &faqbot_config::Watch) -> Self {
		Self { seen: cfg.seen_policy, backlog: cfg.backlog_policy }
	}
}

/// Counts for one poll iteration.
///
/// `backlog` counts every message dated at or before the session start, whatever the backlog
/// policy did with it. With [`BacklogPolicy::Answer`] such a message also lands in `answered` or
/// `failed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollReport {
	pub found: usize,
	pub answered: usize,
	pub failed: usize,
	pub backlog: usize,
	pub unparseable: usize,
}

/// One pass over the unseen messages of a folder.
pub struct Poller {
	responder: Responder,
	session: WatchSession,
	policy: WatchPolicy,
	folder: String,
}
impl Poller {
	pub fn new(
		responder: Responder,
		session: WatchSession,
		policy: WatchPolicy,
		folder: impl Into<String>,
	) -> Self {
		Self { responder, session, policy, folder: folder.into() }
	}

	pub fn session(&self) -> WatchSession {
		self.session
	}

	/// Processes unseen messages in ascending id order.
	///
	/// A mailbox failure aborts the pass. A message that cannot be parsed is left unseen and the
	/// pass continues.
	pub async fn poll_once(&self, mailbox: &mut dyn Mailbox) -> Result<PollReport, PollError> {
		mailbox
			.select_folder(&self.folder)
			.await
			.map_err(|source| PollError::Select { folder: self.folder.clone(), source })?;

		let ids = mailbox.search_unseen().await.map_err(PollError::Search)?;
		let mut report = PollReport { found: ids.len(), ..Default::default() };

		if !ids.is_empty() {
			tracing::info!(count = ids.len(), folder = %self.folder, "Found unseen messages.");
		}

		for id in ids {
			let raw = mailbox.fetch(id).await.map_err(|source| PollError::Fetch { id, source })?;
			let message = match faqbot_mail::parse_message(id, &raw) {
				Ok(message) => message,
				Err(err) => {
					tracing::warn!(%id, error = %err, "Leaving unparseable message unseen.");

					report.unparseable += 1;

					continue;
				},
			};

			if !self.session.is_current(&message) {
				report.backlog += 1;

				match self.policy.backlog {
					BacklogPolicy::Skip => {
						tracing::debug!(%id, received_at = %message.received_at, "Skipping backlog message.");

						continue;
					},
					BacklogPolicy::MarkSeen => {
						mark_seen(mailbox, id).await?;

						continue;
					},
					BacklogPolicy::Answer => {},
				}
			}

			let delivered = match self.responder.dispatch(&message).await {
				Ok(_) => {
					report.answered += 1;

					true
				},
				Err(err) => {
					tracing::error!(%id, sender = %message.sender, error = %err, "Dispatch failed.");

					report.failed += 1;

					false
				},
			};

			if delivered || self.policy.seen == SeenPolicy::Always {
				mark_seen(mailbox, id).await?;
			} else {
				tracing::info!(%id, "Leaving message unseen for retry.");
			}
		}

		Ok(report)
	}
}

pub struct Watcher {
	connector: Box<dyn MailboxConnector>,
	poller: Poller,
	poll_interval: Duration,
	mailbox: Option<Box<dyn Mailbox>>,
}
impl Watcher {
	pub fn new(
		connector: Box<dyn MailboxConnector>,
		poller: Poller,
		poll_interval: Duration,
	) -> Self {
		Self { connector, poller, poll_interval, mailbox: None }
	}

	pub fn is_connected(&self) -> bool {
		self.mailbox.is_some()
	}

	/// Opens the first session. Every failure here is fatal.
	pub async fn connect(&mut self) -> Result<(), WatchError> {
		let mailbox = self.connector.connect().await.map_err(|err| match err {
			MailError::Auth { .. } => WatchError::Auth(err),
			other => WatchError::Connect(other),
		})?;

		tracing::info!(started_at = %self.poller.session().started_at(), "Mailbox connected.");

		self.mailbox = Some(mailbox);

		Ok(())
	}

	/// Runs one interval: reconnect when needed, then poll.
	///
	/// Returns `Ok(None)` when no pass completed. Only rejected credentials are an error.
	pub async fn tick(&mut self) -> Result<Option<PollReport>, WatchError> {
		if self.mailbox.is_none() {
			match self.connector.connect().await {
				Ok(mailbox) => {
					tracing::info!("Mailbox reconnected.");

					self.mailbox = Some(mailbox);
				},
				Err(err @ MailError::Auth { .. }) => return Err(WatchError::Auth(err)),
				Err(err) => {
					tracing::warn!(error = %err, "Mailbox reconnect failed.");

					return Ok(None);
				},
			}
		}

		let Some(mailbox) = self.mailbox.as_deref_mut() else {
			return Ok(None);
		};

		match self.poller.poll_once(mailbox).await {
			Ok(report) => {
				tracing::debug!(
					found = report.found,
					answered = report.answered,
					failed = report.failed,
					backlog = report.backlog,
					unparseable = report.unparseable,
					"Poll iteration finished."
				);

				Ok(Some(report))
			},
			Err(err) => {
				tracing::error!(error = %err, "Poll iteration failed.");

				if err.is_connection() {
					tracing::warn!("Dropping mailbox session. Reconnecting on the next interval.");

					self.mailbox = None;
				}

				Ok(None)
			},
		}
	}

	/// Polls until a fatal error. Connects first when no session is open.
	pub async fn run(&mut self) -> Result<(), WatchError> {
		if self.mailbox.is_none() {
			self.connect().await?;
		}

		loop {
			self.tick().await?;

			tokio::time::sleep(self.poll_interval).await;
		}
	}
}

async fn mark_seen(mailbox: &mut dyn Mailbox, id: MessageId) -> Result<(), PollError> {
	mailbox.mark_seen(id).await.map_err(|source| PollError::MarkSeen { id, source })?;

	tracing::debug!(%id, "Marked message seen.");

	Ok(())
}

#[cfg(test)]
mod tests {
	use time::{Duration, macros::datetime};

	use super::*;

	#[test]
	fn session_boundary_is_strict() {
		let started_at = datetime!(2026-10-19 08:00:00.000000 UTC);
		let session = WatchSession::new(started_at);

		assert!(!session.admits(started_at));
		assert!(!session.admits(started_at - Duration::seconds(1)));
		assert!(session.admits(started_at + Duration::microseconds(1)));
	}

	#[test]
	fn policy_follows_watch_config() {
		let cfg = faqbot_config::Watch {
			poll_interval_seconds: 2,
			seen_policy: SeenPolicy::OnSuccess,
			backlog_policy: BacklogPolicy::Answer,
		};

		assert_eq!(WatchPolicy::from(&cfg), WatchPolicy {
			seen: SeenPolicy::OnSuccess,
			backlog: BacklogPolicy::Answer,
		});
	}
}
