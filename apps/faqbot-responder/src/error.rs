use faqbot_mail::MessageId;

/// Failures that stop the watcher and the process.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
	#[error("Mailbox rejected the configured credentials: {0}")]
	Auth(#[source] faqbot_mail::Error),
	#[error("Initial mailbox connection failed: {0}")]
	Connect(#[source] faqbot_mail::Error),
}

/// Mailbox failures that abort one poll iteration.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
	#[error("Failed to select folder {folder}: {source}")]
	Select { folder: String, source: faqbot_mail::Error },
	#[error("Failed to search for unseen messages: {0}")]
	Search(#[source] faqbot_mail::Error),
	#[error("Failed to fetch message {id}: {source}")]
	Fetch { id: MessageId, source: faqbot_mail::Error },
	#[error("Failed to mark message {id} seen: {source}")]
	MarkSeen { id: MessageId, source: faqbot_mail::Error },
}
impl PollError {
	/// The session is unusable and must be reopened.
	pub fn is_connection(&self) -> bool {
		self.mail_error().is_connection()
	}

	fn mail_error(&self) -> &faqbot_mail::Error {
		match self {
			Self::Select { source, .. }
			| Self::Fetch { source, .. }
			| Self::MarkSeen { source, .. }
			| Self::Search(source) => source,
		}
	}
}
