use faqbot_mail::MessageId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Query text is empty.")]
	EmptyQuery,
	#[error("Embedding provider failed: {0}")]
	Provider(#[from] faqbot_providers::Error),
	#[error("{message}")]
	EmbeddingShape { message: String },
	#[error("Encoder version {encoder} does not match index version {index}.")]
	VersionMismatch { encoder: String, index: String },
	#[error(transparent)]
	Matching(#[from] faqbot_matching::Error),
}

/// Failure of one dispatch, split by the stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
	#[error("No response could be matched for message {id}: {source}")]
	Match { id: MessageId, source: Error },
	#[error("Reply for message {id} was not delivered: {source}")]
	Send { id: MessageId, source: faqbot_mail::Error },
}
impl DispatchError {
	pub fn id(&self) -> MessageId {
		match self {
			Self::Match { id, .. } | Self::Send { id, .. } => *id,
		}
	}
}
