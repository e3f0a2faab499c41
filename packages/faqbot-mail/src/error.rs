use crate::MessageId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Mailbox authentication failed: {message}")]
	Auth { message: String },
	#[error("Mail transport failed: {message}")]
	Connection { message: String },
	#[error("Mail protocol error: {message}")]
	Protocol { message: String },
	#[error("Mailbox {operation} timed out after {seconds}s.")]
	Timeout { operation: &'static str, seconds: u64 },
	#[error("Failed to parse message {id}: {message}")]
	Parse { id: MessageId, message: String },
	#[error("Invalid email address {address:?}.")]
	Address { address: String, source: lettre::address::AddressError },
	#[error("Failed to compose reply: {message}")]
	Compose { message: String },
	#[error("SMTP delivery failed: {message}")]
	Delivery { message: String },
}
impl Error {
	/// Whether the session that produced this error should be dropped and reopened.
	pub fn is_connection(&self) -> bool {
		matches!(self, Self::Connection { .. } | Self::Timeout { .. })
	}
}
