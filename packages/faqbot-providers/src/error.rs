use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Embedding request failed: {0}")]
	Http(#[from] reqwest::Error),
	#[error("Invalid header name: {0}")]
	HeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error("Invalid header value: {0}")]
	HeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("Invalid embedding provider config: {message}")]
	InvalidConfig { message: String },
	#[error("Invalid embedding response: {message}")]
	InvalidResponse { message: String },
	#[error("Embedding model unavailable: {message}")]
	Model { message: String },
	#[error("Failed to write model cache at {path:?}: {source}")]
	Cache { path: PathBuf, source: std::io::Error },
}
