use std::{fmt, path::PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub mailbox: Mailbox,
	pub smtp: Smtp,
	pub account: Account,
	pub catalog: Catalog,
	#[serde(default)]
	pub watch: Watch,
	pub providers: Providers,
}
impl Config {
	/// Address replies are sent from. Falls back to the login name.
	pub fn reply_from(&self) -> &str {
		self.smtp.from_address.as_deref().unwrap_or(&self.account.username)
	}
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Mailbox {
	pub host: String,
	#[serde(default = "default_imap_port")]
	pub port: u16,
	#[serde(default = "default_folder")]
	pub folder: String,
	#[serde(default = "default_timeout_seconds")]
	pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct Smtp {
	pub host: String,
	#[serde(default = "default_smtp_port")]
	pub port: u16,
	/// Optional. Empty values fall back to `account.username`.
	#[serde(default)]
	pub from_address: Option<String>,
	#[serde(default = "default_reply_subject")]
	pub reply_subject: String,
	#[serde(default = "default_timeout_seconds")]
	pub timeout_seconds: u64,
}

/// Login shared by the mailbox and the SMTP relay.
#[derive(Clone, Deserialize)]
pub struct Account {
	pub username: String,
	pub credential: String,
}
impl fmt::Debug for Account {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Account")
			.field("username", &self.username)
			.field("credential", &"[REDACTED]")
			.finish()
	}
}

#[derive(Debug, Deserialize)]
pub struct Catalog {
	pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct Watch {
	#[serde(default = "default_poll_interval_seconds")]
	pub poll_interval_seconds: u64,
	#[serde(default)]
	pub seen_policy: SeenPolicy,
	#[serde(default)]
	pub backlog_policy: BacklogPolicy,
}
impl Default for Watch {
	fn default() -> Self {
		Self {
			poll_interval_seconds: default_poll_interval_seconds(),
			seen_policy: SeenPolicy::default(),
			backlog_policy: BacklogPolicy::default(),
		}
	}
}

/// When a dispatched message gets its seen flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeenPolicy {
	/// Flag after every dispatch attempt. A failed reply is never retried.
	#[default]
	Always,
	/// Flag only after the reply was delivered. Failed messages stay unseen and are retried.
	OnSuccess,
}

/// What to do with unseen messages dated at or before the session start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BacklogPolicy {
	/// Leave them unseen and skip them on every pass.
	#[default]
	Skip,
	/// Flag them seen without replying.
	MarkSeen,
	/// Answer them as if they arrived during the session.
	Answer,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingKind {
	/// OpenAI-compatible embeddings endpoint.
	Http,
	/// Offline feature-hashing embedder.
	LocalHash,
	/// Pretrained sentence-embedding model run in-process through ONNX Runtime.
	LocalModel,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub kind: EmbeddingKind,
	pub provider_id: String,
	pub model: String,
	pub dimensions: u32,
	#[serde(default = "default_batch_size")]
	pub batch_size: u32,
	#[serde(default)]
	pub api_base: String,
	#[serde(default)]
	pub api_key: String,
	#[serde(default = "default_embedding_path")]
	pub path: String,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
	/// Cache directory for `local_model` weights and tokenizers.
	#[serde(default = "default_model_dir")]
	pub model_dir: PathBuf,
	/// Tokens kept per text before inference. Longer input is truncated.
	#[serde(default = "default_max_tokens")]
	pub max_tokens: usize,
	#[serde(default = "default_hub_url")]
	pub hub_url: String,
	/// Fetch missing model files from `hub_url` at startup.
	#[serde(default = "default_download")]
	pub download: bool,
}

fn default_imap_port() -> u16 {
	993
}

fn default_smtp_port() -> u16 {
	587
}

fn default_folder() -> String {
	"INBOX".to_string()
}

fn default_reply_subject() -> String {
	"Re: Your Inquiry".to_string()
}

fn default_timeout_seconds() -> u64 {
	30
}

fn default_poll_interval_seconds() -> u64 {
	2
}

fn default_batch_size() -> u32 {
	64
}

fn default_embedding_path() -> String {
	"/embeddings".to_string()
}

fn default_timeout_ms() -> u64 {
	10_000
}

fn default_model_dir() -> PathBuf {
	PathBuf::from("model-cache")
}

fn default_max_tokens() -> usize {
	256
}

fn default_hub_url() -> String {
	"https://huggingface.co".to_string()
}

fn default_download() -> bool {
	true
}
