pub mod encoder;
pub mod matcher;
pub mod responder;

mod error;

pub use encoder::{QueryEncoder, build_index};
pub use error::{DispatchError, Error, Result};
pub use matcher::{MatchOutcome, Matcher};
pub use responder::{DispatchReceipt, Responder};

use std::{future::Future, pin::Pin, sync::Arc};

use faqbot_config::{EmbeddingKind, EmbeddingProviderConfig};
use faqbot_providers::{embedding::HttpEmbedder, hashing::HashEmbedder, onnx::OnnxEmbedder};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, faqbot_providers::Result<Vec<Vec<f32>>>>;
}

impl EmbeddingProvider for HttpEmbedder {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, faqbot_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(HttpEmbedder::embed(self, cfg, texts))
	}
}

impl EmbeddingProvider for HashEmbedder {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, faqbot_providers::Result<Vec<Vec<f32>>>> {
		let vectors = HashEmbedder::embed(self, texts);

		Box::pin(async move { Ok(vectors) })
	}
}

impl EmbeddingProvider for OnnxEmbedder {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, faqbot_providers::Result<Vec<Vec<f32>>>> {
		let result = OnnxEmbedder::embed(self, texts);

		Box::pin(async move { result })
	}
}

/// Fetches whatever the selected provider needs on disk before [`embedding_provider`] runs.
pub async fn prepare_embedding_provider(cfg: &EmbeddingProviderConfig) -> Result<()> {
	if cfg.kind == EmbeddingKind::LocalModel {
		faqbot_providers::onnx::ensure_model_files(cfg).await?;
	}

	Ok(())
}

/// Creates the provider selected by `cfg.kind`. Called once per process.
pub fn embedding_provider(cfg: &EmbeddingProviderConfig) -> Result<Arc<dyn EmbeddingProvider>> {
	let provider: Arc<dyn EmbeddingProvider> = match cfg.kind {
		EmbeddingKind::Http => Arc::new(HttpEmbedder::new(cfg)?),
		EmbeddingKind::LocalHash => Arc::new(HashEmbedder::new(cfg.dimensions as usize)),
		EmbeddingKind::LocalModel => Arc::new(OnnxEmbedder::new(cfg)?),
	};

	Ok(provider)
}

/// Identity of the vector space a provider configuration produces.
pub fn embedding_version(cfg: &EmbeddingProviderConfig) -> String {
	format!("{}:{}:{}", cfg.provider_id, cfg.model, cfg.dimensions)
}
