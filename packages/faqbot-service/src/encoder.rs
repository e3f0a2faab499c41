use std::sync::Arc;

use crate::{EmbeddingProvider, Error, Result};
use faqbot_config::EmbeddingProviderConfig;
use faqbot_matching::{EmbeddingIndex, ReferenceItem};

/// Maps text into the vector space of one embedding provider configuration.
///
/// Owns the single provider instance of the process. Cloning shares it.
#[derive(Clone)]
pub struct QueryEncoder {
	provider: Arc<dyn EmbeddingProvider>,
	cfg: EmbeddingProviderConfig,
	version: String,
}
impl QueryEncoder {
	pub fn new(provider: Arc<dyn EmbeddingProvider>, cfg: EmbeddingProviderConfig) -> Self {
		let version = crate::embedding_version(&cfg);

		Self { provider, cfg, version }
	}

	pub fn version(&self) -> &str {
		&self.version
	}

	pub fn dimensions(&self) -> usize {
		self.cfg.dimensions as usize
	}

	pub async fn encode(&self, text: &str) -> Result<Vec<f32>> {
		if text.trim().is_empty() {
			return Err(Error::EmptyQuery);
		}

		let texts = [text.to_string()];
		let mut vectors = self.embed_checked(&texts).await?;

		vectors.pop().ok_or_else(|| Error::EmbeddingShape {
			message: "Embedding provider returned no vector for the query.".to_string(),
		})
	}

	/// Encodes `texts` in provider batches of `batch_size`, keeping input order.
	pub async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		if texts.iter().any(|text| text.trim().is_empty()) {
			return Err(Error::EmptyQuery);
		}

		let batch_size = self.cfg.batch_size.max(1) as usize;
		let mut out = Vec::with_capacity(texts.len());

		for batch in texts.chunks(batch_size) {
			out.extend(self.embed_checked(batch).await?);
		}

		Ok(out)
	}

	async fn embed_checked(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		let vectors = self.provider.embed(&self.cfg, texts).await?;

		if vectors.len() != texts.len() {
			return Err(Error::EmbeddingShape {
				message: format!(
					"Embedding provider returned {} vectors for {} inputs.",
					vectors.len(),
					texts.len()
				),
			});
		}

		let expected = self.dimensions();

		for vector in &vectors {
			if vector.len() != expected {
				return Err(Error::EmbeddingShape {
					message: format!(
						"Embedding dimension {} does not match configured dimensions {}.",
						vector.len(),
						expected
					),
				});
			}
		}

		Ok(vectors)
	}
}

/// Encodes every prompt once, in catalog order, and indexes the result.
pub async fn build_index(
	encoder: &QueryEncoder,
	items: Vec<ReferenceItem>,
) -> Result<EmbeddingIndex> {
	if items.is_empty() {
		return Err(faqbot_matching::Error::EmptyCatalog.into());
	}

	if let Some(idx) = items.iter().position(|item| item.prompt.trim().is_empty()) {
		return Err(faqbot_matching::Error::EmptyPrompt { row: idx + 1 }.into());
	}

	let prompts: Vec<String> = items.iter().map(|item| item.prompt.clone()).collect();
	let vectors = encoder.encode_batch(&prompts).await?;
	let index = EmbeddingIndex::new(items, vectors, encoder.version())?;

	tracing::info!(items = index.len(), version = %index.version(), "Embedding index built.");

	Ok(index)
}
