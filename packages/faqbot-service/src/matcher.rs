use crate::{Error, QueryEncoder, Result};
use faqbot_matching::EmbeddingIndex;

#[derive(Clone, Debug, PartialEq)]
pub struct MatchOutcome {
	/// Position of the matched entry in catalog order.
	pub index: usize,
	pub score: f32,
	pub response: String,
}

/// Answers free text with the response of the closest catalog prompt.
pub struct Matcher {
	encoder: QueryEncoder,
	index: EmbeddingIndex,
}
impl Matcher {
	/// Refuses an index built by a different encoder configuration.
	pub fn new(encoder: QueryEncoder, index: EmbeddingIndex) -> Result<Self> {
		if encoder.version() != index.version() {
			return Err(Error::VersionMismatch {
				encoder: encoder.version().to_string(),
				index: index.version().to_string(),
			});
		}

		Ok(Self { encoder, index })
	}

	pub async fn respond(&self, text: &str) -> Result<MatchOutcome> {
		let query = self.encoder.encode(text).await?;
		let best = self.index.best_match(&query)?;
		let item = self
			.index
			.item(best.index)
			.ok_or(faqbot_matching::Error::VectorCount {
				expected: self.index.len(),
				actual: best.index,
			})?;

		tracing::debug!(index = best.index, score = best.score, "Matched catalog entry.");

		Ok(MatchOutcome { index: best.index, score: best.score, response: item.response.clone() })
	}
}
