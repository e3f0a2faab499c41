use crate::{Error, ReferenceItem, Result};

/// Closest catalog entry for a query vector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BestMatch {
	pub index: usize,
	pub score: f32,
}

/// Reference items paired with their prompt embeddings.
///
/// Always non-empty, so [`EmbeddingIndex::best_match`] always yields an entry.
#[derive(Debug)]
pub struct EmbeddingIndex {
	items: Vec<ReferenceItem>,
	vectors: Vec<Vec<f32>>,
	dim: usize,
	version: String,
}
impl EmbeddingIndex {
	/// `vectors[i]` must be the embedding of `items[i].prompt`, produced by the encoder named by
	/// `version`.
	pub fn new(
		items: Vec<ReferenceItem>,
		vectors: Vec<Vec<f32>>,
		version: impl Into<String>,
	) -> Result<Self> {
		if items.is_empty() {
			return Err(Error::EmptyCatalog);
		}
		if vectors.len() != items.len() {
			return Err(Error::VectorCount { expected: items.len(), actual: vectors.len() });
		}

		let dim = vectors[0].len();

		if dim == 0 {
			return Err(Error::Dimension { expected: 1, actual: 0 });
		}

		for vector in &vectors {
			if vector.len() != dim {
				return Err(Error::Dimension { expected: dim, actual: vector.len() });
			}
		}

		Ok(Self { items, vectors, dim, version: version.into() })
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn version(&self) -> &str {
		&self.version
	}

	pub fn item(&self, index: usize) -> Option<&ReferenceItem> {
		self.items.get(index)
	}

	/// Scores every stored vector and returns the highest. Ties go to the lowest index.
	pub fn best_match(&self, query: &[f32]) -> Result<BestMatch> {
		if query.len() != self.dim {
			return Err(Error::Dimension { expected: self.dim, actual: query.len() });
		}

		let mut best = BestMatch { index: 0, score: cosine_similarity(query, &self.vectors[0]) };

		for (index, vector) in self.vectors.iter().enumerate().skip(1) {
			let score = cosine_similarity(query, vector);

			if score > best.score {
				best = BestMatch { index, score };
			}
		}

		Ok(best)
	}
}

/// Cosine similarity in `[-1, 1]`.
///
/// Returns 0.0 for mismatched lengths, zero-norm inputs and non-finite results.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
	if a.len() != b.len() {
		return 0.0;
	}

	let mut dot = 0.0_f32;
	let mut norm_a = 0.0_f32;
	let mut norm_b = 0.0_f32;

	for (x, y) in a.iter().zip(b) {
		dot += x * y;
		norm_a += x * x;
		norm_b += y * y;
	}

	if norm_a == 0.0 || norm_b == 0.0 {
		return 0.0;
	}

	let score = dot / (norm_a.sqrt() * norm_b.sqrt());

	if score.is_finite() { score } else { 0.0 }
}
