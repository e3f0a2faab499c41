//! Offline embedder based on signed feature hashing.
//!
//! Every lowercased Unicode word contributes one whole-word feature plus the character trigrams
//! of the word padded with `#` on both sides, so inflections such as "return" and "returns" share
//! most of their features. Features are hashed with BLAKE3 into a bucket and a sign, and the
//! resulting vector is scaled to unit length. No model files or network access are involved.

use unicode_segmentation::UnicodeSegmentation;

const WORD_NAMESPACE: &[u8] = b"w";
const TRIGRAM_NAMESPACE: &[u8] = b"t";
const BOUNDARY: char = '#';

#[derive(Clone, Debug)]
pub struct HashEmbedder {
	dimensions: usize,
}
impl HashEmbedder {
	pub fn new(dimensions: usize) -> Self {
		Self { dimensions }
	}

	pub fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
		texts.iter().map(|text| self.embed_one(text)).collect()
	}

	/// Text without any word yields the zero vector.
	pub fn embed_one(&self, text: &str) -> Vec<f32> {
		let mut vector = vec![0.0_f32; self.dimensions];

		if self.dimensions == 0 {
			return vector;
		}

		let lowered = text.to_lowercase();

		for word in lowered.unicode_words() {
			add_feature(&mut vector, WORD_NAMESPACE, word);

			let padded: Vec<char> =
				std::iter::once(BOUNDARY).chain(word.chars()).chain(std::iter::once(BOUNDARY)).collect();

			for window in padded.windows(3) {
				let trigram: String = window.iter().collect();

				add_feature(&mut vector, TRIGRAM_NAMESPACE, &trigram);
			}
		}

		let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();

		if norm > 0.0 {
			for value in &mut vector {
				*value /= norm;
			}
		}

		vector
	}
}

fn add_feature(vector: &mut [f32], namespace: &[u8], feature: &str) {
	let mut hasher = blake3::Hasher::new();

	hasher.update(namespace);
	hasher.update(&[0]);
	hasher.update(feature.as_bytes());

	let hash = hasher.finalize();
	let bytes = hash.as_bytes();
	let mut bucket = [0_u8; 8];

	bucket.copy_from_slice(&bytes[..8]);

	let idx = (u64::from_le_bytes(bucket) % vector.len() as u64) as usize;
	let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };

	vector[idx] += sign;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn cosine(a: &[f32], b: &[f32]) -> f32 {
		a.iter().zip(b).map(|(x, y)| x * y).sum()
	}

	#[test]
	fn same_text_same_vector() {
		let embedder = HashEmbedder::new(384);

		assert_eq!(embedder.embed_one("Where is my order?"), embedder.embed_one("Where is my order?"));
	}

	#[test]
	fn vectors_have_configured_dimension_and_unit_norm() {
		let embedder = HashEmbedder::new(128);
		let vector = embedder.embed_one("the quick brown fox");
		let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();

		assert_eq!(vector.len(), 128);
		assert!((norm - 1.0).abs() < 1e-5, "Unexpected norm {norm}.");
	}

	#[test]
	fn case_and_punctuation_are_ignored() {
		let embedder = HashEmbedder::new(384);

		assert_eq!(embedder.embed_one("Shipping, please!"), embedder.embed_one("shipping please"));
	}

	#[test]
	fn text_without_words_is_the_zero_vector() {
		let embedder = HashEmbedder::new(16);

		assert!(embedder.embed_one(" ?! ").iter().all(|value| *value == 0.0));
	}

	#[test]
	fn shared_words_score_higher_than_unrelated_words() {
		let embedder = HashEmbedder::new(384);
		let query = embedder.embed_one("how long does shipping take");
		let shipping = embedder.embed_one("shipping");
		let returns = embedder.embed_one("returns");

		assert!(cosine(&query, &shipping) > cosine(&query, &returns));
	}

	#[test]
	fn inflections_share_trigrams() {
		let embedder = HashEmbedder::new(384);
		let query = embedder.embed_one("what's your return policy?");
		let returns = embedder.embed_one("returns");
		let shipping = embedder.embed_one("shipping");

		assert!(cosine(&query, &returns) > cosine(&query, &shipping));
	}
}
