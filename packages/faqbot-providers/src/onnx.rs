//! In-process sentence embeddings through ONNX Runtime.
//!
//! Files for a model live under `model_dir/<model with "/" replaced by "--">/`. Call
//! [`ensure_model_files`] once at startup to fill the cache from the model hub; [`OnnxEmbedder`]
//! itself only reads the cache and never touches the network.
//!
//! Token states are mean-pooled over the attention mask and scaled to unit length, which is how
//! sentence-transformers checkpoints such as `all-MiniLM-L6-v2` are meant to be read.

use std::{
	path::{Path, PathBuf},
	sync::{Mutex, PoisonError},
	thread,
};

use ndarray::Array2;
use ort::{
	session::{Session, builder::GraphOptimizationLevel},
	value::Tensor,
};
use tokenizers::{Tokenizer, TruncationDirection, TruncationParams, TruncationStrategy};

use crate::{Error, Result};
use faqbot_config::EmbeddingProviderConfig;

const MODEL_FILE: &str = "model.onnx";
const TOKENIZER_FILE: &str = "tokenizer.json";
const HUB_MODEL_PATH: &str = "onnx/model.onnx";
const DEFAULT_OUTPUT: &str = "last_hidden_state";

/// Cache locations and hub URLs for one model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelFiles {
	pub model: PathBuf,
	pub tokenizer: PathBuf,
	pub model_url: String,
	pub tokenizer_url: String,
}
impl ModelFiles {
	pub fn new(cfg: &EmbeddingProviderConfig) -> Self {
		let dir = cfg.model_dir.join(cfg.model.replace('/', "--"));
		let base = format!("{}/{}/resolve/main", cfg.hub_url, cfg.model);

		Self {
			model: dir.join(MODEL_FILE),
			tokenizer: dir.join(TOKENIZER_FILE),
			model_url: format!("{base}/{HUB_MODEL_PATH}"),
			tokenizer_url: format!("{base}/{TOKENIZER_FILE}"),
		}
	}

	fn entries(&self) -> [(&Path, &str); 2] {
		[(&self.model, &self.model_url), (&self.tokenizer, &self.tokenizer_url)]
	}

	fn check_cached(&self) -> Result<()> {
		for (path, url) in self.entries() {
			if !path.is_file() {
				return Err(missing_file(path, url));
			}
		}

		Ok(())
	}
}

/// Makes sure the model and tokenizer are cached, downloading what is missing when
/// `cfg.download` is set.
pub async fn ensure_model_files(cfg: &EmbeddingProviderConfig) -> Result<ModelFiles> {
	let files = ModelFiles::new(cfg);

	for (path, url) in files.entries() {
		if path.is_file() {
			continue;
		}
		if !cfg.download {
			return Err(missing_file(path, url));
		}

		download(url, path).await?;
	}

	Ok(files)
}

/// Pretrained encoder loaded from the local cache.
///
/// Inference runs on the calling thread. The session is shared behind a lock, so concurrent
/// callers take turns.
pub struct OnnxEmbedder {
	session: Mutex<Session>,
	tokenizer: Tokenizer,
}
impl OnnxEmbedder {
	pub fn new(cfg: &EmbeddingProviderConfig) -> Result<Self> {
		let files = ModelFiles::new(cfg);

		files.check_cached()?;

		let threads = thread::available_parallelism().map(usize::from).unwrap_or(1);
		let session = Session::builder()
			.map_err(|err| model_error("Failed to create session builder", err))?
			.with_optimization_level(GraphOptimizationLevel::Level3)
			.map_err(|err| model_error("Failed to set optimization level", err))?
			.with_intra_threads(threads)
			.map_err(|err| model_error("Failed to set intra threads", err))?
			.commit_from_file(&files.model)
			.map_err(|err| model_error("Failed to load model", err))?;
		let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
			.map_err(|err| model_error("Failed to load tokenizer", err))?;

		tokenizer.with_padding(None);
		tokenizer
			.with_truncation(Some(TruncationParams {
				max_length: cfg.max_tokens,
				strategy: TruncationStrategy::LongestFirst,
				stride: 0,
				direction: TruncationDirection::Right,
			}))
			.map_err(|err| model_error("Failed to apply truncation", err))?;

		tracing::info!(model = %cfg.model, path = %files.model.display(), "Embedding model loaded.");

		Ok(Self { session: Mutex::new(session), tokenizer })
	}

	pub fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);

		texts.iter().map(|text| self.embed_one(&mut session, text)).collect()
	}

	fn embed_one(&self, session: &mut Session, text: &str) -> Result<Vec<f32>> {
		let encoding = self
			.tokenizer
			.encode(text, true)
			.map_err(|err| model_error("Tokenization failed", err))?;
		let mask = widen(encoding.get_attention_mask());
		let ids = tensor(widen(encoding.get_ids()))?;
		let attention = tensor(mask.clone())?;
		let types = tensor(widen(encoding.get_type_ids()))?;
		let input_names: Vec<String> =
			session.inputs.iter().map(|input| input.name.clone()).collect();
		let output_name = session
			.outputs
			.first()
			.map(|output| output.name.clone())
			.unwrap_or_else(|| DEFAULT_OUTPUT.to_string());
		let outputs = match input_names.as_slice() {
			[ids_name, mask_name, types_name, ..] => session.run(ort::inputs![
				ids_name.clone() => ids,
				mask_name.clone() => attention,
				types_name.clone() => types
			]),
			[ids_name, mask_name] => session.run(ort::inputs![
				ids_name.clone() => ids,
				mask_name.clone() => attention
			]),
			_ => {
				return Err(Error::Model {
					message: format!("Model takes {} inputs; expected 2 or 3.", input_names.len()),
				});
			},
		}
		.map_err(|err| model_error("Inference failed", err))?;
		let output = outputs.get(&output_name).ok_or_else(|| Error::InvalidResponse {
			message: format!("Model produced no {output_name:?} output."),
		})?;
		let (_shape, hidden) = output
			.try_extract_tensor::<f32>()
			.map_err(|err| model_error("Failed to read model output", err))?;
		let mut pooled = mean_pool(hidden, &mask).ok_or_else(|| Error::InvalidResponse {
			message: format!(
				"Model output of {} values does not fit {} tokens.",
				hidden.len(),
				mask.len()
			),
		})?;

		if pooled.iter().any(|value| !value.is_finite()) {
			return Err(Error::InvalidResponse {
				message: "Embedding contains non-finite values.".to_string(),
			});
		}

		normalize(&mut pooled);

		Ok(pooled)
	}
}

/// Averages the token rows of `hidden` whose mask entry is set.
///
/// `hidden` is `[tokens, width]` in row-major order. Returns `None` when the shapes disagree or
/// no token is attended.
fn mean_pool(hidden: &[f32], mask: &[i64]) -> Option<Vec<f32>> {
	if mask.is_empty() || hidden.is_empty() || hidden.len() % mask.len() != 0 {
		return None;
	}

	let width = hidden.len() / mask.len();
	let mut pooled = vec![0.0_f32; width];
	let mut attended = 0_u32;

	for (row, keep) in hidden.chunks_exact(width).zip(mask) {
		if *keep == 0 {
			continue;
		}

		attended += 1;

		for (acc, value) in pooled.iter_mut().zip(row) {
			*acc += value;
		}
	}

	if attended == 0 {
		return None;
	}

	for value in &mut pooled {
		*value /= attended as f32;
	}

	Some(pooled)
}

fn normalize(vector: &mut [f32]) {
	let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();

	if norm > 0.0 {
		for value in vector {
			*value /= norm;
		}
	}
}

fn widen(values: &[u32]) -> Vec<i64> {
	values.iter().map(|value| i64::from(*value)).collect()
}

fn tensor(values: Vec<i64>) -> Result<Tensor<i64>> {
	let array = Array2::from_shape_vec((1, values.len()), values)
		.map_err(|err| model_error("Failed to shape model input", err))?;

	Tensor::from_array(array).map_err(|err| model_error("Failed to create input tensor", err))
}

async fn download(url: &str, path: &Path) -> Result<()> {
	tracing::info!(%url, path = %path.display(), "Downloading model file.");

	let bytes = reqwest::get(url).await?.error_for_status()?.bytes().await?;
	let partial = path.with_extension("part");

	if let Some(dir) = path.parent() {
		tokio::fs::create_dir_all(dir)
			.await
			.map_err(|source| Error::Cache { path: dir.to_path_buf(), source })?;
	}

	tokio::fs::write(&partial, &bytes)
		.await
		.map_err(|source| Error::Cache { path: partial.clone(), source })?;
	tokio::fs::rename(&partial, path)
		.await
		.map_err(|source| Error::Cache { path: path.to_path_buf(), source })?;

	tracing::info!(path = %path.display(), bytes = bytes.len(), "Model file cached.");

	Ok(())
}

fn missing_file(path: &Path, url: &str) -> Error {
	Error::Model {
		message: format!(
			"{} is not cached. Download {url} to that path or set providers.embedding.download = true.",
			path.display()
		),
	}
}

fn model_error(context: &str, err: impl std::fmt::Display) -> Error {
	Error::Model { message: format!("{context}: {err}") }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mean_pool_skips_padding_tokens() {
		let hidden = [1.0, 2.0, 3.0, 4.0, 100.0, 100.0];
		let pooled = mean_pool(&hidden, &[1, 1, 0]).expect("Shapes must agree.");

		assert_eq!(pooled, vec![2.0, 3.0]);
	}

	#[test]
	fn mean_pool_rejects_mismatched_shapes() {
		assert_eq!(mean_pool(&[1.0, 2.0, 3.0], &[1, 1]), None);
		assert_eq!(mean_pool(&[], &[1]), None);
		assert_eq!(mean_pool(&[1.0, 2.0], &[0, 0]), None);
	}

	#[test]
	fn normalize_scales_to_unit_length() {
		let mut vector = vec![3.0, 4.0];

		normalize(&mut vector);

		assert_eq!(vector, vec![0.6, 0.8]);

		let mut zero = vec![0.0, 0.0];

		normalize(&mut zero);

		assert_eq!(zero, vec![0.0, 0.0]);
	}
}
