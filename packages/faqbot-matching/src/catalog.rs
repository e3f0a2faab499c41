//! FAQ catalog: an ordered, immutable list of prompt/response pairs.

use std::path::Path;

use serde::Deserialize;

use crate::{Error, Result};

pub const PROMPT_COLUMN: &str = "prompt";
pub const RESPONSE_COLUMN: &str = "response";

/// One catalog entry. Its identity is its position in the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ReferenceItem {
	pub prompt: String,
	pub response: String,
}
impl ReferenceItem {
	pub fn new(prompt: impl Into<String>, response: impl Into<String>) -> Self {
		Self { prompt: prompt.into(), response: response.into() }
	}
}

/// Loads a catalog from a CSV file with a header row.
///
/// Header names are trimmed before lookup, extra columns are ignored and row order is kept.
/// A catalog without rows is rejected because no match would be possible.
pub fn load_csv(path: &Path) -> Result<Vec<ReferenceItem>> {
	let read_err = |source| Error::ReadCatalog { path: path.to_path_buf(), source };
	let mut reader =
		csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_path(path).map_err(read_err)?;
	let headers = reader.headers().map_err(read_err)?;

	for column in [PROMPT_COLUMN, RESPONSE_COLUMN] {
		if !headers.iter().any(|header| header == column) {
			return Err(Error::MissingColumn { path: path.to_path_buf(), column });
		}
	}

	let mut items = Vec::new();

	for (idx, record) in reader.deserialize::<ReferenceItem>().enumerate() {
		let item = record.map_err(read_err)?;

		if item.prompt.trim().is_empty() {
			return Err(Error::EmptyPrompt { row: idx + 1 });
		}

		items.push(item);
	}

	if items.is_empty() {
		return Err(Error::EmptyCatalog);
	}

	tracing::debug!(path = %path.display(), items = items.len(), "Catalog parsed.");

	Ok(items)
}
