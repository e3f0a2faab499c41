pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read catalog at {path:?}.")]
	ReadCatalog { path: std::path::PathBuf, source: csv::Error },
	#[error("Catalog at {path:?} is missing the {column} column.")]
	MissingColumn { path: std::path::PathBuf, column: &'static str },
	#[error("Catalog row {row} has an empty prompt.")]
	EmptyPrompt { row: usize },
	#[error("Catalog is empty; no match is possible.")]
	EmptyCatalog,
	#[error("Expected {expected} embeddings, got {actual}.")]
	VectorCount { expected: usize, actual: usize },
	#[error("Embedding dimension {actual} does not match index dimension {expected}.")]
	Dimension { expected: usize, actual: usize },
}
