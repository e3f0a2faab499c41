pub mod catalog;
pub mod index;

mod error;

pub use catalog::{ReferenceItem, load_csv};
pub use error::{Error, Result};
pub use index::{BestMatch, EmbeddingIndex, cosine_similarity};
