//! Vector store error types.

use std::path::PathBuf;

use crate::error::LlmError;

/// Errors raised while building, querying or persisting a [`VectorStore`].
///
/// [`VectorStore`]: super::VectorStore
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No index file exists in the given directory.
    #[error("no vector index found in {0}")]
    NotFound(PathBuf),

    /// The index was built with a different embedding model.
    #[error("index was built with embedding model '{found}', but '{expected}' is configured")]
    ModelMismatch {
        /// Model configured now.
        expected: String,
        /// Model recorded in the index.
        found: String,
    },

    /// A vector does not match the dimensionality of the index.
    #[error("embedding has {got} dimensions, index expects {expected}")]
    DimensionMismatch {
        /// Dimensionality of the index.
        expected: usize,
        /// Dimensionality of the offending vector.
        got: usize,
    },

    /// The index file uses a format this build cannot read.
    #[error("unsupported index format version {0}")]
    UnsupportedVersion(u32),

    /// Embedding the documents or the query failed.
    #[error("embedding failed: {0}")]
    Embedding(#[from] LlmError),

    /// Reading or writing the index failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The index file could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
