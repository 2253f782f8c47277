//! Error types for the indexing and retrieval crate.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building or querying an index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Embedding operation failed.
    #[error("embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),

    /// Vector index operation failed.
    #[error("index error: {0}")]
    Index(String),

    /// Persistence operation failed.
    #[error("persistence error at {path}: {source}")]
    Persistence {
        /// Path where the error occurred.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Dimension mismatch between embedding and index.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension provided.
        actual: usize,
    },

    /// Document not found.
    #[error("document not found: {0}")]
    NotFound(String),

    /// Chunking operation failed.
    #[error("chunking error: {0}")]
    Chunking(String),

    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// A required on-disk artifact (`manifest.json`, `status.json`, the ANN
    /// index file, the chunk or metadata sidecar) is missing. Raised by
    /// [`crate::manifest::Manifest::load`] when a build was interrupted
    /// before `status.json` was written.
    #[error("index directory is missing required artifact: {0}")]
    MissingArtifact(String),

    /// The embedding model recorded in the manifest does not match the one
    /// the caller opened the store with.
    #[error("index was built with model {expected:?}, caller provided {actual:?}")]
    ModelMismatch {
        /// Model name recorded in the manifest.
        expected: String,
        /// Model name the caller supplied.
        actual: String,
    },

    /// The chunk, vector, and metadata sidecars disagree in length.
    #[error("index sidecars have mismatched lengths: {0}")]
    LengthMismatch(String),

    /// A query was rejected before reaching the index (e.g. empty text).
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Result type alias for indexing and retrieval operations.
pub type Result<T> = std::result::Result<T, IndexError>;
