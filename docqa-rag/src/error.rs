//! Error types for the `docqa-rag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in retrieval operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// An embedding's length disagrees with the dimension of the index.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimension fixed by the first entry of the index.
        expected: usize,
        /// The length of the offending embedding.
        actual: usize,
    },

    /// Batch inputs have different lengths.
    #[error("Number of texts ({texts}) and embeddings ({embeddings}) must match")]
    ArityMismatch {
        /// Number of texts supplied.
        texts: usize,
        /// Number of embeddings supplied.
        embeddings: usize,
    },

    /// No index file exists at the requested path.
    #[error("Index file not found: {}", path.display())]
    IndexNotFound {
        /// The path that was looked up.
        path: PathBuf,
    },

    /// An index file was read but violates a structural invariant.
    #[error("Corrupt index {}: {reason}", path.display())]
    CorruptIndex {
        /// The path of the corrupt file.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred while calling a chat completion provider.
    #[error("Chat error ({provider}): {message}")]
    ChatError {
        /// The chat provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// Document text could not be extracted.
    #[error("Extraction error ({}): {message}", path.display())]
    ExtractionError {
        /// The document path.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the retrieval pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Filesystem failure while persisting or restoring an index.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
