//! Error types for the PDF question-answering core.
//!
//! Every failure in the pipeline is surfaced as a typed [`QaError`] variant;
//! the core never downgrades a failure into an empty or fabricated answer.
//! Retries happen locally inside the provider client only — everything else
//! is a single attempt with an explicit error.

use thiserror::Error;

/// Errors that can occur in the indexing and question-answering pipeline.
#[derive(Debug, Error)]
pub enum QaError {
    /// Bad chunker or retrieval parameters. A caller bug, not a runtime
    /// condition.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The question was empty or whitespace-only.
    #[error("question must be a non-empty string")]
    EmptyQuestion,

    /// The document produced no chunks — there is nothing to index or query.
    #[error("document {0} has no extractable text content")]
    EmptyDocument(String),

    /// A search was attempted against an index with zero entries.
    #[error("index for document {0} contains no entries")]
    EmptyIndex(String),

    /// The embedding or completion provider failed after bounded retries.
    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// The generation provider failed to produce a completion.
    #[error("completion provider error: {0}")]
    Completion(String),

    /// The provider returned vectors whose dimensionality does not match
    /// the dimensionality recorded for this index. Aborts the build.
    #[error("provider contract violation: expected {expected} dimensions, got {actual}")]
    ProviderContractViolation { expected: usize, actual: usize },

    /// A search was attempted against an index still being built.
    #[error("index for document {0} is not ready")]
    IndexNotReady(String),

    /// An indexing job is already running for this document.
    #[error("indexing already in progress for document {0}")]
    IndexingInProgress(String),

    /// The indexing job was cancelled between embedding batches.
    #[error("indexing cancelled for document {0}")]
    Cancelled(String),

    /// No persisted index exists for this document.
    #[error("no index found for document {0}")]
    IndexNotFound(String),

    /// The persisted index is unusable and the document must be reindexed.
    /// Never silently treated as an empty index.
    #[error("index for document {0} is corrupt: {1}")]
    IndexCorrupt(String, String),

    /// No document row exists for this id.
    #[error("document {0} not found")]
    DocumentNotFound(String),

    /// The document's status is not `Ready` — still indexing, or failed.
    #[error("document {id} is not ready for questions (status: {status})")]
    DocumentNotReady { id: String, status: String },

    /// Retrieval succeeded but returned zero chunks. The caller decides how
    /// to phrase "I don't have enough information".
    #[error("no relevant content found for the question")]
    NoRelevantContent,

    /// PDF text extraction failed.
    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error(transparent)]
    Storage(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A convenience result type for pipeline operations.
pub type Result<T> = std::result::Result<T, QaError>;
