//! Core data models used throughout the pipeline.
//!
//! These types represent the documents, chunks, and answers that flow
//! through the indexing and question-answering pipeline.

use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a document's index.
///
/// `Pending -> Embedding -> Ready` on success; any unrecoverable failure
/// during the build transitions to `Failed`, which is terminal until an
/// explicit reindex request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexingStatus {
    Pending,
    Embedding,
    Ready,
    Failed,
}

impl IndexingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexingStatus::Pending => "pending",
            IndexingStatus::Embedding => "embedding",
            IndexingStatus::Ready => "ready",
            IndexingStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for IndexingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(IndexingStatus::Pending),
            "embedding" => Ok(IndexingStatus::Embedding),
            "ready" => Ok(IndexingStatus::Ready),
            "failed" => Ok(IndexingStatus::Failed),
            other => Err(format!("unknown indexing status: {}", other)),
        }
    }
}

/// An uploaded document stored in SQLite.
///
/// The id is assigned on upload and never changes; after text extraction
/// completes, only the status (and failure message) are ever mutated.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub title: Option<String>,
    pub filename: String,
    pub file_path: String,
    pub created_at: i64,
    pub status: IndexingStatus,
    pub error: Option<String>,
}

/// A contiguous span of a document's text, immutable once produced.
///
/// `chunk_index` is the 0-based emission order. `char_start` / `char_end`
/// are character offsets (not bytes) into the source text, with
/// `char_start < char_end`. Consecutive chunks may overlap but never skip
/// text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
}

/// A retrieved chunk together with its similarity score.
#[derive(Debug, Clone)]
pub struct SourceChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// The result of one question against one ready index.
///
/// `sources` are the retrieved chunks in retrieval order — callers depend
/// on order-of-relevance, so the orchestrator never reorders them.
#[derive(Debug, Clone)]
pub struct Answer {
    pub question: String,
    pub answer_text: String,
    pub sources: Vec<SourceChunk>,
}
