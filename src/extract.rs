//! PDF byte-to-text extraction.
//!
//! Thin wrapper around `pdf-extract`. Extraction failures surface as
//! [`QaError::Extraction`] and are propagated by the ingestion flow as an
//! indexing failure — a bad upload marks the document `Failed`, it never
//! crashes the pipeline.

use std::path::Path;

use crate::error::{QaError, Result};

/// Extract plain text from in-memory PDF bytes.
pub fn extract_text(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| QaError::Extraction(e.to_string()))
}

/// Extract plain text from a PDF file on disk.
pub fn extract_text_from_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    extract_text(&bytes)
}
