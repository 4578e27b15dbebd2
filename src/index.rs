//! Per-document vector index with exact nearest-neighbor search.
//!
//! A flat, ordered array of (chunk, unit-norm vector) pairs. Search is
//! exact brute-force: the query is scored against every entry by dot
//! product, which over pre-normalized vectors equals cosine similarity
//! (metric id [`METRIC_COSINE`], persisted alongside the index so rebuilds
//! stay comparable). Approximate structures would be a documented extension
//! point — they must preserve the same ordering and tie-break contract.
//!
//! Ranking is deterministic: descending score, ties broken by ascending
//! chunk index (the earlier chunk wins).
//!
//! Entries are append-only during a build; a rebuild replaces the whole
//! index. The index answers searches only after [`mark_ready`] — before
//! that every search fails with [`QaError::IndexNotReady`].
//!
//! [`mark_ready`]: VectorIndex::mark_ready

use crate::embedder::dot;
use crate::error::{QaError, Result};
use crate::models::{Chunk, SourceChunk};

/// Metric identifier persisted with every index.
pub const METRIC_COSINE: &str = "cosine";

/// Per-document collection of (chunk, embedding) pairs.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    document_id: String,
    model: String,
    dims: usize,
    built_at: i64,
    ready: bool,
    entries: Vec<(Chunk, Vec<f32>)>,
}

impl VectorIndex {
    /// Create an empty index being built for `document_id`.
    pub fn new(document_id: &str, model: &str, dims: usize) -> Self {
        Self {
            document_id: document_id.to_string(),
            model: model.to_string(),
            dims,
            built_at: 0,
            ready: false,
            entries: Vec::new(),
        }
    }

    /// Reassemble a persisted index. Used by the store; entries must be in
    /// chunk-index order and the index is immediately ready.
    pub fn from_parts(
        document_id: &str,
        model: &str,
        dims: usize,
        built_at: i64,
        entries: Vec<(Chunk, Vec<f32>)>,
    ) -> Self {
        Self {
            document_id: document_id.to_string(),
            model: model.to_string(),
            dims,
            built_at,
            ready: true,
            entries,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Timestamp of the build this index came from; doubles as a cache
    /// generation stamp.
    pub fn built_at(&self) -> i64 {
        self.built_at
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn entries(&self) -> &[(Chunk, Vec<f32>)] {
        &self.entries
    }

    /// Append one embedded chunk during a build.
    ///
    /// # Errors
    ///
    /// Returns [`QaError::ProviderContractViolation`] when the vector's
    /// dimensionality does not match the index.
    pub fn add(&mut self, chunk: Chunk, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dims {
            return Err(QaError::ProviderContractViolation {
                expected: self.dims,
                actual: vector.len(),
            });
        }
        self.entries.push((chunk, vector));
        Ok(())
    }

    /// Mark the build complete. Searches are rejected before this point.
    pub fn mark_ready(&mut self, built_at: i64) {
        self.ready = true;
        self.built_at = built_at;
    }

    /// Return the `k` entries most similar to `query`, ordered by
    /// descending score with ties broken by ascending chunk index. An index
    /// with fewer than `k` entries returns all of them, without padding.
    ///
    /// # Errors
    ///
    /// - [`QaError::IndexNotReady`] before [`mark_ready`](Self::mark_ready)
    /// - [`QaError::EmptyIndex`] when there are no entries
    /// - [`QaError::ProviderContractViolation`] on query dims mismatch
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SourceChunk>> {
        if !self.ready {
            return Err(QaError::IndexNotReady(self.document_id.clone()));
        }
        if self.entries.is_empty() {
            return Err(QaError::EmptyIndex(self.document_id.clone()));
        }
        if query.len() != self.dims {
            return Err(QaError::ProviderContractViolation {
                expected: self.dims,
                actual: query.len(),
            });
        }

        let mut scored: Vec<SourceChunk> = self
            .entries
            .iter()
            .map(|(chunk, vector)| SourceChunk {
                chunk: chunk.clone(),
                score: dot(query, vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
        });
        scored.truncate(k);

        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: i64, text: &str) -> Chunk {
        Chunk {
            document_id: "doc".to_string(),
            chunk_index: index,
            text: text.to_string(),
            char_start: (index as usize) * 10,
            char_end: (index as usize) * 10 + text.chars().count(),
        }
    }

    fn ready_index(vectors: Vec<Vec<f32>>) -> VectorIndex {
        let dims = vectors[0].len();
        let mut index = VectorIndex::new("doc", "fake-model", dims);
        for (i, v) in vectors.into_iter().enumerate() {
            index.add(chunk(i as i64, "text"), v).unwrap();
        }
        index.mark_ready(1);
        index
    }

    #[test]
    fn search_before_ready_fails() {
        let mut index = VectorIndex::new("doc", "m", 2);
        index.add(chunk(0, "a"), vec![1.0, 0.0]).unwrap();
        let err = index.search(&[1.0, 0.0], 3).unwrap_err();
        assert!(matches!(err, QaError::IndexNotReady(_)));
    }

    #[test]
    fn search_on_empty_index_fails() {
        let mut index = VectorIndex::new("doc", "m", 2);
        index.mark_ready(1);
        let err = index.search(&[1.0, 0.0], 3).unwrap_err();
        assert!(matches!(err, QaError::EmptyIndex(_)));
    }

    #[test]
    fn mismatched_vector_rejected_on_add() {
        let mut index = VectorIndex::new("doc", "m", 2);
        let err = index.add(chunk(0, "a"), vec![1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, QaError::ProviderContractViolation { .. }));
    }

    #[test]
    fn mismatched_query_rejected() {
        let index = ready_index(vec![vec![1.0, 0.0]]);
        let err = index.search(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, QaError::ProviderContractViolation { .. }));
    }

    #[test]
    fn results_ordered_by_descending_score() {
        let index = ready_index(vec![
            vec![0.0, 1.0],  // orthogonal to query
            vec![1.0, 0.0],  // identical to query
            vec![0.6, 0.8],  // in between
        ]);
        let results = index.search(&[1.0, 0.0], 3).unwrap();
        let order: Vec<i64> = results.iter().map(|r| r.chunk.chunk_index).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert!(results[0].score > results[1].score);
        assert!(results[1].score > results[2].score);
    }

    #[test]
    fn ties_broken_by_ascending_chunk_index() {
        // Both entries score identically against the query.
        let index = ready_index(vec![vec![0.6, 0.8], vec![0.6, 0.8], vec![0.0, 1.0]]);
        let results = index.search(&[0.6, 0.8], 2).unwrap();
        assert_eq!(results[0].chunk.chunk_index, 0);
        assert_eq!(results[1].chunk.chunk_index, 1);
    }

    #[test]
    fn fewer_entries_than_k_returns_all() {
        let index = ready_index(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let results = index.search(&[1.0, 0.0], 5).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn search_is_deterministic() {
        let index = ready_index(vec![
            vec![0.6, 0.8],
            vec![0.8, 0.6],
            vec![0.6, 0.8],
            vec![1.0, 0.0],
        ]);
        let a = index.search(&[0.7, 0.7], 4).unwrap();
        let b = index.search(&[0.7, 0.7], 4).unwrap();
        let ids_a: Vec<i64> = a.iter().map(|r| r.chunk.chunk_index).collect();
        let ids_b: Vec<i64> = b.iter().map(|r| r.chunk.chunk_index).collect();
        assert_eq!(ids_a, ids_b);
    }
}
