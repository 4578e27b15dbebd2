//! Embedding adapter: batching, normalization, and the dimensionality
//! contract.
//!
//! Wraps a [`LanguageModel`] and enforces the invariant that every vector
//! entering one index shares the same dimensionality. The dimensionality is
//! recorded on the first successful call; a later call returning a different
//! size is a [`QaError::ProviderContractViolation`] and aborts the build.
//!
//! All vectors are L2-normalized here, so the index can rank by plain dot
//! product (equivalent to cosine similarity).
//!
//! Also provides the BLOB codec for persisted vectors:
//! - [`vec_to_blob`] — encode a `Vec<f32>` as little-endian bytes
//! - [`blob_to_vec`] — decode a BLOB back into a `Vec<f32>`

use std::sync::{Arc, Mutex};

use crate::error::{QaError, Result};
use crate::provider::LanguageModel;

/// Batching/normalizing wrapper around the provider's embedding capability.
pub struct EmbeddingAdapter {
    model: Arc<dyn LanguageModel>,
    batch_size: usize,
    dims: Mutex<Option<usize>>,
}

impl EmbeddingAdapter {
    pub fn new(model: Arc<dyn LanguageModel>, batch_size: usize) -> Self {
        Self {
            model,
            batch_size,
            dims: Mutex::new(None),
        }
    }

    /// Batch size to use when embedding chunk texts.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Dimensionality recorded from the first successful call, if any.
    pub fn dims(&self) -> Option<usize> {
        *self.dims.lock().unwrap()
    }

    /// Seed the expected dimensionality from a loaded index, so a query
    /// vector of the wrong size is rejected before it reaches the search.
    pub fn expect_dims(&self, dims: usize) {
        let mut guard = self.dims.lock().unwrap();
        if guard.is_none() {
            *guard = Some(dims);
        }
    }

    /// Embed one batch of texts, in order. The caller drives batching so it
    /// can check for cancellation between batches.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = self.model.embed_batch(texts).await?;
        vectors
            .into_iter()
            .map(|v| self.check_and_normalize(v))
            .collect()
    }

    /// Embed a single query text.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.model.embed(text).await?;
        self.check_and_normalize(vector)
    }

    fn check_and_normalize(&self, vector: Vec<f32>) -> Result<Vec<f32>> {
        if vector.is_empty() {
            return Err(QaError::EmbeddingProvider(
                "provider returned an empty vector".to_string(),
            ));
        }

        let mut guard = self.dims.lock().unwrap();
        match *guard {
            Some(expected) if expected != vector.len() => {
                return Err(QaError::ProviderContractViolation {
                    expected,
                    actual: vector.len(),
                });
            }
            Some(_) => {}
            None => *guard = Some(vector.len()),
        }
        drop(guard);

        Ok(normalize(vector))
    }
}

/// L2-normalize a vector. Zero vectors are returned unchanged.
pub fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
    vector
}

/// Dot product of two equal-length vectors. Over unit-norm vectors this is
/// the cosine similarity.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector. Fails when the byte length is
/// not a multiple of four — the store treats that as index corruption.
pub fn blob_to_vec(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Deterministic fake: each text maps to a fixed-dimensionality vector.
    struct FakeModel {
        dims_per_call: std::sync::Mutex<Vec<usize>>,
    }

    impl FakeModel {
        fn with_dims(dims: Vec<usize>) -> Self {
            Self {
                dims_per_call: std::sync::Mutex::new(dims),
            }
        }

        fn next_dims(&self) -> usize {
            let mut guard = self.dims_per_call.lock().unwrap();
            if guard.len() > 1 {
                guard.remove(0)
            } else {
                guard[0]
            }
        }
    }

    #[async_trait]
    impl LanguageModel for FakeModel {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let dims = self.next_dims();
            Ok(texts.iter().map(|_| vec![1.0; dims]).collect())
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0; self.next_dims()])
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok("answer".to_string())
        }
    }

    #[tokio::test]
    async fn records_dims_on_first_success() {
        let adapter = EmbeddingAdapter::new(Arc::new(FakeModel::with_dims(vec![4])), 8);
        assert_eq!(adapter.dims(), None);
        adapter.embed_batch(&["a".to_string()]).await.unwrap();
        assert_eq!(adapter.dims(), Some(4));
    }

    #[tokio::test]
    async fn rejects_dimensionality_drift() {
        let adapter = EmbeddingAdapter::new(Arc::new(FakeModel::with_dims(vec![4, 5])), 8);
        adapter.embed_batch(&["a".to_string()]).await.unwrap();
        let err = adapter.embed_batch(&["b".to_string()]).await.unwrap_err();
        assert!(matches!(
            err,
            QaError::ProviderContractViolation {
                expected: 4,
                actual: 5
            }
        ));
    }

    #[tokio::test]
    async fn query_checked_against_seeded_dims() {
        let adapter = EmbeddingAdapter::new(Arc::new(FakeModel::with_dims(vec![5])), 8);
        adapter.expect_dims(3);
        let err = adapter.embed_query("q").await.unwrap_err();
        assert!(matches!(err, QaError::ProviderContractViolation { .. }));
    }

    #[tokio::test]
    async fn vectors_are_unit_norm() {
        let adapter = EmbeddingAdapter::new(Arc::new(FakeModel::with_dims(vec![4])), 8);
        let vectors = adapter.embed_batch(&["a".to_string()]).await.unwrap();
        let norm: f32 = vectors[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), 20);
        assert_eq!(blob_to_vec(&blob).unwrap(), vec);
    }

    #[test]
    fn truncated_blob_rejected() {
        assert!(blob_to_vec(&[0u8, 1, 2]).is_none());
    }

    #[test]
    fn zero_vector_unchanged_by_normalize() {
        assert_eq!(normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }
}
