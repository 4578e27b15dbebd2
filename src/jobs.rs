//! Indexing job controller.
//!
//! Drives the per-document build: chunk → embed (batched) → index → persist,
//! with the observable state machine `Pending -> Embedding -> Ready` on
//! success and `Pending/Embedding -> Failed` on any unrecoverable error.
//! `Failed` is terminal until an explicit reindex request.
//!
//! Jobs for the same document are serialized: while one is running, a second
//! request is rejected with [`QaError::IndexingInProgress`] rather than
//! queued, so two builds never interleave against the same persisted index.
//! Jobs for different documents run concurrently without any global lock.
//!
//! Cancellation is checked at embedding-batch boundaries; the index is only
//! persisted after every chunk has been embedded, so a failed or cancelled
//! job never leaves a partial index behind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use sqlx::SqlitePool;
use tracing::{error, info};

use crate::chunk;
use crate::config::Config;
use crate::documents;
use crate::embedder::EmbeddingAdapter;
use crate::error::{QaError, Result};
use crate::index::VectorIndex;
use crate::models::IndexingStatus;
use crate::provider::LanguageModel;
use crate::store::IndexStore;

/// Coordinates asynchronous index builds, one at a time per document.
#[derive(Clone)]
pub struct IndexingController {
    store: IndexStore,
    model: Arc<dyn LanguageModel>,
    config: Config,
    running: Arc<Mutex<HashMap<String, Arc<AtomicBool>>>>,
}

/// Releases the per-document slot when the job finishes, on every path.
struct JobSlot {
    running: Arc<Mutex<HashMap<String, Arc<AtomicBool>>>>,
    document_id: String,
}

impl Drop for JobSlot {
    fn drop(&mut self) {
        self.running.lock().unwrap().remove(&self.document_id);
    }
}

impl IndexingController {
    pub fn new(store: IndexStore, model: Arc<dyn LanguageModel>, config: Config) -> Self {
        Self {
            store,
            model,
            config,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn pool(&self) -> &SqlitePool {
        self.store.pool()
    }

    /// Build and persist the index for `document_id` from `raw_text`,
    /// driving the document's status through the state machine. Runs to
    /// completion; callers that want fire-and-forget semantics wrap this in
    /// [`tokio::spawn`] via [`spawn_index`](Self::spawn_index).
    ///
    /// # Errors
    ///
    /// [`QaError::IndexingInProgress`] when a job is already running for
    /// this document. Any build failure is returned after the document's
    /// status has been set to `Failed` with the error message recorded.
    pub async fn index_document(&self, document_id: &str, raw_text: &str) -> Result<()> {
        let (cancel, slot) = self.claim_slot(document_id)?;
        self.execute(document_id, raw_text, cancel, slot).await
    }

    /// Fire-and-forget variant: claims the per-document slot before
    /// spawning, so the `IndexingInProgress` rejection is synchronous, then
    /// runs the build on the runtime. Failures are recorded on the document
    /// row.
    pub fn spawn_index(
        &self,
        document_id: &str,
        raw_text: String,
    ) -> Result<tokio::task::JoinHandle<()>> {
        let (cancel, slot) = self.claim_slot(document_id)?;
        let controller = self.clone();
        let document_id = document_id.to_string();
        Ok(tokio::spawn(async move {
            let _ = controller
                .execute(&document_id, &raw_text, cancel, slot)
                .await;
        }))
    }

    async fn execute(
        &self,
        document_id: &str,
        raw_text: &str,
        cancel: Arc<AtomicBool>,
        _slot: JobSlot,
    ) -> Result<()> {
        match self.run_build(document_id, raw_text, &cancel).await {
            Ok(()) => {
                documents::set_status(self.pool(), document_id, IndexingStatus::Ready, None)
                    .await?;
                info!(document_id, "index build complete");
                Ok(())
            }
            Err(e) => {
                error!(document_id, error = %e, "index build failed");
                // The document may have been deleted while the job ran.
                let _ = documents::set_status(
                    self.pool(),
                    document_id,
                    IndexingStatus::Failed,
                    Some(&e.to_string()),
                )
                .await;
                Err(e)
            }
        }
    }

    /// Request cancellation of a running job. Takes effect at the next
    /// embedding-batch boundary. Returns whether a job was running.
    pub fn cancel(&self, document_id: &str) -> bool {
        let running = self.running.lock().unwrap();
        match running.get(document_id) {
            Some(flag) => {
                flag.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Current indexing status for a document.
    pub async fn get_status(&self, document_id: &str) -> Result<IndexingStatus> {
        documents::get_status(self.pool(), document_id).await
    }

    fn claim_slot(&self, document_id: &str) -> Result<(Arc<AtomicBool>, JobSlot)> {
        let mut running = self.running.lock().unwrap();
        if running.contains_key(document_id) {
            return Err(QaError::IndexingInProgress(document_id.to_string()));
        }
        let cancel = Arc::new(AtomicBool::new(false));
        running.insert(document_id.to_string(), cancel.clone());
        Ok((
            cancel,
            JobSlot {
                running: self.running.clone(),
                document_id: document_id.to_string(),
            },
        ))
    }

    async fn run_build(
        &self,
        document_id: &str,
        raw_text: &str,
        cancel: &AtomicBool,
    ) -> Result<()> {
        documents::set_status(self.pool(), document_id, IndexingStatus::Pending, None).await?;

        let chunks = chunk::split(
            document_id,
            raw_text,
            self.config.chunking.chunk_size,
            self.config.chunking.overlap,
        )?;
        if chunks.is_empty() {
            return Err(QaError::EmptyDocument(document_id.to_string()));
        }

        documents::set_status(self.pool(), document_id, IndexingStatus::Embedding, None).await?;
        info!(document_id, chunks = chunks.len(), "embedding document");

        let adapter = EmbeddingAdapter::new(self.model.clone(), self.config.provider.batch_size);
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(adapter.batch_size()) {
            if cancel.load(Ordering::Relaxed) {
                return Err(QaError::Cancelled(document_id.to_string()));
            }

            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            vectors.extend(adapter.embed_batch(&texts).await?);
        }

        let dims = match vectors.first() {
            Some(v) => v.len(),
            None => return Err(QaError::EmptyDocument(document_id.to_string())),
        };
        let mut index = VectorIndex::new(document_id, &self.config.provider.embedding_model, dims);
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            index.add(chunk, vector)?;
        }
        // Millisecond stamp: two rebuilds in the same second must still get
        // distinct build stamps, or cached readers would keep the old index.
        index.mark_ready(chrono::Utc::now().timestamp_millis());
        self.store.save(&index).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkingConfig, Config, DbConfig, ProviderConfig, RetrievalConfig, StorageConfig};
    use async_trait::async_trait;
    use std::time::Duration;

    fn test_config(batch_size: usize) -> Config {
        Config {
            db: DbConfig {
                path: "unused".into(),
            },
            storage: StorageConfig {
                documents_dir: "unused".into(),
            },
            chunking: ChunkingConfig {
                chunk_size: 40,
                overlap: 10,
            },
            retrieval: RetrievalConfig { top_k: 3 },
            provider: ProviderConfig {
                batch_size,
                ..ProviderConfig::default()
            },
        }
    }

    async fn test_store() -> (IndexStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::db::connect(&dir.path().join("test.db")).await.unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();
        (IndexStore::new(pool), dir)
    }

    async fn insert_doc(pool: &SqlitePool, id: &str) {
        documents::insert_document(pool, id, None, "a.pdf", "/tmp/a.pdf")
            .await
            .unwrap();
    }

    /// Deterministic fake embedder: hashes each text into a small vector.
    struct HashModel;

    fn hash_vector(text: &str) -> Vec<f32> {
        let mut v = [0.0f32; 4];
        for (i, b) in text.bytes().enumerate() {
            v[i % 4] += b as f32;
        }
        crate::embedder::normalize(v.to_vec())
    }

    #[async_trait]
    impl LanguageModel for HashModel {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| hash_vector(t)).collect())
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(hash_vector(text))
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok("answer".to_string())
        }
    }

    /// Fails every embedding call, as a provider with exhausted retries.
    struct FailingModel;

    #[async_trait]
    impl LanguageModel for FailingModel {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(QaError::EmbeddingProvider("provider unavailable".to_string()))
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(QaError::EmbeddingProvider("provider unavailable".to_string()))
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(QaError::Completion("provider unavailable".to_string()))
        }
    }

    /// Sleeps on every batch so tests can observe a running job.
    struct SlowModel;

    #[async_trait]
    impl LanguageModel for SlowModel {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(texts.iter().map(|t| hash_vector(t)).collect())
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(hash_vector(text))
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok("answer".to_string())
        }
    }

    #[tokio::test]
    async fn successful_build_reaches_ready() {
        let (store, _dir) = test_store().await;
        insert_doc(store.pool(), "d1").await;
        let controller =
            IndexingController::new(store.clone(), Arc::new(HashModel), test_config(8));

        let text = "Some sentences about a topic. More text follows here. \
                    And even more content to split into several chunks.";
        controller.index_document("d1", text).await.unwrap();

        assert_eq!(
            controller.get_status("d1").await.unwrap(),
            IndexingStatus::Ready
        );
        let index = store.load("d1").await.unwrap();
        assert!(index.is_ready());
        assert!(index.len() >= 2);
    }

    #[tokio::test]
    async fn multi_batch_build_keeps_chunk_order() {
        let (store, _dir) = test_store().await;
        insert_doc(store.pool(), "d1").await;
        // batch_size 1 forces one embedding call per chunk
        let controller =
            IndexingController::new(store.clone(), Arc::new(HashModel), test_config(1));

        let text = "First sentence of the document. Second sentence here. \
                    Third sentence too. Fourth one as well.";
        controller.index_document("d1", text).await.unwrap();

        let index = store.load("d1").await.unwrap();
        assert!(index.is_ready());
        assert!(index.len() >= 3);
        assert_eq!(index.dims(), 4);
        for (i, (chunk, _)) in index.entries().iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as i64);
        }
    }

    #[tokio::test]
    async fn provider_failure_marks_failed_without_partial_index() {
        let (store, _dir) = test_store().await;
        insert_doc(store.pool(), "d1").await;
        let controller =
            IndexingController::new(store.clone(), Arc::new(FailingModel), test_config(8));

        let err = controller
            .index_document("d1", "Enough text to produce at least one chunk.")
            .await
            .unwrap_err();
        assert!(matches!(err, QaError::EmbeddingProvider(_)));

        let doc = documents::get_document(store.pool(), "d1").await.unwrap();
        assert_eq!(doc.status, IndexingStatus::Failed);
        assert!(doc.error.unwrap().contains("provider unavailable"));
        assert!(matches!(
            store.load("d1").await.unwrap_err(),
            QaError::IndexNotFound(_)
        ));
    }

    #[tokio::test]
    async fn empty_document_fails() {
        let (store, _dir) = test_store().await;
        insert_doc(store.pool(), "d1").await;
        let controller =
            IndexingController::new(store.clone(), Arc::new(HashModel), test_config(8));

        let err = controller.index_document("d1", "   \n  ").await.unwrap_err();
        assert!(matches!(err, QaError::EmptyDocument(_)));
        assert_eq!(
            controller.get_status("d1").await.unwrap(),
            IndexingStatus::Failed
        );
    }

    #[tokio::test]
    async fn concurrent_build_rejected() {
        let (store, _dir) = test_store().await;
        insert_doc(store.pool(), "d1").await;
        let controller =
            IndexingController::new(store.clone(), Arc::new(SlowModel), test_config(1));

        let text = "First sentence of the document. Second sentence here. \
                    Third sentence too. Fourth one as well."
            .to_string();
        let handle = controller.spawn_index("d1", text.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let err = controller.index_document("d1", &text).await.unwrap_err();
        assert!(matches!(err, QaError::IndexingInProgress(_)));

        handle.await.unwrap();
        assert_eq!(
            controller.get_status("d1").await.unwrap(),
            IndexingStatus::Ready
        );
    }

    #[tokio::test]
    async fn cancellation_checked_between_batches() {
        let (store, _dir) = test_store().await;
        insert_doc(store.pool(), "d1").await;
        let controller =
            IndexingController::new(store.clone(), Arc::new(SlowModel), test_config(1));

        let text = "First sentence of the document. Second sentence here. \
                    Third sentence too. Fourth one as well."
            .to_string();
        let handle = controller.spawn_index("d1", text).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(controller.cancel("d1"));
        handle.await.unwrap();

        assert_eq!(
            controller.get_status("d1").await.unwrap(),
            IndexingStatus::Failed
        );
        assert!(matches!(
            store.load("d1").await.unwrap_err(),
            QaError::IndexNotFound(_)
        ));
    }

    #[tokio::test]
    async fn slot_released_after_failure() {
        let (store, _dir) = test_store().await;
        insert_doc(store.pool(), "d1").await;
        let failing =
            IndexingController::new(store.clone(), Arc::new(FailingModel), test_config(8));
        let _ = failing.index_document("d1", "some chunkable text").await;

        // A reindex attempt is accepted once the failed job has finished.
        let ok = IndexingController::new(store.clone(), Arc::new(HashModel), test_config(8));
        ok.index_document("d1", "some chunkable text").await.unwrap();
        assert_eq!(ok.get_status("d1").await.unwrap(), IndexingStatus::Ready);
    }
}
