//! Retrieval-augmented question answering.
//!
//! The [`QaOrchestrator`] answers one question against one document: gate
//! on readiness, load the persisted index (cached by build stamp), embed
//! the question, retrieve the top-k chunks, assemble a grounding prompt,
//! and package the provider's completion together with the source chunks.
//!
//! Sources are returned in retrieval order — callers depend on
//! order-of-relevance, so this module never reorders them. Every failure
//! along the way is a typed error; the orchestrator never fabricates an
//! answer from nothing.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::Config;
use crate::documents;
use crate::embedder::EmbeddingAdapter;
use crate::error::{QaError, Result};
use crate::index::VectorIndex;
use crate::models::{Answer, IndexingStatus, SourceChunk};
use crate::provider::LanguageModel;
use crate::store::IndexStore;

/// Answers questions against ready document indexes.
pub struct QaOrchestrator {
    store: IndexStore,
    model: Arc<dyn LanguageModel>,
    top_k: usize,
    /// Loaded indexes keyed by document id, validated against the persisted
    /// build stamp so a rebuild is picked up on the next question.
    cache: RwLock<HashMap<String, Arc<VectorIndex>>>,
}

impl QaOrchestrator {
    pub fn new(store: IndexStore, model: Arc<dyn LanguageModel>, config: &Config) -> Self {
        Self {
            store,
            model,
            top_k: config.retrieval.top_k,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Answer `question` against the document's index.
    ///
    /// # Errors
    ///
    /// - [`QaError::EmptyQuestion`] for a blank question
    /// - [`QaError::DocumentNotReady`] unless the document's status is
    ///   `Ready` — a failed or still-indexing document never reaches the
    ///   provider
    /// - [`QaError::IndexNotFound`] / [`QaError::IndexCorrupt`] from the
    ///   store
    /// - [`QaError::EmbeddingProvider`] / [`QaError::Completion`] from the
    ///   provider, after its own bounded retries
    /// - [`QaError::NoRelevantContent`] when retrieval returns no chunks
    pub async fn answer(&self, document_id: &str, question: &str) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(QaError::EmptyQuestion);
        }

        let status = documents::get_status(self.store.pool(), document_id).await?;
        if status != IndexingStatus::Ready {
            return Err(QaError::DocumentNotReady {
                id: document_id.to_string(),
                status: status.to_string(),
            });
        }

        let index = self.load_index(document_id).await?;

        let adapter = EmbeddingAdapter::new(self.model.clone(), 1);
        adapter.expect_dims(index.dims());
        let query_vector = adapter.embed_query(question).await?;

        let sources = index.search(&query_vector, self.top_k)?;
        if sources.is_empty() {
            return Err(QaError::NoRelevantContent);
        }
        debug!(document_id, retrieved = sources.len(), "retrieved chunks");

        let prompt = build_prompt(question, &sources);
        let completion = self.model.complete(&prompt).await?;

        info!(document_id, "answered question");
        Ok(Answer {
            question: question.to_string(),
            answer_text: completion.trim().to_string(),
            sources,
        })
    }

    /// Load the index for `document_id`, reusing the cached copy when its
    /// build stamp still matches the persisted one. A rebuild in progress is
    /// invisible here: the store swaps indexes transactionally, so this
    /// always observes a complete previous or complete new index.
    async fn load_index(&self, document_id: &str) -> Result<Arc<VectorIndex>> {
        let stamp = self
            .store
            .built_at(document_id)
            .await?
            .ok_or_else(|| QaError::IndexNotFound(document_id.to_string()))?;

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(document_id) {
                if cached.built_at() == stamp {
                    return Ok(cached.clone());
                }
            }
        }

        let index = Arc::new(self.store.load(document_id).await?);
        let mut cache = self.cache.write().await;
        cache.insert(document_id.to_string(), index.clone());
        Ok(index)
    }

    /// Drop a cached index, e.g. after the document is deleted.
    pub async fn evict(&self, document_id: &str) {
        self.cache.write().await.remove(document_id);
    }
}

/// CLI: answer one question against one document and print the result.
/// The pool is closed on every exit path.
pub async fn run_ask(config: &Config, document_id: &str, question: &str) -> anyhow::Result<()> {
    let pool = crate::db::connect(&config.db.path).await?;
    let result = ask_and_report(&pool, config, document_id, question).await;
    pool.close().await;
    result.map_err(Into::into)
}

async fn ask_and_report(
    pool: &sqlx::SqlitePool,
    config: &Config,
    document_id: &str,
    question: &str,
) -> Result<()> {
    let store = IndexStore::new(pool.clone());
    let model: Arc<dyn LanguageModel> =
        Arc::new(crate::provider::OpenAiClient::from_config(&config.provider)?);
    let qa = QaOrchestrator::new(store, model, config);

    let answer = qa.answer(document_id, question).await?;

    println!("{}", answer.answer_text);
    println!();
    println!("sources:");
    for (i, source) in answer.sources.iter().enumerate() {
        let excerpt: String = source.chunk.text.chars().take(160).collect();
        println!(
            "  [{}] chunk {} (chars {}..{}, score {:.3})",
            i + 1,
            source.chunk.chunk_index,
            source.chunk.char_start,
            source.chunk.char_end,
            source.score
        );
        println!("      \"{}\"", excerpt.replace('\n', " ").trim());
    }

    Ok(())
}

/// Assemble the grounding prompt: numbered source excerpts in retrieval
/// order followed by the question. Deterministic for a given input.
fn build_prompt(question: &str, sources: &[SourceChunk]) -> String {
    let mut prompt = String::from(
        "Answer the question using only the numbered source excerpts below. \
         Cite the excerpts you rely on as [1], [2], and so on. If the \
         excerpts do not contain the answer, say that you do not have \
         enough information.\n\n",
    );
    for (i, source) in sources.iter().enumerate() {
        prompt.push_str(&format!("[{}] {}\n\n", i + 1, source.chunk.text.trim()));
    }
    prompt.push_str(&format!("Question: {}\nAnswer:", question));
    prompt
}
