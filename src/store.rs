//! Index persistence: save, load, and delete per-document vector indexes.
//!
//! The persisted layout captures everything needed to reconstruct search
//! exactly without re-embedding: the embedding model, dimensionality,
//! metric id, chunk count, build timestamp, and the full ordered list of
//! (chunk metadata, text, vector) entries.
//!
//! A save replaces the document's index wholesale inside a single
//! transaction, so a concurrent load observes either the previous index or
//! the new one — never a partially written mix. A missing index loads as
//! [`QaError::IndexNotFound`]; a malformed one as [`QaError::IndexCorrupt`],
//! never as an empty index.

use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::embedder::{blob_to_vec, vec_to_blob};
use crate::error::{QaError, Result};
use crate::index::VectorIndex;
use crate::models::Chunk;

/// SQLite-backed store for per-document vector indexes.
#[derive(Clone)]
pub struct IndexStore {
    pool: SqlitePool,
}

impl IndexStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Persist `index`, replacing any previous index for the same document.
    pub async fn save(&self, index: &VectorIndex) -> Result<()> {
        let document_id = index.document_id();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM index_entries WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM indexes WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO indexes (document_id, model, dims, metric, chunk_count, built_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(document_id)
        .bind(index.model())
        .bind(index.dims() as i64)
        .bind(crate::index::METRIC_COSINE)
        .bind(index.len() as i64)
        .bind(index.built_at())
        .execute(&mut *tx)
        .await?;

        for (chunk, vector) in index.entries() {
            sqlx::query(
                r#"
                INSERT INTO index_entries
                    (document_id, chunk_index, text, char_start, char_end, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(chunk.char_start as i64)
            .bind(chunk.char_end as i64)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(document_id, entries = index.len(), "persisted index");
        Ok(())
    }

    /// Load the persisted index for `document_id`.
    pub async fn load(&self, document_id: &str) -> Result<VectorIndex> {
        let meta = sqlx::query(
            "SELECT model, dims, metric, chunk_count, built_at FROM indexes WHERE document_id = ?",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| QaError::IndexNotFound(document_id.to_string()))?;

        let model: String = meta.get("model");
        let dims: i64 = meta.get("dims");
        let metric: String = meta.get("metric");
        let chunk_count: i64 = meta.get("chunk_count");
        let built_at: i64 = meta.get("built_at");

        if metric != crate::index::METRIC_COSINE {
            return Err(QaError::IndexCorrupt(
                document_id.to_string(),
                format!("unknown similarity metric '{}'", metric),
            ));
        }
        if dims <= 0 {
            return Err(QaError::IndexCorrupt(
                document_id.to_string(),
                format!("invalid dimensionality {}", dims),
            ));
        }

        let rows = sqlx::query(
            r#"
            SELECT chunk_index, text, char_start, char_end, embedding
            FROM index_entries
            WHERE document_id = ?
            ORDER BY chunk_index ASC
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.len() as i64 != chunk_count {
            return Err(QaError::IndexCorrupt(
                document_id.to_string(),
                format!("expected {} entries, found {}", chunk_count, rows.len()),
            ));
        }

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let chunk_index: i64 = row.get("chunk_index");
            let blob: Vec<u8> = row.get("embedding");
            let vector = blob_to_vec(&blob).ok_or_else(|| {
                QaError::IndexCorrupt(
                    document_id.to_string(),
                    format!("entry {} has a malformed vector blob", chunk_index),
                )
            })?;
            if vector.len() as i64 != dims {
                return Err(QaError::IndexCorrupt(
                    document_id.to_string(),
                    format!(
                        "entry {} has {} dimensions, index records {}",
                        chunk_index,
                        vector.len(),
                        dims
                    ),
                ));
            }

            let char_start: i64 = row.get("char_start");
            let char_end: i64 = row.get("char_end");
            entries.push((
                Chunk {
                    document_id: document_id.to_string(),
                    chunk_index,
                    text: row.get("text"),
                    char_start: char_start as usize,
                    char_end: char_end as usize,
                },
                vector,
            ));
        }

        Ok(VectorIndex::from_parts(
            document_id,
            &model,
            dims as usize,
            built_at,
            entries,
        ))
    }

    /// Remove the persisted index for `document_id`, if any.
    pub async fn delete(&self, document_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM index_entries WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM indexes WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Build stamp of the persisted index, or `None` when no index exists.
    /// Used as a cache generation check by the orchestrator.
    pub async fn built_at(&self, document_id: &str) -> Result<Option<i64>> {
        let stamp: Option<i64> =
            sqlx::query_scalar("SELECT built_at FROM indexes WHERE document_id = ?")
                .bind(document_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(stamp)
    }
}
