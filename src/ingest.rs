//! Document ingestion: store the uploaded PDF, extract its text, and run
//! the indexing job.
//!
//! Files land in the configured documents directory via write-to-temp then
//! rename, so an interrupted copy never leaves a half-written PDF behind.
//! Extraction failures and empty documents mark the document `Failed` —
//! they are indexing failures, not crashes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::documents;
use crate::error::QaError;
use crate::extract;
use crate::jobs::IndexingController;
use crate::models::IndexingStatus;
use crate::provider::{LanguageModel, OpenAiClient};
use crate::store::IndexStore;

/// Copy `source` into `documents_dir` under a collision-free name.
/// Returns the stored filename and its full path.
pub fn save_pdf_file(documents_dir: &Path, source: &Path) -> crate::error::Result<(String, PathBuf)> {
    let filename = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| QaError::InvalidConfiguration("invalid file name".to_string()))?;
    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(QaError::InvalidConfiguration(format!(
            "only PDF files are supported, got '{}'",
            filename
        )));
    }

    std::fs::create_dir_all(documents_dir)?;

    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    let mut final_name = format!("{}.pdf", stem);
    if documents_dir.join(&final_name).exists() {
        final_name = format!("{}-{}.pdf", stem, &Uuid::new_v4().to_string()[..6]);
    }
    let final_path = documents_dir.join(&final_name);

    // Write atomically: copy to a temp file in the same directory, then rename
    let tmp_path = documents_dir.join(format!(".tmp-{}", Uuid::new_v4()));
    std::fs::copy(source, &tmp_path)?;
    if let Err(e) = std::fs::rename(&tmp_path, &final_path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    Ok((final_name, final_path))
}

/// Register `source` as a new document and build its index to completion.
/// Returns the new document id; on a build failure the id is still valid
/// and the document's status records what went wrong.
pub async fn ingest_document(
    controller: &IndexingController,
    store: &IndexStore,
    config: &Config,
    source: &Path,
    title: Option<&str>,
) -> crate::error::Result<String> {
    let (filename, final_path) = save_pdf_file(&config.storage.documents_dir, source)?;

    let document_id = Uuid::new_v4().to_string();
    documents::insert_document(
        store.pool(),
        &document_id,
        title,
        &filename,
        &final_path.to_string_lossy(),
    )
    .await?;

    let text = match extract::extract_text_from_file(&final_path) {
        Ok(text) => text,
        Err(e) => {
            documents::set_status(
                store.pool(),
                &document_id,
                IndexingStatus::Failed,
                Some(&e.to_string()),
            )
            .await?;
            return Err(e);
        }
    };

    controller.index_document(&document_id, &text).await?;
    Ok(document_id)
}

/// CLI: ingest a PDF and wait for the index build. The pool is closed on
/// every exit path.
pub async fn run_ingest(config: &Config, file: &Path, title: Option<String>) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    let result = ingest_and_report(&pool, config, file, title.as_deref()).await;
    pool.close().await;
    result.map_err(Into::into)
}

async fn ingest_and_report(
    pool: &SqlitePool,
    config: &Config,
    file: &Path,
    title: Option<&str>,
) -> crate::error::Result<()> {
    let store = IndexStore::new(pool.clone());
    let model: Arc<dyn LanguageModel> = Arc::new(OpenAiClient::from_config(&config.provider)?);
    let controller = IndexingController::new(store.clone(), model, config.clone());

    println!("ingest {}", file.display());
    match ingest_document(&controller, &store, config, file, title).await {
        Ok(document_id) => {
            let doc = documents::get_document(pool, &document_id).await?;
            println!("  document id: {}", document_id);
            println!("  stored as: {}", doc.filename);
            println!("  status: {}", doc.status);
            println!("ok");
            Ok(())
        }
        Err(e) => {
            println!("  failed: {}", e);
            Err(e)
        }
    }
}

/// CLI: rebuild a document's index from its stored file.
pub async fn run_reindex(config: &Config, document_id: &str) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    let result = reindex_and_report(&pool, config, document_id).await;
    pool.close().await;
    result.map_err(Into::into)
}

async fn reindex_and_report(
    pool: &SqlitePool,
    config: &Config,
    document_id: &str,
) -> crate::error::Result<()> {
    let store = IndexStore::new(pool.clone());
    let model: Arc<dyn LanguageModel> = Arc::new(OpenAiClient::from_config(&config.provider)?);
    let controller = IndexingController::new(store.clone(), model, config.clone());

    let doc = documents::get_document(pool, document_id).await?;
    let text = extract::extract_text_from_file(Path::new(&doc.file_path))?;
    controller.index_document(document_id, &text).await?;

    let status = controller.get_status(document_id).await?;
    println!("reindex {}", document_id);
    println!("  status: {}", status);
    println!("ok");
    Ok(())
}

/// CLI: delete a document, its stored file, and its index.
pub async fn run_delete(config: &Config, document_id: &str) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    let result = delete_and_report(&pool, document_id).await;
    pool.close().await;
    result.map_err(Into::into)
}

async fn delete_and_report(pool: &SqlitePool, document_id: &str) -> crate::error::Result<()> {
    let store = IndexStore::new(pool.clone());

    let doc = documents::get_document(pool, document_id).await?;
    store.delete(document_id).await?;
    documents::delete_document(pool, document_id).await?;
    if let Err(e) = std::fs::remove_file(&doc.file_path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            eprintln!("Warning: could not delete {}: {}", doc.file_path, e);
        }
    }

    println!("delete {}", document_id);
    println!("ok");
    Ok(())
}
