//! CLI handlers for inspecting documents.

use anyhow::Result;
use chrono::DateTime;

use crate::config::Config;
use crate::db;
use crate::documents;

/// Print one document's metadata and indexing status. The pool is closed
/// on every exit path.
pub async fn run_status(config: &Config, document_id: &str) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    let result = documents::get_document(&pool, document_id).await;
    pool.close().await;

    let doc = result?;
    println!("document: {}", doc.id);
    println!("  title: {}", doc.title.as_deref().unwrap_or("(untitled)"));
    println!("  filename: {}", doc.filename);
    println!("  uploaded: {}", format_date(doc.created_at));
    println!("  status: {}", doc.status);
    if let Some(ref error) = doc.error {
        println!("  error: {}", error);
    }

    Ok(())
}

/// List all documents, newest first.
pub async fn run_list(config: &Config) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    let result = documents::list_documents(&pool).await;
    pool.close().await;

    let docs = result?;
    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    for doc in &docs {
        println!(
            "{}  [{}]  {}  ({})",
            doc.id,
            doc.status,
            doc.title.as_deref().unwrap_or(&doc.filename),
            format_date(doc.created_at)
        );
    }

    Ok(())
}

fn format_date(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}
