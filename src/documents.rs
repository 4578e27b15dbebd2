//! Document metadata bookkeeping.
//!
//! Free functions over the SQLite pool, covering the document lifecycle:
//! create on upload, status transitions driven by the indexing job
//! controller, and list/get/delete for the CLI.

use sqlx::{Row, SqlitePool};

use crate::error::{QaError, Result};
use crate::models::{Document, IndexingStatus};

/// Insert a new document row with status `pending`. The id is assigned here
/// and never changes.
pub async fn insert_document(
    pool: &SqlitePool,
    id: &str,
    title: Option<&str>,
    filename: &str,
    file_path: &str,
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO documents (id, title, filename, file_path, created_at, status)
        VALUES (?, ?, ?, ?, ?, 'pending')
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(filename)
    .bind(file_path)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_document(pool: &SqlitePool, id: &str) -> Result<Document> {
    let row = sqlx::query(
        "SELECT id, title, filename, file_path, created_at, status, error FROM documents WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| QaError::DocumentNotFound(id.to_string()))?;

    row_to_document(&row)
}

pub async fn list_documents(pool: &SqlitePool) -> Result<Vec<Document>> {
    let rows = sqlx::query(
        "SELECT id, title, filename, file_path, created_at, status, error FROM documents ORDER BY created_at DESC, id ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_document).collect()
}

/// Current indexing status for a document.
pub async fn get_status(pool: &SqlitePool, id: &str) -> Result<IndexingStatus> {
    Ok(get_document(pool, id).await?.status)
}

/// Record a status transition. Clears any previous failure message unless a
/// new one is supplied.
pub async fn set_status(
    pool: &SqlitePool,
    id: &str,
    status: IndexingStatus,
    error: Option<&str>,
) -> Result<()> {
    let result = sqlx::query("UPDATE documents SET status = ?, error = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(error)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(QaError::DocumentNotFound(id.to_string()));
    }
    Ok(())
}

/// Remove the document row. The caller is responsible for also deleting the
/// stored file and the persisted index.
pub async fn delete_document(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(QaError::DocumentNotFound(id.to_string()));
    }
    Ok(())
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<Document> {
    let status_str: String = row.get("status");
    let status = status_str
        .parse::<IndexingStatus>()
        .map_err(|e| QaError::Storage(sqlx::Error::Decode(e.into())))?;

    Ok(Document {
        id: row.get("id"),
        title: row.get("title"),
        filename: row.get("filename"),
        file_path: row.get("file_path"),
        created_at: row.get("created_at"),
        status,
        error: row.get("error"),
    })
}
