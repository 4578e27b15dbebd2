use anyhow::Result;
use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Document metadata and indexing status
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            title TEXT,
            filename TEXT NOT NULL,
            file_path TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            error TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One row per persisted index: everything needed to validate entries
    // without re-embedding
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS indexes (
            document_id TEXT PRIMARY KEY,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            metric TEXT NOT NULL,
            chunk_count INTEGER NOT NULL,
            built_at INTEGER NOT NULL,
            FOREIGN KEY (document_id) REFERENCES documents(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Ordered index entries: chunk metadata + text + LE-f32 vector blob
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_entries (
            document_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            char_start INTEGER NOT NULL,
            char_end INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            PRIMARY KEY (document_id, chunk_index),
            FOREIGN KEY (document_id) REFERENCES documents(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_entries_document_id ON index_entries(document_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_created_at ON documents(created_at DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
