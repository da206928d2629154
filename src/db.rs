use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// Open the SQLite file backing a persisted index.
///
/// With `create` the file (and its parent directory) is created if missing;
/// without it the database is opened read-only.
pub async fn connect(db_path: &Path, create: bool) -> Result<SqlitePool> {
    if create {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(create)
        .read_only(!create);
    if create {
        options = options.journal_mode(SqliteJournalMode::Delete);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open index database {}", db_path.display()))?;

    Ok(pool)
}

/// Create the index tables in a fresh database.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            position INTEGER PRIMARY KEY,
            text TEXT NOT NULL,
            book_title TEXT NOT NULL,
            source_file TEXT NOT NULL,
            page_number INTEGER,
            element_kind TEXT,
            hash TEXT NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_book ON chunks(book_title)")
        .execute(pool)
        .await?;

    Ok(())
}
