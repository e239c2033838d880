use anyhow::Result;
use sqlx::SqlitePool;

/// Creates the snapshot and run-history tables. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // One row per path seen by the last committed crawl
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS snapshot_entries (
            path TEXT PRIMARY KEY,
            modified_at TEXT NOT NULL,
            metadata_only INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS crawl_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            files_processed INTEGER NOT NULL,
            documents_submitted INTEGER NOT NULL DEFAULT 0,
            roots_completed INTEGER NOT NULL,
            roots_failed INTEGER NOT NULL,
            cancelled INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_crawl_runs_finished_at ON crawl_runs(finished_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
