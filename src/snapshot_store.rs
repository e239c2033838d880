//! SQLite persistence for crawl snapshots and run history.
//!
//! Exactly one snapshot is authoritative per database. It is loaded at the
//! start of every crawl and replaced in a single transaction when a crawl
//! completes, so a crash mid-crawl leaves the previous snapshot intact.

use anyhow::{Context, Result};
use deskindex_core::models::format_timestamp;
use deskindex_core::snapshot::{Snapshot, SnapshotEntry};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::DbConfig;
use crate::db;
use crate::migrate::run_migrations;
use crate::scheduler::RunSummary;

/// One row of `crawl_runs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: String,
    pub files_processed: i64,
    pub documents_submitted: i64,
    pub roots_completed: i64,
    pub roots_failed: i64,
    pub cancelled: bool,
}

#[derive(Clone)]
pub struct SnapshotStore {
    pool: SqlitePool,
}

impl SnapshotStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects and applies migrations.
    pub async fn open(config: &DbConfig) -> Result<Self> {
        let pool = db::connect(config).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn load(&self) -> Result<Snapshot> {
        let rows: Vec<(String, String, bool)> =
            sqlx::query_as("SELECT path, modified_at, metadata_only FROM snapshot_entries")
                .fetch_all(&self.pool)
                .await
                .context("Failed to load snapshot")?;
        Ok(rows
            .into_iter()
            .map(|(path, modified_at, metadata_only)| {
                (
                    path,
                    SnapshotEntry {
                        modified_at,
                        metadata_only,
                    },
                )
            })
            .collect())
    }

    pub async fn len(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM snapshot_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Replaces the stored snapshot with `snapshot` atomically.
    pub async fn replace(&self, snapshot: &Snapshot) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM snapshot_entries")
            .execute(&mut *tx)
            .await?;

        for (path, entry) in snapshot.iter() {
            sqlx::query(
                "INSERT INTO snapshot_entries (path, modified_at, metadata_only) VALUES (?, ?, ?)",
            )
            .bind(path)
            .bind(&entry.modified_at)
            .bind(entry.metadata_only)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await.context("Failed to commit snapshot")?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM snapshot_entries")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn record_run(&self, summary: &RunSummary) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO crawl_runs (started_at, finished_at, files_processed,
                                    documents_submitted, roots_completed, roots_failed, cancelled)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(format_timestamp(&summary.started_at))
        .bind(format_timestamp(&summary.finished_at))
        .bind(summary.files_processed as i64)
        .bind(summary.documents_submitted as i64)
        .bind(summary.roots_completed as i64)
        .bind(summary.roots_failed as i64)
        .bind(summary.cancelled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent runs first.
    pub async fn recent_runs(&self, limit: i64) -> Result<Vec<RunRecord>> {
        let rows = sqlx::query_as::<_, RunRecord>(
            r#"
            SELECT id, started_at, finished_at, files_processed, documents_submitted,
                   roots_completed, roots_failed, cancelled
            FROM crawl_runs
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
