//! The production crawl job.
//!
//! [`CrawlPipeline`] wires the scanner, differ, document builder, batcher,
//! document store and snapshot repository into one [`CrawlJob`]. Each crawl
//! gets a [`PipelineRun`] that owns the in-progress snapshot.
//!
//! Per root, a `spawn_blocking` producer walks the tree, classifies every
//! record against the previous snapshot and extracts content for new or
//! updated files. Results cross a bounded channel to the async side, which
//! batches documents to the store. After the last root:
//!
//! 1. Paths from the previous snapshot that were not seen are deleted from
//!    the store. Roots that failed are excluded, their previous entries
//!    carried over unchanged.
//! 2. The next snapshot replaces the stored one in a single transaction.
//!    Paths whose batch failed are left out so they are resubmitted next time.
//! 3. A run-history row is written.
//!
//! A cancelled crawl records its history row but leaves the stored snapshot
//! untouched.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use deskindex_core::models::{document_id, Document, FileRecord};
use deskindex_core::snapshot::{Change, Snapshot, SnapshotDiffer, SnapshotEntry};
use deskindex_core::store::DocumentStore;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::ingest::{DocumentBuilder, IngestBatcher};
use crate::progress::CrawlEvent;
use crate::scanner::{ScanStats, TreeScanner};
use crate::scheduler::{CrawlJob, CrawlRun, RootReport, RunContext, RunSummary};
use crate::snapshot_store::SnapshotStore;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub batch_size: usize,
    pub throttle: Duration,
    pub flush_timeout: Option<Duration>,
    /// `false` resubmits every file regardless of the previous snapshot.
    pub incremental: bool,
    pub resubmit_metadata_only: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            throttle: Duration::ZERO,
            flush_timeout: None,
            incremental: true,
            resubmit_metadata_only: true,
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.crawler.batch_size,
            throttle: config.crawler.throttle(),
            flush_timeout: Some(config.store.flush_timeout()),
            incremental: config.crawler.incremental,
            resubmit_metadata_only: config.crawler.resubmit_metadata_only,
        }
    }
}

pub struct CrawlPipeline {
    scanner: TreeScanner,
    builder: Arc<DocumentBuilder>,
    store: Arc<dyn DocumentStore>,
    snapshots: SnapshotStore,
    settings: PipelineSettings,
}

impl CrawlPipeline {
    pub fn new(
        scanner: TreeScanner,
        builder: DocumentBuilder,
        store: Arc<dyn DocumentStore>,
        snapshots: SnapshotStore,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            scanner,
            builder: Arc::new(builder),
            store,
            snapshots,
            settings,
        }
    }

    pub fn from_config(
        config: &Config,
        store: Arc<dyn DocumentStore>,
        snapshots: SnapshotStore,
    ) -> Result<Self> {
        Ok(Self::new(
            TreeScanner::from_config(&config.crawler)?,
            DocumentBuilder::from_config(&config.crawler),
            store,
            snapshots,
            PipelineSettings::from_config(config),
        ))
    }

    /// `false` forces a full resubmission (`deskindex crawl --full`).
    pub fn with_incremental(mut self, incremental: bool) -> Self {
        self.settings.incremental = incremental;
        self
    }
}

#[async_trait]
impl CrawlJob for CrawlPipeline {
    async fn begin(&self) -> Result<Box<dyn CrawlRun>> {
        let previous = self.snapshots.load().await?;
        info!(
            previous_entries = previous.len(),
            incremental = self.settings.incremental,
            "snapshot loaded"
        );
        let differ = SnapshotDiffer::new()
            .resubmit_metadata_only(self.settings.resubmit_metadata_only)
            .with_previous(previous);
        Ok(Box::new(PipelineRun {
            scanner: self.scanner.clone(),
            builder: self.builder.clone(),
            store: self.store.clone(),
            snapshots: self.snapshots.clone(),
            settings: self.settings.clone(),
            differ: Arc::new(differ),
            next: Snapshot::new(),
            seen: HashSet::new(),
            failed_roots: Vec::new(),
        }))
    }
}

/// State for one crawl.
pub struct PipelineRun {
    scanner: TreeScanner,
    builder: Arc<DocumentBuilder>,
    store: Arc<dyn DocumentStore>,
    snapshots: SnapshotStore,
    settings: PipelineSettings,
    differ: Arc<SnapshotDiffer>,
    next: Snapshot,
    seen: HashSet<String>,
    failed_roots: Vec<PathBuf>,
}

/// One scanned file on its way from the producer to the batcher.
struct Produced {
    path: String,
    entry: SnapshotEntry,
    document: Option<Document>,
}

struct ProducerResult {
    stats: ScanStats,
    processed: u64,
    cancelled: bool,
}

impl PipelineRun {
    fn under_failed_root(&self, path: &str) -> bool {
        let path = Path::new(path);
        self.failed_roots.iter().any(|root| path.starts_with(root))
    }

    /// Copies previous entries for unavailable roots into the next snapshot.
    fn carry_over_failed_roots(&mut self) {
        if self.failed_roots.is_empty() {
            return;
        }
        let carried: Vec<(String, SnapshotEntry)> = self
            .differ
            .previous()
            .iter()
            .filter(|(path, _)| !self.next.contains(path) && self.under_failed_root(path))
            .map(|(path, entry)| (path.clone(), entry.clone()))
            .collect();
        debug!(entries = carried.len(), "carrying over entries of failed roots");
        for (path, entry) in carried {
            self.next.insert(path, entry);
        }
    }

    async fn delete_missing(&mut self) -> u64 {
        let deleted: Vec<String> = self
            .differ
            .deleted(&self.seen)
            .into_iter()
            .filter(|path| !self.under_failed_root(path))
            .collect();
        if deleted.is_empty() {
            return 0;
        }
        let ids: Vec<String> = deleted.iter().map(|p| document_id(p)).collect();
        let result = match self.settings.flush_timeout {
            Some(limit) => tokio::time::timeout(limit, self.store.delete_documents(&ids))
                .await
                .unwrap_or_else(|_| Err(anyhow!("delete timed out after {limit:?}"))),
            None => self.store.delete_documents(&ids).await,
        };
        match result {
            Ok(n) => {
                info!(deleted = n, "removed missing files from index");
                n as u64
            }
            Err(e) => {
                error!(count = deleted.len(), error = %e, "failed to delete missing files; will retry");
                for path in deleted {
                    if let Some(entry) = self.differ.previous().get(&path) {
                        self.next.insert(path, entry.clone());
                    }
                }
                0
            }
        }
    }
}

#[async_trait]
impl CrawlRun for PipelineRun {
    async fn crawl_root(&mut self, root: &Path, ctx: &RunContext) -> Result<RootReport> {
        let root_abs = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        let root_name = root_abs.display().to_string();
        ctx.progress.report(&CrawlEvent::RootStarted { root: &root_name });

        let scan = match self.scanner.scan(&root_abs) {
            Ok(scan) => scan,
            Err(e) => {
                self.failed_roots.push(root_abs);
                return Err(e);
            }
        };

        let (tx, mut rx) = mpsc::channel::<Produced>(CHANNEL_CAPACITY);
        let producer = {
            let differ = self.differ.clone();
            let builder = self.builder.clone();
            let cancel = ctx.cancel.clone();
            let progress = ctx.progress.clone();
            let incremental = self.settings.incremental;
            let root_name = root_name.clone();
            tokio::task::spawn_blocking(move || {
                let mut scan = scan;
                let mut processed = 0u64;
                let mut cancelled = false;
                for record in scan.by_ref() {
                    if cancel.is_cancelled() {
                        cancelled = true;
                        break;
                    }
                    let change = if incremental {
                        differ.classify(&record)
                    } else {
                        Change::New
                    };
                    let item = produce(&builder, record, change);
                    if tx.blocking_send(item).is_err() {
                        break;
                    }
                    processed += 1;
                    progress.report(&CrawlEvent::FileProcessed {
                        root: &root_name,
                        processed,
                    });
                }
                ProducerResult {
                    stats: scan.stats(),
                    processed,
                    cancelled,
                }
            })
        };

        let mut batcher = IngestBatcher::new(self.store.clone(), self.settings.batch_size)
            .with_throttle(self.settings.throttle)
            .with_flush_timeout(self.settings.flush_timeout);
        while let Some(item) = rx.recv().await {
            self.seen.insert(item.path.clone());
            self.next.insert(item.path, item.entry);
            if let Some(doc) = item.document {
                if let Some(outcome) = batcher.push(doc).await {
                    ctx.progress.report(&CrawlEvent::BatchFlushed {
                        root: &root_name,
                        size: outcome.size,
                        indexed: outcome.indexed,
                    });
                }
            }
        }
        if let Some(outcome) = batcher.flush().await {
            ctx.progress.report(&CrawlEvent::BatchFlushed {
                root: &root_name,
                size: outcome.size,
                indexed: outcome.indexed,
            });
        }
        let batches = batcher.finish().await;
        for path in &batches.failed_paths {
            self.next.remove(path);
        }

        let produced = match producer.await {
            Ok(result) => result,
            Err(e) => {
                self.failed_roots.push(root_abs);
                return Err(e).with_context(|| format!("Scan of {root_name} aborted"));
            }
        };

        ctx.progress.report(&CrawlEvent::RootFinished {
            root: &root_name,
            stats: produced.stats,
            submitted: batches.submitted,
        });
        if batches.failed_batches > 0 {
            warn!(
                root = %root_name,
                failed_batches = batches.failed_batches,
                failed_documents = batches.failed_paths.len(),
                "some batches were not accepted"
            );
        }
        info!(
            root = %root_name,
            files = produced.processed,
            submitted = batches.submitted,
            indexed = batches.indexed,
            skipped_pattern = produced.stats.skipped_by_pattern,
            skipped_extension = produced.stats.skipped_by_extension,
            oversized = produced.stats.skipped_by_size,
            errors = produced.stats.skipped_by_error,
            "root crawled"
        );

        Ok(RootReport {
            root: root_name,
            files_scanned: produced.processed,
            documents_submitted: batches.submitted,
            documents_indexed: batches.indexed,
            cancelled: produced.cancelled,
        })
    }

    async fn finish(&mut self, summary: &RunSummary) -> Result<()> {
        if summary.cancelled {
            info!("crawl cancelled; snapshot left unchanged");
        } else {
            self.carry_over_failed_roots();
            self.delete_missing().await;
            let next = std::mem::take(&mut self.next);
            self.snapshots.replace(&next).await?;
            info!(entries = next.len(), "snapshot committed");
        }
        self.snapshots.record_run(summary).await
    }
}

fn produce(builder: &DocumentBuilder, record: FileRecord, change: Change) -> Produced {
    let key = record.modified_key();
    let entry = if builder.is_metadata_only(&record) {
        SnapshotEntry::metadata_only(key)
    } else {
        SnapshotEntry::new(key)
    };
    let document = change.needs_submit().then(|| builder.build(&record));
    Produced {
        path: record.path,
        entry,
        document,
    }
}
