//! Record → document conversion and batched submission.
//!
//! [`DocumentBuilder`] turns a scanned [`FileRecord`] into a store-ready
//! [`Document`], extracting content only when the file type is supported and
//! the file is within the size ceiling. [`IngestBatcher`] buffers documents
//! and flushes them to the [`DocumentStore`] in fixed-size batches.
//!
//! A failed or timed-out flush is logged and recorded in the
//! [`BatchReport`]; it never aborts the crawl. The paths of documents in
//! failed batches are reported so the caller can keep them out of the
//! committed snapshot and retry them on the next crawl.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::Utc;
use deskindex_core::models::{Document, FileRecord};
use deskindex_core::store::DocumentStore;
use serde::Serialize;
use tracing::{debug, error};

use crate::config::CrawlerConfig;
use crate::extract::ExtractorRegistry;

#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    registry: ExtractorRegistry,
    max_file_size_bytes: u64,
}

impl DocumentBuilder {
    pub fn new(registry: ExtractorRegistry, max_file_size_bytes: u64) -> Self {
        Self {
            registry,
            max_file_size_bytes,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            ExtractorRegistry::new(config.max_content_length),
            config.max_file_size_bytes(),
        )
    }

    /// Above the size ceiling: indexed by name and metadata only.
    pub fn is_metadata_only(&self, record: &FileRecord) -> bool {
        record.size > self.max_file_size_bytes
    }

    pub fn wants_content(&self, record: &FileRecord) -> bool {
        !self.is_metadata_only(record) && self.registry.is_supported(Path::new(&record.path))
    }

    /// Builds the document, running extraction when [`wants_content`](Self::wants_content).
    pub fn build(&self, record: &FileRecord) -> Document {
        let content = if self.wants_content(record) {
            self.registry.extract_text(Path::new(&record.path))
        } else {
            None
        };
        Document::from_record(record, content, Utc::now())
    }
}

/// Totals for one batcher lifetime (one root).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub batches: u64,
    pub submitted: u64,
    pub indexed: u64,
    pub failed_batches: u64,
    /// Paths whose batch was not accepted by the store.
    pub failed_paths: Vec<String>,
}

/// Result of one flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushOutcome {
    pub size: usize,
    pub indexed: usize,
    pub ok: bool,
}

pub struct IngestBatcher {
    store: Arc<dyn DocumentStore>,
    batch_size: usize,
    throttle: Duration,
    flush_timeout: Option<Duration>,
    buffer: Vec<Document>,
    report: BatchReport,
}

impl IngestBatcher {
    pub fn new(store: Arc<dyn DocumentStore>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            batch_size,
            throttle: Duration::ZERO,
            flush_timeout: None,
            buffer: Vec::with_capacity(batch_size.min(1024)),
            report: BatchReport::default(),
        }
    }

    /// Pause after every full-batch flush to spare the backend.
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// Upper bound on a single store call; `None` waits indefinitely.
    pub fn with_flush_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.flush_timeout = timeout;
        self
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn report(&self) -> &BatchReport {
        &self.report
    }

    /// Buffers `doc`, flushing when the buffer reaches the batch size.
    pub async fn push(&mut self, doc: Document) -> Option<FlushOutcome> {
        self.buffer.push(doc);
        if self.buffer.len() < self.batch_size {
            return None;
        }
        let outcome = self.flush().await;
        if !self.throttle.is_zero() {
            tokio::time::sleep(self.throttle).await;
        }
        outcome
    }

    /// Sends whatever is buffered. `None` when the buffer was empty.
    pub async fn flush(&mut self) -> Option<FlushOutcome> {
        if self.buffer.is_empty() {
            return None;
        }
        let batch = std::mem::take(&mut self.buffer);
        let size = batch.len();
        self.report.batches += 1;
        self.report.submitted += size as u64;

        let result = match self.flush_timeout {
            Some(limit) => tokio::time::timeout(limit, self.store.add_documents(&batch))
                .await
                .unwrap_or_else(|_| Err(anyhow!("flush timed out after {limit:?}"))),
            None => self.store.add_documents(&batch).await,
        };

        match result {
            Ok(indexed) => {
                debug!(size, indexed, "batch flushed");
                self.report.indexed += indexed as u64;
                Some(FlushOutcome {
                    size,
                    indexed,
                    ok: true,
                })
            }
            Err(e) => {
                error!(size, error = %e, "batch submission failed");
                self.report.failed_batches += 1;
                self.report
                    .failed_paths
                    .extend(batch.into_iter().map(|d| d.path));
                Some(FlushOutcome {
                    size,
                    indexed: 0,
                    ok: false,
                })
            }
        }
    }

    /// Flushes the partial remainder and returns the totals.
    pub async fn finish(mut self) -> BatchReport {
        self.flush().await;
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use deskindex_core::store::{IndexStats, SearchRequest, SearchResponse};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingStore {
        batches: Mutex<Vec<usize>>,
        fail_first: AtomicUsize,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl DocumentStore for RecordingStore {
        async fn add_documents(&self, docs: &[Document]) -> Result<usize> {
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            if self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                bail!("backend unavailable");
            }
            self.batches.lock().unwrap().push(docs.len());
            Ok(docs.len())
        }
        async fn delete_documents(&self, ids: &[String]) -> Result<usize> {
            Ok(ids.len())
        }
        async fn search(&self, _request: &SearchRequest) -> Result<SearchResponse> {
            Ok(SearchResponse::default())
        }
        async fn stats(&self) -> Result<IndexStats> {
            Ok(IndexStats::default())
        }
        async fn clear_all(&self) -> Result<bool> {
            Ok(true)
        }
        async fn health_check(&self) -> bool {
            true
        }
    }

    fn doc(i: usize) -> Document {
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let rec = FileRecord::new(format!("/data/file{i}.txt"), 1, t, t);
        Document::from_record(&rec, None, t)
    }

    #[tokio::test]
    async fn flushes_full_batches_then_remainder() {
        let store = Arc::new(RecordingStore::default());
        let mut batcher = IngestBatcher::new(store.clone(), 1000);
        let mut flushes = 0;
        for i in 0..2500 {
            if batcher.push(doc(i)).await.is_some() {
                flushes += 1;
            }
        }
        assert_eq!(flushes, 2);
        assert_eq!(batcher.buffered(), 500);
        let report = batcher.finish().await;

        assert_eq!(*store.batches.lock().unwrap(), vec![1000, 1000, 500]);
        assert_eq!(report.batches, 3);
        assert_eq!(report.submitted, 2500);
        assert_eq!(report.indexed, 2500);
        assert_eq!(report.failed_batches, 0);
    }

    #[tokio::test]
    async fn failed_batch_is_recorded_and_crawl_continues() {
        let store = Arc::new(RecordingStore {
            fail_first: AtomicUsize::new(1),
            ..Default::default()
        });
        let mut batcher = IngestBatcher::new(store.clone(), 2);
        for i in 0..5 {
            batcher.push(doc(i)).await;
        }
        let report = batcher.finish().await;

        assert_eq!(report.batches, 3);
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.indexed, 3);
        assert_eq!(
            report.failed_paths,
            vec!["/data/file0.txt".to_string(), "/data/file1.txt".to_string()]
        );
        assert_eq!(*store.batches.lock().unwrap(), vec![2, 1]);
    }

    #[tokio::test]
    async fn slow_flush_times_out() {
        let store = Arc::new(RecordingStore {
            delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let mut batcher = IngestBatcher::new(store, 10)
            .with_flush_timeout(Some(Duration::from_millis(20)));
        batcher.push(doc(0)).await;
        let outcome = batcher.flush().await.unwrap();
        assert!(!outcome.ok);
        assert_eq!(batcher.report().failed_paths.len(), 1);
    }

    #[tokio::test]
    async fn empty_finish_sends_nothing() {
        let store = Arc::new(RecordingStore::default());
        let report = IngestBatcher::new(store.clone(), 10).finish().await;
        assert_eq!(report, BatchReport::default());
        assert!(store.batches.lock().unwrap().is_empty());
    }

    fn record_for(path: &Path) -> FileRecord {
        let meta = std::fs::metadata(path).unwrap();
        let t = chrono::DateTime::<Utc>::from(meta.modified().unwrap());
        FileRecord::new(path.to_string_lossy().into_owned(), meta.len(), t, t)
    }

    #[test]
    fn builder_extracts_supported_files_within_ceiling() {
        let tmp = TempDir::new().unwrap();
        let small = tmp.path().join("small.txt");
        let big = tmp.path().join("big.txt");
        let binary = tmp.path().join("blob.bin");
        std::fs::write(&small, "hello world").unwrap();
        std::fs::write(&big, "x".repeat(200)).unwrap();
        std::fs::write(&binary, [0u8, 1, 2]).unwrap();

        let builder = DocumentBuilder::new(ExtractorRegistry::new(1000), 100);
        assert_eq!(builder.build(&record_for(&small)).content, "hello world");

        let big_rec = record_for(&big);
        assert!(builder.is_metadata_only(&big_rec));
        let big_doc = builder.build(&big_rec);
        assert_eq!(big_doc.content, "");
        assert_eq!(big_doc.size, 200);

        let bin_doc = builder.build(&record_for(&binary));
        assert_eq!(bin_doc.content, "");
        assert_eq!(bin_doc.extension, ".bin");
    }

    #[test]
    fn corrupt_file_does_not_affect_the_next_one() {
        let tmp = TempDir::new().unwrap();
        let corrupt = tmp.path().join("a.docx");
        let fine = tmp.path().join("b.md");
        std::fs::write(&corrupt, b"PK\x03\x04 garbage").unwrap();
        std::fs::write(&fine, "# Title").unwrap();

        let builder = DocumentBuilder::new(ExtractorRegistry::new(1000), u64::MAX);
        assert_eq!(builder.build(&record_for(&corrupt)).content, "");
        assert_eq!(builder.build(&record_for(&fine)).content, "# Title");
    }
}
