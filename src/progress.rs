//! Crawl progress reporting.
//!
//! Reports observable progress during a crawl so operators see which root is
//! being scanned and how far along it is. Human and JSON output go to
//! **stderr** so stdout stays parseable for `deskindex crawl` in scripts.
//!
//! The scheduler wraps whichever reporter is configured so that every
//! [`CrawlEvent::FileProcessed`] also bumps the status counter served at
//! `/api/crawl/status`.

use std::io::Write;
use std::sync::Arc;

use crate::scanner::ScanStats;

/// How often the human reporter prints a per-file line.
const HUMAN_EVERY_N_FILES: u64 = 1000;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum CrawlEvent<'a> {
    RootStarted {
        root: &'a str,
    },
    /// One scanned file was handled; `processed` counts files in this root.
    FileProcessed {
        root: &'a str,
        processed: u64,
    },
    BatchFlushed {
        root: &'a str,
        size: usize,
        indexed: usize,
    },
    RootFinished {
        root: &'a str,
        stats: ScanStats,
        submitted: u64,
    },
}

/// Receives crawl progress. Called from the producer thread and from the
/// async batcher, so implementations must be cheap and thread-safe.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &CrawlEvent<'_>);
}

/// Human-friendly progress on stderr: "crawl /srv/share  scanned  12,000 files".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: &CrawlEvent<'_>) {
        let line = match event {
            CrawlEvent::RootStarted { root } => format!("crawl {root}  scanning...\n"),
            CrawlEvent::FileProcessed { root, processed } => {
                if processed % HUMAN_EVERY_N_FILES != 0 {
                    return;
                }
                format!("crawl {root}  scanned  {} files\n", format_number(*processed))
            }
            CrawlEvent::BatchFlushed { root, size, indexed } => format!(
                "crawl {root}  flushed  {} / {} documents\n",
                format_number(*indexed as u64),
                format_number(*size as u64)
            ),
            CrawlEvent::RootFinished {
                root,
                stats,
                submitted,
            } => format!(
                "crawl {root}  done  {} files, {} submitted, {} excluded, {} errors\n",
                format_number(stats.total_files),
                format_number(*submitted),
                format_number(stats.skipped_by_pattern + stats.skipped_by_extension),
                format_number(stats.skipped_by_error),
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: &CrawlEvent<'_>) {
        let obj = match event {
            CrawlEvent::RootStarted { root } => serde_json::json!({
                "event": "root_started",
                "root": root,
            }),
            CrawlEvent::FileProcessed { root, processed } => {
                if processed % HUMAN_EVERY_N_FILES != 0 {
                    return;
                }
                serde_json::json!({
                    "event": "progress",
                    "root": root,
                    "processed": processed,
                })
            }
            CrawlEvent::BatchFlushed { root, size, indexed } => serde_json::json!({
                "event": "batch_flushed",
                "root": root,
                "size": size,
                "indexed": indexed,
            }),
            CrawlEvent::RootFinished {
                root,
                stats,
                submitted,
            } => serde_json::json!({
                "event": "root_finished",
                "root": root,
                "stats": stats,
                "submitted": submitted,
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: &CrawlEvent<'_>) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Arc<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Arc::new(NoProgress),
            ProgressMode::Human => Arc::new(StderrProgress),
            ProgressMode::Json => Arc::new(JsonProgress),
        }
    }
}
