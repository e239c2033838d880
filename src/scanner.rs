//! Recursive directory scanner.
//!
//! [`TreeScanner::scan`] returns a lazy [`Scan`] iterator over one root.
//! Nothing is collected up front: each call to `next()` advances the
//! underlying `walkdir` walk until the next admitted regular file.
//!
//! # Rules
//!
//! - Excluded directories are pruned before their children are read.
//! - Symbolic links are never followed and never yielded.
//! - A file is checked against the exclusion patterns, then the extension
//!   allow-list, and only then is its metadata read.
//! - Entries that cannot be read are skipped and counted.
//! - Files above the size ceiling are still yielded (so they get a
//!   metadata-only document) and counted in `skipped_by_size`.

use std::collections::HashSet;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use deskindex_core::models::{extension_of, FileRecord};
use serde::Serialize;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::config::{normalize_extension, CrawlerConfig};
use crate::filter::PathFilter;

/// Counters for one scan pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Files yielded by the scan.
    pub total_files: u64,
    pub skipped_by_pattern: u64,
    pub skipped_by_extension: u64,
    pub skipped_by_size: u64,
    pub skipped_by_error: u64,
    pub pruned_dirs: u64,
}

#[derive(Debug, Clone)]
pub struct TreeScanner {
    filter: PathFilter,
    extensions: HashSet<String>,
    max_file_size_bytes: u64,
}

impl TreeScanner {
    pub fn new<S: AsRef<str>>(
        filter: PathFilter,
        extensions: &[S],
        max_file_size_bytes: u64,
    ) -> Self {
        Self {
            filter,
            extensions: extensions
                .iter()
                .map(|e| normalize_extension(e.as_ref()))
                .collect(),
            max_file_size_bytes,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Result<Self> {
        let filter = PathFilter::new(config.exclude_patterns.as_slice())?;
        Ok(Self::new(
            filter,
            config.extensions.as_slice(),
            config.max_file_size_bytes(),
        ))
    }

    /// Starts a fresh walk of `root`.
    ///
    /// Fails if `root` does not exist or is not a directory.
    pub fn scan(&self, root: &Path) -> Result<Scan> {
        let root = std::path::absolute(root)
            .with_context(|| format!("Cannot resolve scan root: {}", root.display()))?;
        if !root.exists() {
            bail!("Scan root does not exist: {}", root.display());
        }
        if !root.is_dir() {
            bail!("Scan root is not a directory: {}", root.display());
        }
        let walker = WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();
        Ok(Scan {
            scanner: self.clone(),
            walker,
            stats: ScanStats::default(),
        })
    }
}

/// Lazy walk over one root. See the module docs for the admission rules.
pub struct Scan {
    scanner: TreeScanner,
    walker: walkdir::IntoIter,
    stats: ScanStats,
}

impl Scan {
    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    fn admit(&mut self, entry: DirEntry) -> Option<FileRecord> {
        let name = entry.file_name().to_string_lossy();

        if self.scanner.filter.is_excluded(&name, false) {
            self.stats.skipped_by_pattern += 1;
            return None;
        }
        if !self.scanner.extensions.is_empty()
            && !self.scanner.extensions.contains(&extension_of(&name))
        {
            self.stats.skipped_by_extension += 1;
            return None;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                debug!(path = %entry.path().display(), error = %e, "metadata unavailable");
                self.stats.skipped_by_error += 1;
                return None;
            }
        };
        if metadata.len() > self.scanner.max_file_size_bytes {
            self.stats.skipped_by_size += 1;
        }

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let created = metadata.created().unwrap_or(modified);
        self.stats.total_files += 1;
        Some(FileRecord::new(
            entry.path().to_string_lossy().into_owned(),
            metadata.len(),
            DateTime::<Utc>::from(modified),
            DateTime::<Utc>::from(created),
        ))
    }
}

impl Iterator for Scan {
    type Item = FileRecord;

    fn next(&mut self) -> Option<FileRecord> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "walk error");
                    self.stats.skipped_by_error += 1;
                    continue;
                }
            };
            let file_type = entry.file_type();
            if file_type.is_dir() {
                if entry.depth() > 0
                    && self
                        .scanner
                        .filter
                        .is_excluded(&entry.file_name().to_string_lossy(), true)
                {
                    self.stats.pruned_dirs += 1;
                    self.walker.skip_current_dir();
                }
                continue;
            }
            if !file_type.is_file() {
                continue;
            }
            if let Some(record) = self.admit(entry) {
                return Some(record);
            }
        }
    }
}
