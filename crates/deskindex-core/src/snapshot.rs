//! Snapshot diffing between consecutive crawls.
//!
//! A [`Snapshot`] maps absolute paths to the modified timestamp observed on
//! the last successful crawl. [`SnapshotDiffer`] compares fresh scan records
//! against it and sorts each file into new, updated or unchanged; paths that
//! were not seen again are reported as deleted.
//!
//! Comparison is exact string equality on the persisted timestamp form
//! ([`format_timestamp`](crate::models::format_timestamp)), never a numeric
//! ordering, so a file whose clock moved backwards still counts as updated.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::models::FileRecord;

/// What the previous crawl stored for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub modified_at: String,
    /// The document was submitted without extracted content (oversized).
    pub metadata_only: bool,
}

impl SnapshotEntry {
    pub fn new(modified_at: impl Into<String>) -> Self {
        Self {
            modified_at: modified_at.into(),
            metadata_only: false,
        }
    }

    pub fn metadata_only(modified_at: impl Into<String>) -> Self {
        Self {
            modified_at: modified_at.into(),
            metadata_only: true,
        }
    }
}

/// Path → last observed state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: HashMap<String, SnapshotEntry>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a FileRecord>) -> Self {
        records
            .into_iter()
            .map(|r| (r.path.clone(), r.modified_key()))
            .collect()
    }

    pub fn insert(&mut self, path: impl Into<String>, entry: SnapshotEntry) {
        self.entries.insert(path.into(), entry);
    }

    pub fn get(&self, path: &str) -> Option<&SnapshotEntry> {
        self.entries.get(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<SnapshotEntry> {
        self.entries.remove(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SnapshotEntry)> {
        self.entries.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for Snapshot {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(path, modified)| (path, SnapshotEntry::new(modified)))
                .collect(),
        }
    }
}

impl FromIterator<(String, SnapshotEntry)> for Snapshot {
    fn from_iter<T: IntoIterator<Item = (String, SnapshotEntry)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Classification of a single scanned file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    New,
    Updated,
    Unchanged,
}

impl Change {
    pub fn needs_submit(self) -> bool {
        !matches!(self, Change::Unchanged)
    }
}

/// Result of diffing a full scan against the previous snapshot.
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    pub new: Vec<FileRecord>,
    pub updated: Vec<FileRecord>,
    /// Paths present previously but absent from the scan, sorted.
    pub deleted: BTreeSet<String>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Compares scan results against the previous crawl.
#[derive(Debug, Clone)]
pub struct SnapshotDiffer {
    previous: Snapshot,
    resubmit_metadata_only: bool,
}

impl Default for SnapshotDiffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotDiffer {
    /// A differ with an empty previous snapshot: everything is new.
    pub fn new() -> Self {
        Self {
            previous: Snapshot::new(),
            resubmit_metadata_only: true,
        }
    }

    /// Treat entries stored without content as new on every crawl.
    ///
    /// Defaults to `true`, so a file that was once oversized gets its content
    /// extracted as soon as the size ceiling is raised.
    pub fn resubmit_metadata_only(mut self, enabled: bool) -> Self {
        self.resubmit_metadata_only = enabled;
        self
    }

    /// Replaces the previous snapshot.
    pub fn load(&mut self, previous: Snapshot) {
        self.previous = previous;
    }

    pub fn with_previous(mut self, previous: Snapshot) -> Self {
        self.previous = previous;
        self
    }

    pub fn previous(&self) -> &Snapshot {
        &self.previous
    }

    pub fn classify(&self, record: &FileRecord) -> Change {
        match self.previous.get(&record.path) {
            None => Change::New,
            Some(entry) if entry.metadata_only && self.resubmit_metadata_only => Change::New,
            Some(entry) if entry.modified_at != record.modified_key() => Change::Updated,
            Some(_) => Change::Unchanged,
        }
    }

    /// Previous paths that are not in `seen`.
    pub fn deleted(&self, seen: &HashSet<String>) -> BTreeSet<String> {
        self.previous
            .paths()
            .filter(|p| !seen.contains(p.as_str()))
            .cloned()
            .collect()
    }

    /// Full diff of a complete scan.
    pub fn diff(&self, records: impl IntoIterator<Item = FileRecord>) -> DiffResult {
        let mut result = DiffResult::default();
        let mut seen = HashSet::new();
        for record in records {
            seen.insert(record.path.clone());
            match self.classify(&record) {
                Change::New => result.new.push(record),
                Change::Updated => result.updated.push(record),
                Change::Unchanged => {}
            }
        }
        result.deleted = self.deleted(&seen);
        result
    }
}
