//! Core data models used throughout deskindex.
//!
//! A [`FileRecord`] is produced by the scanner for every visible file; the
//! ingest pipeline flattens it into a [`Document`] that the search backend
//! stores verbatim.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the path digest.
pub const DOCUMENT_ID_LEN: usize = 16;

/// Derives the document identifier for an absolute path.
///
/// SHA-256 over the UTF-8 path, truncated to [`DOCUMENT_ID_LEN`] hex
/// characters. The same path always maps to the same identifier, which is
/// what makes re-submission an overwrite in the store.
pub fn document_id(path: &str) -> String {
    let mut id = hex::encode(Sha256::digest(path.as_bytes()));
    id.truncate(DOCUMENT_ID_LEN);
    id
}

/// Formats a timestamp the way it is persisted and compared.
///
/// RFC 3339 in UTC with as many sub-second digits as needed. Snapshot
/// comparison is string equality on this form.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Lower-cased, dot-prefixed extension of a file name, or `""` if it has none.
///
/// Dotfiles such as `.bashrc` have no extension.
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// One scanned filesystem entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: String,
    pub path: String,
    pub filename: String,
    pub extension: String,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    /// Builds a record for `path`, deriving name, extension and identifier.
    pub fn new(
        path: impl Into<String>,
        size: u64,
        modified_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let path = path.into();
        let filename = Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = extension_of(&filename);
        Self {
            id: document_id(&path),
            path,
            filename,
            extension,
            size,
            modified_at,
            created_at,
        }
    }

    /// The modified timestamp in its persisted form.
    pub fn modified_key(&self) -> String {
        format_timestamp(&self.modified_at)
    }
}

/// The flattened, store-ready representation of one scanned file.
///
/// `content` is always present; unsupported types, oversized files and
/// extraction failures all store an empty string so every document shares
/// the same schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub path: String,
    pub filename: String,
    pub extension: String,
    pub size: u64,
    pub modified_at: String,
    pub created_at: String,
    pub content: String,
    pub indexed_at: String,
}

impl Document {
    pub fn from_record(
        record: &FileRecord,
        content: Option<String>,
        indexed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: record.id.clone(),
            path: record.path.clone(),
            filename: record.filename.clone(),
            extension: record.extension.clone(),
            size: record.size,
            modified_at: format_timestamp(&record.modified_at),
            created_at: format_timestamp(&record.created_at),
            content: content.unwrap_or_default(),
            indexed_at: format_timestamp(&indexed_at),
        }
    }
}
