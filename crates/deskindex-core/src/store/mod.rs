//! Storage abstraction for the search index.
//!
//! The [`DocumentStore`] trait covers every operation the crawl pipeline and
//! the HTTP surface need from a search backend. The production backend lives
//! in the application crate (Meilisearch over HTTP); [`memory::InMemoryStore`]
//! backs tests and local experiments.
//!
//! Implementations must be `Send + Sync` to be shared across tokio tasks.

pub mod memory;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::Document;

fn default_limit() -> usize {
    20
}

fn default_highlight() -> bool {
    true
}

/// A query against the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    /// Backend filter expression, e.g. `extension = ".pdf"`.
    #[serde(default)]
    pub filter: Option<String>,
    /// `field:asc` / `field:desc` sort clauses.
    #[serde(default)]
    pub sort: Vec<String>,
    #[serde(default = "default_highlight")]
    pub highlight: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: default_limit(),
            offset: 0,
            filter: None,
            sort: Vec::new(),
            highlight: default_highlight(),
        }
    }
}

/// Hits are passed through as JSON so backend-specific decorations
/// (`_formatted`, ranking details) survive untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<serde_json::Value>,
    pub total_estimate: u64,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub document_count: u64,
    pub is_indexing: bool,
    pub field_distribution: BTreeMap<String, u64>,
}

/// Abstract search backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`initialize`](DocumentStore::initialize) | Create the index and apply settings |
/// | [`add_documents`](DocumentStore::add_documents) | Upsert a batch by `id` |
/// | [`delete_documents`](DocumentStore::delete_documents) | Remove a batch of ids |
/// | [`search`](DocumentStore::search) | Full-text query |
/// | [`stats`](DocumentStore::stats) | Document count and indexing state |
/// | [`clear_all`](DocumentStore::clear_all) | Drop every document |
/// | [`health_check`](DocumentStore::health_check) | Backend reachability |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Idempotent index setup. Backends without settings do nothing.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Upserts `docs` keyed by `id`; returns how many the backend accepted.
    ///
    /// An `Err` means the whole batch should be treated as not indexed.
    async fn add_documents(&self, docs: &[Document]) -> Result<usize>;

    /// Deletes by id; unknown ids are ignored. Returns the number requested.
    async fn delete_documents(&self, ids: &[String]) -> Result<usize>;

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse>;

    async fn stats(&self) -> Result<IndexStats>;

    /// Removes every document. Returns `true` once the backend confirms.
    async fn clear_all(&self) -> Result<bool>;

    /// `true` if the backend is reachable and ready.
    async fn health_check(&self) -> bool;
}
