//! # deskindex
//!
//! Keeps a full-text search index synchronized with one or more filesystem
//! trees, typically user document folders mounted from network shares.
//!
//! Each crawl walks every configured root, compares what it finds with the
//! snapshot committed by the previous crawl, extracts text from new and
//! changed files and submits them to the search backend in batches. Files
//! that disappeared are removed from the index, and the new snapshot is
//! committed once every root has been processed.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────┐   ┌───────────┐   ┌─────────────┐
//! │  Scanner  │──▶│  Differ  │──▶│ Extractor │──▶│   Batcher   │──▶ Meilisearch
//! │ walkdir   │   │ snapshot │   │ pdf/ooxml │   │ 1000 / call │
//! └───────────┘   └────┬─────┘   └───────────┘   └─────────────┘
//!                      │ commit
//!                      ▼
//!                 ┌──────────┐        ┌───────────┐    ┌──────────┐
//!                 │  SQLite  │        │ Scheduler │◀───│   HTTP   │
//!                 └──────────┘        └───────────┘    └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`filter`] | Glob-based exclusion of names |
//! | [`scanner`] | Lazy directory walk producing file records |
//! | [`extract`] | Text extraction for PDF, OOXML and plain text |
//! | [`ingest`] | Document building and batched submission |
//! | [`pipeline`] | The crawl job tying everything together |
//! | [`scheduler`] | Interval and manual triggers, single-flight, cancellation |
//! | [`progress`] | Crawl progress reporting on stderr |
//! | [`db`] / [`migrate`] | SQLite connection and schema |
//! | [`snapshot_store`] | Snapshot and run-history persistence |
//! | [`meili`] | Meilisearch document store |
//! | [`server`] | HTTP API |
//!
//! Models, the snapshot differ and the store trait live in `deskindex-core`.

pub mod config;
pub mod db;
pub mod extract;
pub mod filter;
pub mod ingest;
pub mod logging;
pub mod meili;
pub mod migrate;
pub mod pipeline;
pub mod progress;
pub mod scanner;
pub mod scheduler;
pub mod server;
pub mod snapshot_store;
