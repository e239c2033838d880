//! Configuration parsing and validation.
//!
//! deskindex is configured from one TOML file. Every section except `[db]`
//! has defaults, so a minimal file only names the database path:
//!
//! ```toml
//! [db]
//! path = "./data/deskindex.sqlite"
//!
//! [crawler]
//! roots = ["/srv/share"]
//! ```
//!
//! After parsing, `MEILISEARCH_HOST` and `MEILI_MASTER_KEY` override the
//! `[store]` host and API key.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const HOST_ENV: &str = "MEILISEARCH_HOST";
pub const API_KEY_ENV: &str = "MEILI_MASTER_KEY";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlerConfig {
    #[serde(default = "default_roots")]
    pub roots: Vec<PathBuf>,
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
    /// Extension allow-list; empty admits every file.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,
    #[serde(default = "default_true")]
    pub incremental: bool,
    #[serde(default = "default_true")]
    pub resubmit_metadata_only: bool,
    #[serde(default = "default_true")]
    pub crawl_on_start: bool,
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            roots: default_roots(),
            exclude_patterns: default_exclude_patterns(),
            extensions: default_extensions(),
            interval_minutes: default_interval_minutes(),
            batch_size: default_batch_size(),
            max_file_size_mb: default_max_file_size_mb(),
            max_content_length: default_max_content_length(),
            incremental: true,
            resubmit_metadata_only: true,
            crawl_on_start: true,
            throttle_ms: default_throttle_ms(),
        }
    }
}

impl CrawlerConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

fn default_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("/mnt/c_users")]
}
fn default_exclude_patterns() -> Vec<String> {
    ["*.tmp", "node_modules", ".git", "__pycache__"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_extensions() -> Vec<String> {
    [".pdf", ".docx", ".xlsx", ".txt", ".md"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_interval_minutes() -> u64 {
    60
}
fn default_batch_size() -> usize {
    1000
}
fn default_max_file_size_mb() -> u64 {
    50
}
fn default_max_content_length() -> usize {
    100_000
}
fn default_throttle_ms() -> u64 {
    100
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_index_name")]
    pub index_name: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_flush_timeout_secs")]
    pub flush_timeout_secs: u64,
    /// Languages passed to the backend's localized-attribute setting.
    #[serde(default)]
    pub locales: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            index_name: default_index_name(),
            api_key: None,
            flush_timeout_secs: default_flush_timeout_secs(),
            locales: Vec::new(),
        }
    }
}

impl StoreConfig {
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_secs(self.flush_timeout_secs)
    }
}

fn default_host() -> String {
    "http://localhost:7700".to_string()
}
fn default_index_name() -> String {
    "files".to_string()
}
fn default_flush_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Lower-cases and dot-prefixes an extension (`"PDF"` → `".pdf"`).
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// Parses and validates a configuration document without touching the
/// environment.
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config = toml::from_str(content).context("Failed to parse config file")?;

    config.crawler.extensions = config
        .crawler
        .extensions
        .iter()
        .filter(|e| !e.trim().is_empty())
        .map(|e| normalize_extension(e))
        .collect();

    if config.crawler.roots.is_empty() {
        bail!("crawler.roots must name at least one directory");
    }
    if config.crawler.batch_size == 0 {
        bail!("crawler.batch_size must be > 0");
    }
    if config.crawler.interval_minutes == 0 {
        bail!("crawler.interval_minutes must be > 0");
    }
    if config.crawler.max_content_length == 0 {
        bail!("crawler.max_content_length must be > 0");
    }
    if config.store.flush_timeout_secs == 0 {
        bail!("store.flush_timeout_secs must be > 0");
    }
    if config.store.index_name.trim().is_empty() {
        bail!("store.index_name must not be empty");
    }

    Ok(config)
}

/// Applies `MEILISEARCH_HOST` / `MEILI_MASTER_KEY` when set and non-empty.
pub fn apply_env_overrides(config: &mut Config) {
    if let Some(host) = std::env::var(HOST_ENV).ok().filter(|v| !v.is_empty()) {
        config.store.host = host;
    }
    if let Some(key) = std::env::var(API_KEY_ENV).ok().filter(|v| !v.is_empty()) {
        config.store.api_key = Some(key);
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let mut config = parse_config(&content)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Written by `deskindex init` when no config file exists yet.
pub const CONFIG_TEMPLATE: &str = r#"[crawler]
roots = ["/mnt/c_users"]
exclude_patterns = ["*.tmp", "node_modules", ".git", "__pycache__"]
extensions = [".pdf", ".docx", ".xlsx", ".txt", ".md"]
interval_minutes = 60
batch_size = 1000
max_file_size_mb = 50
max_content_length = 100000

[store]
host = "http://localhost:7700"
index_name = "files"
# api_key = "..."
flush_timeout_secs = 120
# locales = ["jpn"]

[db]
path = "./data/deskindex.sqlite"

[server]
bind = "127.0.0.1:8000"

[logging]
level = "info"
format = "pretty"
"#;
