//! Meilisearch document store.
//!
//! Talks to the Meilisearch REST API with `reqwest`. Every write returns a
//! task id; the store polls `/tasks/{uid}` until the task succeeds, fails
//! or the configured flush timeout elapses, so a returned `Ok` means the
//! documents are actually indexed.
//!
//! See <https://www.meilisearch.com/docs/reference/api/overview>.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use deskindex_core::models::Document;
use deskindex_core::store::{DocumentStore, IndexStats, SearchRequest, SearchResponse};
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;

const POLL_START: Duration = Duration::from_millis(25);
const POLL_MAX: Duration = Duration::from_millis(500);
const CROP_LENGTH: u64 = 200;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("search backend request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("search backend returned {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("index task {uid} failed: {message}")]
    TaskFailed { uid: u64, message: String },
    #[error("index task {uid} did not finish within {timeout:?}")]
    TaskTimeout { uid: u64, timeout: Duration },
}

impl StoreError {
    fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Api { status: 404, .. })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskInfo {
    task_uid: u64,
}

#[derive(Deserialize)]
struct Task {
    status: String,
    #[serde(default)]
    error: Option<TaskError>,
}

#[derive(Deserialize)]
struct TaskError {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeiliSearchResponse {
    #[serde(default)]
    hits: Vec<Value>,
    #[serde(default)]
    estimated_total_hits: Option<u64>,
    #[serde(default)]
    processing_time_ms: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeiliStats {
    number_of_documents: u64,
    #[serde(default)]
    is_indexing: bool,
    #[serde(default)]
    field_distribution: BTreeMap<String, u64>,
}

pub struct MeilisearchStore {
    client: reqwest::Client,
    base_url: String,
    index: String,
    api_key: Option<String>,
    task_timeout: Duration,
    locales: Vec<String>,
}

impl MeilisearchStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.flush_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.host.trim_end_matches('/').to_string(),
            index: config.index_name.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            task_timeout: config.flush_timeout(),
            locales: config.locales.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, StoreError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body: Value = response.json().await.unwrap_or_default();
        Err(StoreError::Api {
            status: status.as_u16(),
            code: body["code"].as_str().unwrap_or("unknown").to_string(),
            message: body["message"].as_str().unwrap_or_default().to_string(),
        })
    }

    /// Sends a write and waits for its task to finish.
    async fn submit(&self, builder: RequestBuilder) -> Result<(), StoreError> {
        let info: TaskInfo = self.send(builder).await?.json().await?;
        self.wait_for_task(info.task_uid).await
    }

    async fn wait_for_task(&self, uid: u64) -> Result<(), StoreError> {
        let deadline = tokio::time::Instant::now() + self.task_timeout;
        let mut delay = POLL_START;
        loop {
            let task: Task = self
                .send(self.request(Method::GET, &format!("/tasks/{uid}")))
                .await?
                .json()
                .await?;
            match task.status.as_str() {
                "succeeded" => {
                    debug!(uid, "task succeeded");
                    return Ok(());
                }
                "failed" | "canceled" => {
                    return Err(StoreError::TaskFailed {
                        uid,
                        message: task
                            .error
                            .map(|e| e.message)
                            .unwrap_or_else(|| task.status.clone()),
                    });
                }
                _ => {}
            }
            if tokio::time::Instant::now() + delay > deadline {
                return Err(StoreError::TaskTimeout {
                    uid,
                    timeout: self.task_timeout,
                });
            }
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(POLL_MAX);
        }
    }

    fn index_path(&self, suffix: &str) -> String {
        format!("/indexes/{}{}", self.index, suffix)
    }
}

/// Settings applied on [`DocumentStore::initialize`].
pub fn index_settings(locales: &[String]) -> Value {
    let mut settings = json!({
        "searchableAttributes": ["filename", "content", "path"],
        "filterableAttributes": ["extension", "modified_at", "size"],
        "sortableAttributes": ["modified_at", "size", "filename"],
        "rankingRules": [
            "words",
            "typo",
            "proximity",
            "attribute",
            "sort",
            "exactness",
            "modified_at:desc"
        ],
    });
    if !locales.is_empty() {
        settings["localizedAttributes"] = json!([{
            "attributePatterns": ["filename", "content", "path"],
            "locales": locales,
        }]);
    }
    settings
}

fn search_body(request: &SearchRequest) -> Value {
    let mut body = json!({
        "q": request.query,
        "limit": request.limit,
        "offset": request.offset,
    });
    if let Some(filter) = request.filter.as_deref().filter(|f| !f.trim().is_empty()) {
        body["filter"] = json!(filter);
    }
    if !request.sort.is_empty() {
        body["sort"] = json!(request.sort);
    }
    if request.highlight {
        body["attributesToHighlight"] = json!(["filename", "content"]);
        body["highlightPreTag"] = json!("<mark>");
        body["highlightPostTag"] = json!("</mark>");
        body["attributesToCrop"] = json!(["content"]);
        body["cropLength"] = json!(CROP_LENGTH);
    }
    body
}

#[async_trait]
impl DocumentStore for MeilisearchStore {
    async fn initialize(&self) -> Result<()> {
        match self
            .send(self.request(Method::GET, &self.index_path("")))
            .await
        {
            Ok(_) => debug!(index = %self.index, "index exists"),
            Err(e) if e.is_not_found() => {
                info!(index = %self.index, "creating index");
                self.submit(
                    self.request(Method::POST, "/indexes")
                        .json(&json!({ "uid": self.index, "primaryKey": "id" })),
                )
                .await?;
            }
            Err(e) => return Err(e.into()),
        }

        self.submit(
            self.request(Method::PATCH, &self.index_path("/settings"))
                .json(&index_settings(&self.locales)),
        )
        .await?;
        info!(index = %self.index, "index settings applied");
        Ok(())
    }

    async fn add_documents(&self, docs: &[Document]) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }
        self.submit(
            self.request(Method::POST, &self.index_path("/documents?primaryKey=id"))
                .json(docs),
        )
        .await?;
        Ok(docs.len())
    }

    async fn delete_documents(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.submit(
            self.request(Method::POST, &self.index_path("/documents/delete-batch"))
                .json(ids),
        )
        .await?;
        Ok(ids.len())
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let response: MeiliSearchResponse = self
            .send(
                self.request(Method::POST, &self.index_path("/search"))
                    .json(&search_body(request)),
            )
            .await?
            .json()
            .await?;
        let total_estimate = response
            .estimated_total_hits
            .unwrap_or(response.hits.len() as u64);
        Ok(SearchResponse {
            hits: response.hits,
            total_estimate,
            elapsed_ms: response.processing_time_ms,
        })
    }

    async fn stats(&self) -> Result<IndexStats> {
        let stats: MeiliStats = self
            .send(self.request(Method::GET, &self.index_path("/stats")))
            .await?
            .json()
            .await?;
        Ok(IndexStats {
            document_count: stats.number_of_documents,
            is_indexing: stats.is_indexing,
            field_distribution: stats.field_distribution,
        })
    }

    async fn clear_all(&self) -> Result<bool> {
        self.submit(self.request(Method::DELETE, &self.index_path("/documents")))
            .await?;
        info!(index = %self.index, "all documents deleted");
        Ok(true)
    }

    async fn health_check(&self) -> bool {
        let response = match self.send(self.request(Method::GET, "/health")).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "search backend health check failed");
                return false;
            }
        };
        match response.json::<Value>().await {
            Ok(body) => body["status"] == "available",
            Err(_) => false,
        }
    }
}
