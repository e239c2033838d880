//! HTTP API.
//!
//! Serves search and crawl control over JSON. Handlers receive an explicit
//! [`AppContext`]; the scheduler inside it keeps crawling in the background
//! for as long as the server runs.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/search` | Full-text search (`q`, `limit`, `offset`, `extension`, `filter`, `sort`) |
//! | `GET`  | `/api/stats` | Index statistics |
//! | `POST` | `/api/crawl/start` | Start a crawl now |
//! | `POST` | `/api/crawl/stop` | Ask the running crawl to stop |
//! | `GET`  | `/api/crawl/status` | Scheduler state |
//! | `POST` | `/api/index/clear` | Delete every document and forget the snapshot |
//! | `GET`  | `/health` | Version and backend reachability |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "already_running", "message": "a crawl or index clear is already in progress" } }
//! ```
//!
//! Error codes: `bad_request` (400), `already_running` (409),
//! `store_unavailable` (503), `scheduler_stopped` (503), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! can be served from anywhere.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use deskindex_core::store::{DocumentStore, IndexStats, SearchRequest, SearchResponse};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::{normalize_extension, Config};
use crate::scheduler::{CrawlScheduler, CrawlStatus, RunNowOutcome};
use crate::snapshot_store::SnapshotStore;

const MAX_LIMIT: usize = 100;

/// Everything a handler may touch.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub store: Arc<dyn DocumentStore>,
    pub scheduler: Arc<CrawlScheduler>,
    /// Cleared together with the index; `None` when running without a database.
    pub snapshots: Option<SnapshotStore>,
}

pub fn router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/search", get(handle_search))
        .route("/api/stats", get(handle_stats))
        .route("/api/crawl/start", post(handle_crawl_start))
        .route("/api/crawl/stop", post(handle_crawl_stop))
        .route("/api/crawl/status", get(handle_crawl_status))
        .route("/api/index/clear", post(handle_index_clear))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(ctx)
}

/// Binds `[server].bind` and serves until Ctrl-C, then stops the scheduler.
pub async fn run_server(ctx: AppContext) -> anyhow::Result<()> {
    let bind_addr = ctx.config.server.bind.clone();
    let scheduler = ctx.scheduler.clone();
    let app = router(ctx);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    scheduler.shutdown().await;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn store_unavailable(err: anyhow::Error) -> AppError {
    error!(error = %err, "search backend request failed");
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "store_unavailable",
        message: err.to_string(),
    }
}

fn already_running() -> AppError {
    AppError {
        status: StatusCode::CONFLICT,
        code: "already_running",
        message: "a crawl or index clear is already in progress".to_string(),
    }
}

fn scheduler_stopped() -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "scheduler_stopped",
        message: "the crawl scheduler has shut down".to_string(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    error!(error = %err, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: err.to_string(),
    }
}

#[derive(Serialize)]
struct MessageResponse {
    success: bool,
    message: String,
}

impl MessageResponse {
    fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

// ============ GET /api/search ============

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
    limit: Option<usize>,
    #[serde(default)]
    offset: usize,
    extension: Option<String>,
    filter: Option<String>,
    /// Comma-separated, e.g. `modified_at:desc,size:asc`.
    sort: Option<String>,
}

impl SearchParams {
    fn into_request(self) -> Result<SearchRequest, AppError> {
        let query = self.q.ok_or_else(|| bad_request("q is required"))?;
        let limit = self.limit.unwrap_or(20);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(bad_request(format!("limit must be between 1 and {MAX_LIMIT}")));
        }

        let mut clauses = Vec::new();
        if let Some(ext) = self.extension.as_deref().filter(|e| !e.trim().is_empty()) {
            clauses.push(format!("extension = \"{}\"", normalize_extension(ext)));
        }
        if let Some(filter) = self.filter.filter(|f| !f.trim().is_empty()) {
            clauses.push(filter);
        }

        let mut request = SearchRequest::new(query);
        request.limit = limit;
        request.offset = self.offset;
        request.filter = match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(
                clauses
                    .iter()
                    .map(|c| format!("({c})"))
                    .collect::<Vec<_>>()
                    .join(" AND "),
            ),
        };
        request.sort = self
            .sort
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        Ok(request)
    }
}

#[derive(Serialize)]
struct SearchResult {
    query: String,
    #[serde(flatten)]
    response: SearchResponse,
}

async fn handle_search(
    State(ctx): State<AppContext>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResult>, AppError> {
    let request = params.into_request()?;
    let response = ctx
        .store
        .search(&request)
        .await
        .map_err(store_unavailable)?;
    Ok(Json(SearchResult {
        query: request.query,
        response,
    }))
}

// ============ GET /api/stats ============

async fn handle_stats(State(ctx): State<AppContext>) -> Result<Json<IndexStats>, AppError> {
    let stats = ctx.store.stats().await.map_err(store_unavailable)?;
    Ok(Json(stats))
}

// ============ /api/crawl ============

async fn handle_crawl_start(
    State(ctx): State<AppContext>,
) -> Result<Json<MessageResponse>, AppError> {
    match ctx.scheduler.run_now() {
        RunNowOutcome::Started => Ok(MessageResponse::ok("crawl started")),
        RunNowOutcome::AlreadyRunning => Err(already_running()),
        RunNowOutcome::SchedulerStopped => Err(scheduler_stopped()),
    }
}

async fn handle_crawl_stop(State(ctx): State<AppContext>) -> Json<MessageResponse> {
    let message = if ctx.scheduler.stop_current() {
        "stop requested"
    } else {
        "no crawl is running"
    };
    MessageResponse::ok(message)
}

async fn handle_crawl_status(State(ctx): State<AppContext>) -> Json<CrawlStatus> {
    Json(ctx.scheduler.status())
}

// ============ POST /api/index/clear ============

async fn handle_index_clear(
    State(ctx): State<AppContext>,
) -> Result<Json<MessageResponse>, AppError> {
    let _exclusive = ctx.scheduler.try_exclusive().ok_or_else(already_running)?;
    ctx.store.clear_all().await.map_err(store_unavailable)?;
    if let Some(snapshots) = &ctx.snapshots {
        snapshots.clear().await.map_err(internal)?;
    }
    info!("index cleared");
    Ok(MessageResponse::ok("index cleared"))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    store: bool,
}

async fn handle_health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        store: ctx.store.health_check().await,
    })
}
