//! MeilisearchStore against a fake Meilisearch served by axum.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{TimeZone, Utc};
use deskindex::config::StoreConfig;
use deskindex::meili::MeilisearchStore;
use deskindex_core::models::{Document, FileRecord};
use deskindex_core::store::{DocumentStore, SearchRequest};
use serde_json::{json, Value};

#[derive(Clone, Copy)]
enum TaskPlan {
    /// Reports `processing` this many times, then `succeeded`.
    Succeed(u32),
    Fail,
    Never,
}

#[derive(Default)]
struct FakeState {
    index_exists: bool,
    next_uid: u64,
    tasks: HashMap<u64, TaskPlan>,
    auth: Vec<Option<String>>,
    settings: Option<Value>,
    documents: Vec<Value>,
    deleted: Vec<String>,
    last_search: Option<Value>,
}

type Fake = Arc<Mutex<FakeState>>;

fn track(state: &Fake, headers: &HeaderMap) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    state.lock().unwrap().auth.push(auth);
}

fn enqueue(state: &Fake, plan: TaskPlan) -> Json<Value> {
    let mut s = state.lock().unwrap();
    s.next_uid += 1;
    let uid = s.next_uid;
    s.tasks.insert(uid, plan);
    Json(json!({ "taskUid": uid, "status": "enqueued" }))
}

async fn get_index(State(state): State<Fake>, headers: HeaderMap) -> impl IntoResponse {
    track(&state, &headers);
    if state.lock().unwrap().index_exists {
        (StatusCode::OK, Json(json!({ "uid": "files", "primaryKey": "id" })))
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "code": "index_not_found", "message": "Index `files` not found." })),
        )
    }
}

async fn create_index(State(state): State<Fake>, Json(body): Json<Value>) -> Json<Value> {
    assert_eq!(body["primaryKey"], "id");
    state.lock().unwrap().index_exists = true;
    enqueue(&state, TaskPlan::Succeed(1))
}

async fn update_settings(State(state): State<Fake>, Json(body): Json<Value>) -> Json<Value> {
    state.lock().unwrap().settings = Some(body);
    enqueue(&state, TaskPlan::Succeed(0))
}

async fn add_documents(
    State(state): State<Fake>,
    headers: HeaderMap,
    Json(docs): Json<Vec<Value>>,
) -> Json<Value> {
    track(&state, &headers);
    let paths: Vec<String> = docs
        .iter()
        .map(|d| d["path"].as_str().unwrap_or_default().to_string())
        .collect();
    let plan = if paths.iter().any(|p| p.contains("reject")) {
        TaskPlan::Fail
    } else if paths.iter().any(|p| p.contains("stall")) {
        TaskPlan::Never
    } else {
        TaskPlan::Succeed(2)
    };
    state.lock().unwrap().documents.extend(docs);
    enqueue(&state, plan)
}

async fn delete_batch(State(state): State<Fake>, Json(ids): Json<Vec<String>>) -> Json<Value> {
    state.lock().unwrap().deleted.extend(ids);
    enqueue(&state, TaskPlan::Succeed(0))
}

async fn delete_all(State(state): State<Fake>) -> Json<Value> {
    state.lock().unwrap().documents.clear();
    enqueue(&state, TaskPlan::Succeed(0))
}

async fn get_task(State(state): State<Fake>, Path(uid): Path<u64>) -> Json<Value> {
    let mut s = state.lock().unwrap();
    let plan = s.tasks.get(&uid).copied().unwrap_or(TaskPlan::Fail);
    let body = match plan {
        TaskPlan::Succeed(0) => json!({ "uid": uid, "status": "succeeded" }),
        TaskPlan::Succeed(n) => {
            s.tasks.insert(uid, TaskPlan::Succeed(n - 1));
            json!({ "uid": uid, "status": "processing" })
        }
        TaskPlan::Fail => json!({
            "uid": uid,
            "status": "failed",
            "error": { "message": "document rejected", "code": "invalid_document_fields" }
        }),
        TaskPlan::Never => json!({ "uid": uid, "status": "processing" }),
    };
    Json(body)
}

async fn search(State(state): State<Fake>, Json(body): Json<Value>) -> Json<Value> {
    state.lock().unwrap().last_search = Some(body);
    Json(json!({
        "hits": [
            { "id": "abc", "filename": "budget.xlsx", "_formatted": { "content": "<mark>budget</mark>" } }
        ],
        "estimatedTotalHits": 42,
        "processingTimeMs": 7,
        "query": "budget"
    }))
}

async fn stats() -> Json<Value> {
    Json(json!({
        "numberOfDocuments": 12,
        "isIndexing": true,
        "fieldDistribution": { "content": 10, "filename": 12 }
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "available" }))
}

async fn start_fake() -> (String, Fake) {
    let state: Fake = Arc::new(Mutex::new(FakeState::default()));
    let app = Router::new()
        .route("/indexes", post(create_index))
        .route("/indexes/files", get(get_index))
        .route("/indexes/files/settings", patch(update_settings))
        .route(
            "/indexes/files/documents",
            post(add_documents).delete(delete_all),
        )
        .route("/indexes/files/documents/delete-batch", post(delete_batch))
        .route("/indexes/files/search", post(search))
        .route("/indexes/files/stats", get(stats))
        .route("/tasks/{uid}", get(get_task))
        .route("/health", get(health))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), state)
}

fn store_for(host: &str) -> MeilisearchStore {
    MeilisearchStore::new(&StoreConfig {
        host: host.to_string(),
        api_key: Some("master-key".into()),
        flush_timeout_secs: 1,
        locales: vec!["jpn".into()],
        ..Default::default()
    })
    .unwrap()
}

fn doc(path: &str) -> Document {
    let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    Document::from_record(&FileRecord::new(path, 10, t, t), Some("text".into()), t)
}

#[tokio::test]
async fn initialize_creates_index_and_applies_settings() {
    let (host, fake) = start_fake().await;
    let store = store_for(&host);
    store.initialize().await.unwrap();

    let s = fake.lock().unwrap();
    assert!(s.index_exists);
    let settings = s.settings.as_ref().unwrap();
    assert_eq!(
        settings["searchableAttributes"],
        json!(["filename", "content", "path"])
    );
    assert_eq!(
        settings["sortableAttributes"],
        json!(["modified_at", "size", "filename"])
    );
    assert_eq!(settings["localizedAttributes"][0]["locales"], json!(["jpn"]));
    assert_eq!(s.auth[0].as_deref(), Some("Bearer master-key"));
}

#[tokio::test]
async fn initialize_is_idempotent() {
    let (host, fake) = start_fake().await;
    let store = store_for(&host);
    store.initialize().await.unwrap();
    store.initialize().await.unwrap();
    // One creation task, two settings tasks.
    assert_eq!(fake.lock().unwrap().next_uid, 3);
}

#[tokio::test]
async fn add_documents_waits_for_task() {
    let (host, fake) = start_fake().await;
    let store = store_for(&host);
    let indexed = store
        .add_documents(&[doc("/share/a.txt"), doc("/share/b.txt")])
        .await
        .unwrap();
    assert_eq!(indexed, 2);

    let s = fake.lock().unwrap();
    assert_eq!(s.documents.len(), 2);
    assert_eq!(s.documents[0]["path"], "/share/a.txt");
    assert_eq!(s.documents[0]["extension"], ".txt");
    assert_eq!(s.documents[0]["content"], "text");
    assert_eq!(s.documents[0]["id"].as_str().unwrap().len(), 16);
}

#[tokio::test]
async fn failed_task_is_an_error() {
    let (host, _fake) = start_fake().await;
    let store = store_for(&host);
    let err = store
        .add_documents(&[doc("/share/reject.txt")])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("document rejected"), "{err}");
}

#[tokio::test]
async fn stuck_task_times_out() {
    let (host, _fake) = start_fake().await;
    let store = store_for(&host);
    let err = store
        .add_documents(&[doc("/share/stall.txt")])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("did not finish"), "{err}");
}

#[tokio::test]
async fn search_maps_response_and_sends_highlighting() {
    let (host, fake) = start_fake().await;
    let store = store_for(&host);
    let mut request = SearchRequest::new("budget");
    request.filter = Some("extension = \".xlsx\"".into());
    request.sort = vec!["modified_at:desc".into()];
    let response = store.search(&request).await.unwrap();

    assert_eq!(response.total_estimate, 42);
    assert_eq!(response.elapsed_ms, 7);
    assert_eq!(response.hits[0]["filename"], "budget.xlsx");

    let sent = fake.lock().unwrap().last_search.clone().unwrap();
    assert_eq!(sent["q"], "budget");
    assert_eq!(sent["filter"], "extension = \".xlsx\"");
    assert_eq!(sent["sort"], json!(["modified_at:desc"]));
    assert_eq!(sent["highlightPreTag"], "<mark>");
    assert_eq!(sent["attributesToCrop"], json!(["content"]));
}

#[tokio::test]
async fn stats_delete_clear_and_health() {
    let (host, fake) = start_fake().await;
    let store = store_for(&host);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.document_count, 12);
    assert!(stats.is_indexing);
    assert_eq!(stats.field_distribution["filename"], 12);

    assert_eq!(store.delete_documents(&["abc".into()]).await.unwrap(), 1);
    assert_eq!(store.delete_documents(&[]).await.unwrap(), 0);
    assert_eq!(fake.lock().unwrap().deleted, vec!["abc".to_string()]);

    store.add_documents(&[doc("/x.txt")]).await.unwrap();
    assert!(store.clear_all().await.unwrap());
    assert!(fake.lock().unwrap().documents.is_empty());

    assert!(store.health_check().await);
}

#[tokio::test]
async fn unreachable_backend_is_unhealthy() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let store = store_for(&format!("http://127.0.0.1:{port}"));
    assert!(!store.health_check().await);
    assert!(store.stats().await.is_err());
}
