//! In-memory [`DocumentStore`] for tests and local runs without a backend.
//!
//! Documents live in a `HashMap` behind `std::sync::RwLock`. Search is a
//! case-insensitive substring match of every query term against filename,
//! content and path. Filters support `field = value` clauses joined with
//! `AND`; sort supports `modified_at`, `size` and `filename`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::Document;

use super::{DocumentStore, IndexStats, SearchRequest, SearchResponse};

/// In-memory store keyed by document id.
pub struct InMemoryStore {
    docs: RwLock<HashMap<String, Document>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, id: &str) -> Option<Document> {
        self.read().get(id).cloned()
    }

    /// All stored documents ordered by path.
    pub fn documents(&self) -> Vec<Document> {
        let mut docs: Vec<Document> = self.read().values().cloned().collect();
        docs.sort_by(|a, b| a.path.cmp(&b.path));
        docs
    }

    // A panicking writer cannot leave a half-inserted document behind, so a
    // poisoned lock is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Document>> {
        self.docs.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Document>> {
        self.docs.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

struct Clause {
    field: String,
    value: String,
}

const FILTERABLE: [&str; 7] = [
    "id",
    "path",
    "filename",
    "extension",
    "size",
    "modified_at",
    "created_at",
];

fn parse_filter(expr: &str) -> Result<Vec<Clause>> {
    let mut clauses = Vec::new();
    for part in expr.split(" AND ") {
        let part = part
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')')
            .trim();
        if part.is_empty() {
            continue;
        }
        let Some((field, value)) = part.split_once('=') else {
            bail!("unsupported filter clause: {part}");
        };
        let field = field.trim();
        if !FILTERABLE.contains(&field) {
            bail!("attribute `{field}` is not filterable");
        }
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        clauses.push(Clause {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(clauses)
}

fn field_value(doc: &Document, field: &str) -> Result<String> {
    Ok(match field {
        "id" => doc.id.clone(),
        "path" => doc.path.clone(),
        "filename" => doc.filename.clone(),
        "extension" => doc.extension.clone(),
        "size" => doc.size.to_string(),
        "modified_at" => doc.modified_at.clone(),
        "created_at" => doc.created_at.clone(),
        other => bail!("attribute `{other}` is not filterable"),
    })
}

const SORTABLE: [&str; 3] = ["modified_at", "size", "filename"];

fn compare_by(a: &Document, b: &Document, field: &str) -> Ordering {
    match field {
        "modified_at" => a.modified_at.cmp(&b.modified_at),
        "size" => a.size.cmp(&b.size),
        "filename" => a.filename.cmp(&b.filename),
        _ => Ordering::Equal,
    }
}

fn matches_terms(doc: &Document, terms: &[String]) -> bool {
    if terms.is_empty() {
        return true;
    }
    let haystack = format!("{}\n{}\n{}", doc.filename, doc.content, doc.path).to_lowercase();
    terms.iter().all(|t| haystack.contains(t.as_str()))
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn add_documents(&self, docs: &[Document]) -> Result<usize> {
        let mut map = self.write();
        for doc in docs {
            map.insert(doc.id.clone(), doc.clone());
        }
        Ok(docs.len())
    }

    async fn delete_documents(&self, ids: &[String]) -> Result<usize> {
        let mut map = self.write();
        for id in ids {
            map.remove(id);
        }
        Ok(ids.len())
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let started = Instant::now();
        let terms: Vec<String> = request
            .query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        let clauses = match &request.filter {
            Some(expr) => parse_filter(expr)?,
            None => Vec::new(),
        };
        let mut sort = Vec::new();
        for rule in &request.sort {
            let (field, dir) = rule.split_once(':').unwrap_or((rule.as_str(), "asc"));
            let descending = match dir {
                "asc" => false,
                "desc" => true,
                other => bail!("invalid sort direction `{other}`"),
            };
            if !SORTABLE.contains(&field) {
                bail!("attribute `{field}` is not sortable");
            }
            sort.push((field.to_string(), descending));
        }

        let mut matched = Vec::new();
        for doc in self.read().values() {
            if !matches_terms(doc, &terms) {
                continue;
            }
            let mut keep = true;
            for clause in &clauses {
                if field_value(doc, &clause.field)? != clause.value {
                    keep = false;
                    break;
                }
            }
            if keep {
                matched.push(doc.clone());
            }
        }

        matched.sort_by(|a, b| {
            for (field, descending) in &sort {
                let ord = compare_by(a, b, field);
                let ord = if *descending { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            a.path.cmp(&b.path)
        });

        let total = matched.len() as u64;
        let hits = matched
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SearchResponse {
            hits,
            total_estimate: total,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn stats(&self) -> Result<IndexStats> {
        let map = self.read();
        let count = map.len() as u64;
        let mut field_distribution = BTreeMap::new();
        if count > 0 {
            for field in [
                "id",
                "path",
                "filename",
                "extension",
                "size",
                "modified_at",
                "created_at",
                "content",
                "indexed_at",
            ] {
                field_distribution.insert(field.to_string(), count);
            }
        }
        Ok(IndexStats {
            document_count: count,
            is_indexing: false,
            field_distribution,
        })
    }

    async fn clear_all(&self) -> Result<bool> {
        self.write().clear();
        Ok(true)
    }

    async fn health_check(&self) -> bool {
        true
    }
}
