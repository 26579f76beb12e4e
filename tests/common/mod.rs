//! In-memory stand-in for an Elasticsearch cluster

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use serde_json::{json, Value};

use people_search::client::{BackendResponse, SearchBackend};
use people_search::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Info,
    Search {
        index: String,
        body: Value,
        track_total_hits: bool,
    },
    DeleteIndex(String),
    CreateIndex(String),
    CreateDocument {
        index: String,
        id: String,
    },
    Refresh(String),
}

/// Documents kept in insertion order per index
#[derive(Default)]
pub struct MockBackend {
    pub indices: Mutex<HashMap<String, Vec<(String, Value)>>>,
    pub calls: Mutex<Vec<Call>>,
    /// Every call fails as if the cluster were unreachable
    pub unreachable: bool,
    /// Creating this document id answers 500
    pub fail_document: Option<String>,
    /// Searches wait this long before answering
    pub search_delay: Option<Duration>,
    /// Cluster info answers with this error status instead of 200
    pub info_status: Option<StatusCode>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn with_index(self, index: &str, docs: Vec<(&str, Value)>) -> Self {
        self.indices.lock().unwrap().insert(
            index.to_string(),
            docs.into_iter()
                .map(|(id, doc)| (id.to_string(), doc))
                .collect(),
        );
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn documents(&self, index: &str) -> Option<Vec<(String, Value)>> {
        self.indices.lock().unwrap().get(index).cloned()
    }

    fn record(&self, call: Call) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.unreachable {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(())
    }

    fn run_search(&self, index: &str, body: &Value) -> BackendResponse {
        let indices = self.indices.lock().unwrap();
        let Some(docs) = indices.get(index) else {
            return error_response(StatusCode::NOT_FOUND, "index_not_found_exception");
        };

        let multi_match = &body["query"]["multi_match"];
        let text = multi_match["query"].as_str().unwrap_or_default().to_lowercase();
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let fields: Vec<(String, f64)> = multi_match["fields"]
            .as_array()
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(Value::as_str)
                    .map(parse_boost)
                    .collect()
            })
            .unwrap_or_default();
        let size = body["size"].as_u64().unwrap_or(10) as usize;

        let mut hits: Vec<(usize, f64, &String, &Value)> = Vec::new();
        if !tokens.is_empty() {
            for (position, (id, doc)) in docs.iter().enumerate() {
                let field_words = |field: &str| -> Vec<String> {
                    doc[field]
                        .as_str()
                        .unwrap_or_default()
                        .to_lowercase()
                        .split_whitespace()
                        .map(str::to_string)
                        .collect()
                };

                let all_match = tokens.iter().all(|token| {
                    fields
                        .iter()
                        .any(|(field, _)| field_words(field.as_str()).iter().any(|w| w == token))
                });
                if !all_match {
                    continue;
                }

                let score: f64 = fields
                    .iter()
                    .filter(|(field, _)| {
                        let words = field_words(field.as_str());
                        tokens.iter().any(|token| words.iter().any(|w| w == token))
                    })
                    .map(|(_, boost)| boost)
                    .sum();
                hits.push((position, score, id, doc));
            }
        }

        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let total = hits.len();

        let hits: Vec<Value> = hits
            .into_iter()
            .take(size)
            .map(|(_, score, id, doc)| {
                json!({ "_index": index, "_id": id, "_score": score, "_source": doc })
            })
            .collect();

        json_response(
            StatusCode::OK,
            json!({
                "took": 1,
                "timed_out": false,
                "hits": {
                    "total": { "value": total, "relation": "eq" },
                    "hits": hits
                }
            }),
        )
    }
}

fn parse_boost(field: &str) -> (String, f64) {
    match field.split_once('^') {
        Some((name, boost)) => (name.to_string(), boost.parse().unwrap_or(1.0)),
        None => (field.to_string(), 1.0),
    }
}

pub fn json_response(status: StatusCode, body: Value) -> BackendResponse {
    BackendResponse::from_bytes(status, body.to_string())
}

pub fn error_response(status: StatusCode, kind: &str) -> BackendResponse {
    json_response(
        status,
        json!({ "error": { "type": kind }, "status": status.as_u16() }),
    )
}

pub fn acknowledged() -> BackendResponse {
    json_response(StatusCode::OK, json!({ "acknowledged": true }))
}

pub const CLUSTER_INFO: &str = r#"{"name":"es01","cluster_name":"docker-cluster","version":{"number":"7.17.0"},"tagline":"You Know, for Search"}"#;

#[async_trait]
impl SearchBackend for MockBackend {
    async fn info(&self) -> Result<BackendResponse> {
        self.record(Call::Info)?;
        match self.info_status {
            Some(status) => Ok(error_response(status, "cluster_block_exception")),
            None => Ok(BackendResponse::from_bytes(StatusCode::OK, CLUSTER_INFO)),
        }
    }

    async fn search(
        &self,
        index: &str,
        body: Bytes,
        track_total_hits: bool,
    ) -> Result<BackendResponse> {
        let body: Value = serde_json::from_slice(&body)?;
        self.record(Call::Search {
            index: index.to_string(),
            body: body.clone(),
            track_total_hits,
        })?;

        if let Some(delay) = self.search_delay {
            tokio::time::sleep(delay).await;
        }

        Ok(self.run_search(index, &body))
    }

    async fn delete_index(&self, index: &str) -> Result<BackendResponse> {
        self.record(Call::DeleteIndex(index.to_string()))?;
        match self.indices.lock().unwrap().remove(index) {
            Some(_) => Ok(acknowledged()),
            None => Ok(error_response(
                StatusCode::NOT_FOUND,
                "index_not_found_exception",
            )),
        }
    }

    async fn create_index(&self, index: &str) -> Result<BackendResponse> {
        self.record(Call::CreateIndex(index.to_string()))?;
        let mut indices = self.indices.lock().unwrap();
        if indices.contains_key(index) {
            return Ok(error_response(
                StatusCode::BAD_REQUEST,
                "resource_already_exists_exception",
            ));
        }
        indices.insert(index.to_string(), Vec::new());
        Ok(acknowledged())
    }

    async fn create_document(
        &self,
        index: &str,
        id: &str,
        body: Bytes,
    ) -> Result<BackendResponse> {
        self.record(Call::CreateDocument {
            index: index.to_string(),
            id: id.to_string(),
        })?;

        if self.fail_document.as_deref() == Some(id) {
            return Ok(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "mapper_parsing_exception",
            ));
        }

        let doc: Value = serde_json::from_slice(&body)?;
        let mut indices = self.indices.lock().unwrap();
        let Some(docs) = indices.get_mut(index) else {
            return Ok(error_response(
                StatusCode::NOT_FOUND,
                "index_not_found_exception",
            ));
        };
        if docs.iter().any(|(existing, _)| existing == id) {
            return Ok(error_response(
                StatusCode::CONFLICT,
                "version_conflict_engine_exception",
            ));
        }
        docs.push((id.to_string(), doc));

        Ok(json_response(
            StatusCode::CREATED,
            json!({ "_index": index, "_id": id, "result": "created" }),
        ))
    }

    async fn refresh(&self, index: &str) -> Result<BackendResponse> {
        self.record(Call::Refresh(index.to_string()))?;
        Ok(json_response(
            StatusCode::OK,
            json!({ "_shards": { "total": 1, "successful": 1, "failed": 0 } }),
        ))
    }
}
