//! Common helpers for integration tests.
//! Some helpers are only used by specific test binaries; allow dead_code to avoid per-binary warnings.
#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use energy::StoreConfig;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("energy=debug".parse().unwrap()))
        .with_test_writer()
        .try_init();
}

/// One HTTP request as seen by the mock server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    /// Lower-case header names.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

type Handler = dyn Fn(&RecordedRequest) -> (u16, String) + Send + Sync;

#[derive(Clone)]
struct MockState {
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// In-process PostgREST stand-in on 127.0.0.1: every `/rest/v1/:table` request is recorded and
/// answered through `handler`.
pub struct MockRest {
    pub url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: tokio::task::JoinHandle<()>,
}

impl MockRest {
    pub async fn spawn(handler: impl Fn(&RecordedRequest) -> (u16, String) + Send + Sync + 'static) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await.context("bind mock server")?;
        let url = format!("http://{}", listener.local_addr()?);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            handler: Arc::new(handler),
            requests: Arc::clone(&requests),
        };
        let app = Router::new()
            .route("/rest/v1/:table", get(on_get).post(on_post).patch(on_patch))
            .with_state(state);
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::warn!(reason = %e, "mock server stopped");
            }
        });
        Ok(Self { url, requests, task })
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(self.url.clone(), "anon-test-key")
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }
}

impl Drop for MockRest {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn on_get(
    State(state): State<MockState>,
    Path(table): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.respond("GET", &table, query, &headers, String::new())
}

async fn on_post(
    State(state): State<MockState>,
    Path(table): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    state.respond("POST", &table, query, &headers, body)
}

async fn on_patch(
    State(state): State<MockState>,
    Path(table): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    state.respond("PATCH", &table, query, &headers, body)
}

impl MockState {
    fn respond(
        &self,
        method: &str,
        table: &str,
        query: HashMap<String, String>,
        headers: &HeaderMap,
        body: String,
    ) -> Response {
        let request = RecordedRequest {
            method: method.to_string(),
            path: format!("/rest/v1/{table}"),
            query,
            headers: headers
                .iter()
                .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
                .collect(),
            body,
        };
        let (status, body) = (self.handler)(&request);
        self.requests.lock().push(request);
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}

/// PostgREST-like emulation of one energy table keyed by `erc20`, for end-to-end store tests.
#[derive(Clone, Default)]
pub struct FakeEnergyTable {
    rows: Arc<Mutex<HashMap<String, Option<u64>>>>,
    /// When set, every GET answers 503.
    pub fail_reads: Arc<Mutex<bool>>,
    /// When set, every PATCH answers 503.
    pub fail_updates: Arc<Mutex<bool>>,
}

impl FakeEnergyTable {
    pub fn seed(&self, wallet: &str, energy: Option<u64>) {
        self.rows.lock().insert(wallet.to_string(), energy);
    }

    pub fn energy(&self, wallet: &str) -> Option<Option<u64>> {
        self.rows.lock().get(wallet).copied()
    }

    pub fn handle(&self, req: &RecordedRequest) -> (u16, String) {
        let wallet = req
            .query_value("erc20")
            .and_then(|v| v.strip_prefix("eq."))
            .map(str::to_string);
        match req.method.as_str() {
            "GET" => {
                if *self.fail_reads.lock() {
                    return (503, json!({"message": "unavailable"}).to_string());
                }
                let rows = self.rows.lock();
                let out: Vec<Value> = wallet
                    .and_then(|w| rows.get(&w).copied())
                    .map(|energy| vec![json!({ "energy": energy })])
                    .unwrap_or_default();
                (200, Value::Array(out).to_string())
            }
            "POST" => {
                let row = req.json();
                let Some(w) = row.get("erc20").and_then(|v| v.as_str()) else {
                    return (400, json!({"message": "missing erc20"}).to_string());
                };
                let mut rows = self.rows.lock();
                if rows.contains_key(w) {
                    return (409, json!({"message": "duplicate key"}).to_string());
                }
                rows.insert(w.to_string(), row.get("energy").and_then(|v| v.as_u64()));
                (201, String::new())
            }
            "PATCH" => {
                if *self.fail_updates.lock() {
                    return (503, json!({"message": "unavailable"}).to_string());
                }
                let energy = req.json().get("energy").and_then(|v| v.as_u64());
                if let Some(w) = wallet {
                    if let Some(slot) = self.rows.lock().get_mut(&w) {
                        *slot = energy;
                    }
                }
                (204, String::new())
            }
            _ => (405, String::new()),
        }
    }
}
