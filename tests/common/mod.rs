//! Shared helpers: an in-memory `ReportStore` and router plumbing.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use moph_report_relay::db_storage::{ReportBatch, ReportStore, RowOutcome};
use moph_report_relay::errors::AppError;
use moph_report_relay::handlers::{self, AppState, FETCH_AND_SAVE_PATH};
use moph_report_relay::models::TargetRow;
use moph_report_relay::relay::ReportRelay;
use moph_report_relay::report_client::ReportApiClient;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

#[derive(Debug, Default)]
pub struct StoreLog {
    pub committed: Vec<Value>,
    pub begins: usize,
    pub insert_attempts: usize,
    pub commits: usize,
    pub rollbacks: usize,
}

/// Report store that keeps committed rows in memory.
///
/// Rows whose `id` cannot be read as an integer are refused, the way an
/// integer column would refuse them.
pub struct MemoryStore {
    log: Arc<Mutex<StoreLog>>,
    checked_out: Arc<AtomicUsize>,
    max_connections: usize,
    fail_commit: bool,
    fail_insert_at: Option<usize>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            log: Arc::new(Mutex::new(StoreLog::default())),
            checked_out: Arc::new(AtomicUsize::new(0)),
            max_connections: 10,
            fail_commit: false,
            fail_insert_at: None,
        }
    }
}

impl MemoryStore {
    pub fn with_max_connections(max_connections: usize) -> Self {
        Self {
            max_connections,
            ..Self::default()
        }
    }

    pub fn failing_commit() -> Self {
        Self {
            fail_commit: true,
            ..Self::default()
        }
    }

    /// The `n`th insert of each batch (1-based) fails as if its savepoint
    /// could not be created, which breaks the whole transaction.
    pub fn failing_insert_at(n: usize) -> Self {
        Self {
            fail_insert_at: Some(n),
            ..Self::default()
        }
    }

    pub fn committed(&self) -> Vec<Value> {
        self.log.lock().unwrap().committed.clone()
    }

    pub fn begins(&self) -> usize {
        self.log.lock().unwrap().begins
    }

    pub fn insert_attempts(&self) -> usize {
        self.log.lock().unwrap().insert_attempts
    }

    pub fn commits(&self) -> usize {
        self.log.lock().unwrap().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.log.lock().unwrap().rollbacks
    }

    /// Connections currently checked out of the fake pool.
    pub fn checked_out(&self) -> usize {
        self.checked_out.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn ReportBatch>, AppError> {
        let previous = self.checked_out.fetch_add(1, Ordering::SeqCst);
        if previous >= self.max_connections {
            self.checked_out.fetch_sub(1, Ordering::SeqCst);
            return Err(AppError::PoolExhausted(
                "pool timed out while waiting for an open connection".to_string(),
            ));
        }
        self.log.lock().unwrap().begins += 1;

        Ok(Box::new(MemoryBatch {
            log: self.log.clone(),
            checked_out: self.checked_out.clone(),
            pending: Vec::new(),
            attempts: 0,
            closed: false,
            fail_commit: self.fail_commit,
            fail_insert_at: self.fail_insert_at,
        }))
    }
}

struct MemoryBatch {
    log: Arc<Mutex<StoreLog>>,
    checked_out: Arc<AtomicUsize>,
    pending: Vec<Value>,
    attempts: usize,
    closed: bool,
    fail_commit: bool,
    fail_insert_at: Option<usize>,
}

fn integer_like(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        Value::String(s) => s.trim().parse::<i64>().is_ok(),
        _ => false,
    }
}

#[async_trait]
impl ReportBatch for MemoryBatch {
    async fn insert_row(&mut self, row: &TargetRow) -> Result<RowOutcome, AppError> {
        self.log.lock().unwrap().insert_attempts += 1;
        self.attempts += 1;
        if self.fail_insert_at == Some(self.attempts) {
            return Err(AppError::Internal(
                "Failed to create row savepoint: connection closed".to_string(),
            ));
        }
        if !integer_like(&row.id) {
            return Ok(RowOutcome::Rejected(format!(
                "invalid input syntax for type integer: {}",
                row.id
            )));
        }
        self.pending.push(row.to_json());
        Ok(RowOutcome::Inserted)
    }

    async fn commit(&mut self) -> Result<(), AppError> {
        self.closed = true;
        if self.fail_commit {
            return Err(AppError::Internal("connection reset during COMMIT".to_string()));
        }
        let mut log = self.log.lock().unwrap();
        log.commits += 1;
        log.committed.append(&mut self.pending);
        Ok(())
    }

    /// Every call is counted, including ones after the batch has ended.
    async fn rollback(&mut self) -> Result<bool, AppError> {
        self.pending.clear();
        self.log.lock().unwrap().rollbacks += 1;
        let was_open = !self.closed;
        self.closed = true;
        Ok(was_open)
    }
}

impl Drop for MemoryBatch {
    fn drop(&mut self) {
        self.checked_out.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn relay_app(api_base_url: &str, store: Arc<MemoryStore>) -> Router {
    let client = ReportApiClient::new(api_base_url).unwrap();
    handlers::router(Arc::new(AppState {
        relay: ReportRelay::new(client, store),
    }))
}

/// Sends a JSON body to the report endpoint and returns status and text.
pub async fn post_report(app: Router, body: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri(FETCH_AND_SAVE_PATH)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}
