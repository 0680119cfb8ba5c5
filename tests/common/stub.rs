use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::{net::TcpListener, task::JoinHandle};

/// In-process imitation of the analytics server's HTTP API, just enough for
/// the harness to probe readiness, run queries, and record what it sent.
pub struct StubServer {
    pub api_url: String,
    pub state: Arc<StubState>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct StubState {
    /// Rows every load answers with.
    rows: Value,
    /// How many load calls still get the "Continue wait" body first.
    continue_waits: AtomicUsize,
    /// When set, load answers with this status and body instead of rows.
    pub error: Mutex<Option<(u16, String)>>,

    pub load_requests: AtomicUsize,
    pub tokens: Mutex<Vec<String>>,
    pub queries: Mutex<Vec<Value>>,
}

impl StubServer {
    pub async fn start(rows: Value) -> Self {
        Self::start_with(rows, 0).await
    }

    pub async fn start_with(rows: Value, continue_waits: usize) -> Self {
        let state = Arc::new(StubState {
            rows,
            continue_waits: AtomicUsize::new(continue_waits),
            ..StubState::default()
        });

        let app = Router::new()
            .route("/cubejs-api/v1/readyz", get(readyz))
            .route("/cubejs-api/v1/load", post(load))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub listener addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve stub api");
        });

        Self {
            api_url: format!("http://{addr}/cubejs-api"),
            state,
            handle,
        }
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn readyz() -> Json<Value> {
    Json(json!({ "health": "HEALTH" }))
}

async fn load(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.load_requests.fetch_add(1, Ordering::SeqCst);

    if let Some(token) = headers.get(AUTHORIZATION) {
        state
            .tokens
            .lock()
            .unwrap()
            .push(token.to_str().unwrap_or_default().to_string());
    }
    state
        .queries
        .lock()
        .unwrap()
        .push(body.get("query").cloned().unwrap_or(Value::Null));

    if let Some((status, body)) = state.error.lock().unwrap().clone() {
        return (
            StatusCode::from_u16(status).expect("stub error status"),
            Json(json!({ "error": body })),
        );
    }

    let pending = state
        .continue_waits
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if pending {
        return (StatusCode::OK, Json(json!({ "error": "Continue wait" })));
    }

    (StatusCode::OK, Json(json!({ "data": state.rows })))
}
