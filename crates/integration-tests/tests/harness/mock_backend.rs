//! Mock Nova backend for integration tests
//!
//! Serves the completion, chat and refresh endpoints with canned behavior

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use tokio_util::sync::CancellationToken;

/// What the generation endpoints answer with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// HTTP 200 JSON body with one choice and usage
    Json,
    /// HTTP 401 with a Nova auth failure code
    Unauthorized,
    /// Two content events, a usage event, then `[DONE]`
    Stream,
    /// One content event, then the connection closes
    StreamWithoutDone,
    /// One content event, then nothing until the client goes away
    StreamForever,
}

/// In-process Nova backend bound to an ephemeral port
pub struct MockBackend {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    behavior: Behavior,
    /// Bearer token the generation endpoints insist on, if any
    required_token: Option<String>,
    request_count: AtomicU32,
    refresh_count: AtomicU32,
    last_body: Mutex<Option<serde_json::Value>>,
    last_headers: Mutex<Option<HeaderMap>>,
}

impl MockBackend {
    /// Start a backend accepting any bearer token
    pub async fn start(behavior: Behavior) -> anyhow::Result<Self> {
        Self::start_inner(behavior, None).await
    }

    /// Start a backend that answers 401 unless the given token is presented
    pub async fn start_requiring(behavior: Behavior, token: &str) -> anyhow::Result<Self> {
        Self::start_inner(behavior, Some(token.to_owned())).await
    }

    async fn start_inner(behavior: Behavior, required_token: Option<String>) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            behavior,
            required_token,
            request_count: AtomicU32::new(0),
            refresh_count: AtomicU32::new(0),
            last_body: Mutex::new(None),
            last_headers: Mutex::new(None),
        });

        let app = Router::new()
            .route("/v1/llm/completions", routing::post(handle_generate))
            .route("/v1/llm/chat-completions", routing::post(handle_generate))
            .route("/v1/llm/agent-completions", routing::post(handle_generate))
            .route("/v1/auth/refresh", routing::post(handle_refresh))
            .route("/v1/auth/refresh-broken", routing::post(handle_broken_refresh))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL the endpoint paths are appended to
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Generation requests received
    pub fn request_count(&self) -> u32 {
        self.state.request_count.load(Ordering::SeqCst)
    }

    /// Refresh exchanges received
    pub fn refresh_count(&self) -> u32 {
        self.state.refresh_count.load(Ordering::SeqCst)
    }

    /// JSON body of the last generation request
    pub fn last_body(&self) -> Option<serde_json::Value> {
        self.state.last_body.lock().unwrap().clone()
    }

    /// Headers of the last generation request
    pub fn last_headers(&self) -> Option<HeaderMap> {
        self.state.last_headers.lock().unwrap().clone()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Current Unix time in seconds
pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap())
        .unwrap()
}

fn sse_event(payload: &str) -> String {
    format!("data: {payload}\n\n")
}

fn content_event(token: &str) -> String {
    sse_event(&serde_json::json!({"choices": [{"index": 0, "delta": {"content": token}}]}).to_string())
}

fn event_stream(body: Body) -> Response {
    ([(CONTENT_TYPE, "text/event-stream")], body).into_response()
}

async fn handle_generate(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    state.request_count.fetch_add(1, Ordering::SeqCst);
    *state.last_body.lock().unwrap() = Some(body);

    let authorized = state.required_token.as_ref().is_none_or(|token| {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == format!("Bearer {token}"))
    });
    *state.last_headers.lock().unwrap() = Some(headers);

    if !authorized || state.behavior == Behavior::Unauthorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"code": 200002, "message": "bad token"})),
        )
            .into_response();
    }

    match state.behavior {
        Behavior::Json | Behavior::Unauthorized => Json(serde_json::json!({
            "choices": [{"text": "hi"}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1}
        }))
        .into_response(),
        Behavior::Stream => {
            let mut body = content_event("Hel");
            body.push_str(&content_event("lo"));
            body.push_str(&sse_event(
                &serde_json::json!({"choices": [], "usage": {"prompt_tokens": 4, "completion_tokens": 2}}).to_string(),
            ));
            body.push_str(&sse_event("[DONE]"));
            event_stream(Body::from(body))
        }
        Behavior::StreamWithoutDone => event_stream(Body::from(content_event("partial"))),
        Behavior::StreamForever => {
            let first = stream::once(async { Ok::<_, Infallible>(Bytes::from(content_event("first"))) });
            event_stream(Body::from_stream(first.chain(stream::pending())))
        }
    }
}

async fn handle_refresh(State(state): State<Arc<MockState>>) -> Response {
    let n = state.refresh_count.fetch_add(1, Ordering::SeqCst) + 1;

    // Widen the window in which concurrent callers could race
    tokio::time::sleep(Duration::from_millis(50)).await;

    Json(serde_json::json!({
        "code": 0,
        "data": {
            "access_token": format!("fresh-{n}"),
            "refresh_token": format!("refresh-{n}"),
            "expires_at": now() + 3600
        }
    }))
    .into_response()
}

async fn handle_broken_refresh(State(state): State<Arc<MockState>>) -> Response {
    state.refresh_count.fetch_add(1, Ordering::SeqCst);
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}
