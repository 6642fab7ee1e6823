//! Scripted text-to-audio provider for integration tests
//!
//! Replies are chosen by the bearer token of each request, so a credential
//! pool can be driven through any sequence of failures. Every generation
//! call and every result download is recorded in arrival order.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Router, routing};
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

/// One canned reply
#[derive(Debug, Clone)]
pub struct Reply {
    status: StatusCode,
    content_type: Option<&'static str>,
    body: Vec<u8>,
    delay: Option<Duration>,
    hang_up: bool,
}

impl Reply {
    /// 200 with audio bytes
    pub fn audio(content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: Some(content_type),
            body,
            delay: None,
            hang_up: false,
        }
    }

    /// Error status with a plain-text body
    pub fn status(status: u16, text: &str) -> Self {
        Self {
            status: StatusCode::from_u16(status).expect("valid status"),
            content_type: Some("text/plain"),
            body: text.as_bytes().to_vec(),
            delay: None,
            hang_up: false,
        }
    }

    /// 200 with a JSON body; `{base}` inside strings becomes the mock's URL
    pub fn json(value: &serde_json::Value) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: Some("application/json"),
            body: serde_json::to_vec(value).expect("serializable json"),
            delay: None,
            hang_up: false,
        }
    }

    /// Start a 200 reply, then drop the connection mid-body
    pub fn hang_up() -> Self {
        Self {
            hang_up: true,
            ..Self::audio("audio/wav", Vec::new())
        }
    }

    /// Sleep before replying
    #[must_use]
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Replies keyed by bearer token, plus downloadable files
pub struct Script {
    per_key: HashMap<String, Reply>,
    default: Reply,
    files: HashMap<String, Reply>,
}

impl Script {
    /// Every request gets `default` unless its key has its own reply
    pub fn new(default: Reply) -> Self {
        Self {
            per_key: HashMap::new(),
            default,
            files: HashMap::new(),
        }
    }

    #[must_use]
    pub fn for_key(mut self, key: &str, reply: Reply) -> Self {
        self.per_key.insert(key.to_owned(), reply);
        self
    }

    /// Serve `reply` at `GET /files/<name>`
    #[must_use]
    pub fn file(mut self, name: &str, reply: Reply) -> Self {
        self.files.insert(name.to_owned(), reply);
        self
    }
}

/// A generation call as the provider saw it
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Bearer token, if an `Authorization` header was sent
    pub key: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RecordedCall {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("JSON request body")
    }
}

struct MockState {
    base_url: String,
    script: Script,
    calls: Mutex<Vec<RecordedCall>>,
    /// `Authorization` header of each download, `None` when absent
    downloads: Mutex<Vec<Option<String>>>,
}

/// Mock provider listening on a random local port
pub struct MockProvider {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

impl MockProvider {
    pub async fn start(script: Script) -> anyhow::Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let state = Arc::new(MockState {
            base_url: format!("http://{addr}"),
            script,
            calls: Mutex::new(Vec::new()),
            downloads: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/generate", routing::post(handle_generate))
            .route("/files/{name}", routing::get(handle_file))
            .with_state(Arc::clone(&state));

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

    /// Endpoint to configure as a model's `endpoint`
    pub fn endpoint(&self) -> String {
        format!("http://{}/generate", self.addr)
    }

    /// Generation calls in arrival order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().expect("calls lock").clone()
    }

    /// Bearer tokens of the generation calls, in order
    pub fn keys(&self) -> Vec<Option<String>> {
        self.calls().into_iter().map(|call| call.key).collect()
    }

    pub fn call_count(&self) -> usize {
        self.state.calls.lock().expect("calls lock").len()
    }

    /// `Authorization` headers seen on result downloads
    pub fn downloads(&self) -> Vec<Option<String>> {
        self.state.downloads.lock().expect("downloads lock").clone()
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_generate(State(state): State<Arc<MockState>>, headers: HeaderMap, body: Bytes) -> Response {
    let key = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned);

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    state.calls.lock().expect("calls lock").push(RecordedCall {
        key: key.clone(),
        content_type,
        body: body.to_vec(),
    });

    let reply = key
        .as_deref()
        .and_then(|key| state.script.per_key.get(key))
        .unwrap_or(&state.script.default)
        .clone();

    respond(&state, reply).await
}

async fn handle_file(State(state): State<Arc<MockState>>, Path(name): Path<String>, headers: HeaderMap) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    state.downloads.lock().expect("downloads lock").push(authorization);

    match state.script.files.get(&name).cloned() {
        Some(reply) => respond(&state, reply).await,
        None => (StatusCode::NOT_FOUND, "no such file").into_response(),
    }
}

async fn respond(state: &MockState, reply: Reply) -> Response {
    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }

    if reply.hang_up {
        return (reply.status, Body::from_stream(ReaderStream::new(HangUp))).into_response();
    }

    let body = if reply.content_type == Some("application/json") {
        String::from_utf8_lossy(&reply.body)
            .replace("{base}", &state.base_url)
            .into_bytes()
    } else {
        reply.body
    };

    let mut response = (reply.status, body).into_response();
    if let Some(content_type) = reply.content_type {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, header::HeaderValue::from_static(content_type));
    }
    response
}

/// Reader whose first read fails, aborting a streamed body
struct HangUp;

impl AsyncRead for HangUp {
    fn poll_read(self: Pin<&mut Self>, _: &mut Context<'_>, _: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection dropped")))
    }
}
