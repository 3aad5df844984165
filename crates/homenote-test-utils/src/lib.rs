//! Testing utilities for the Homenote workspace
//!
//! Shared transport doubles, fixtures, and response builders.

#![allow(missing_docs)]

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use homenote_client::{
    ApiClient, ClientConfig, HttpRequest, HttpResponse, HttpTransport, Method, StreamResponse,
    TransportError,
};
use homenote_session::{ManualClock, MemoryStorage, TokenData, TokenStore};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Fixed "now" used across tests (2023-11-14T22:13:20Z)
pub const NOW: i64 = 1_700_000_000_000;

/// One hour in milliseconds
pub const HOUR_MS: i64 = 60 * 60 * 1000;

/// Base URL used by test clients
pub const TEST_BASE_URL: &str = "https://api.test";

/// Scripted answer to a buffered request
#[derive(Debug, Clone)]
pub struct Reply {
    pub result: Result<HttpResponse, TransportError>,
    pub delay: Duration,
}

impl Reply {
    pub fn ok(response: HttpResponse) -> Self {
        Self {
            result: Ok(response),
            delay: Duration::ZERO,
        }
    }

    pub fn err(error: TransportError) -> Self {
        Self {
            result: Err(error),
            delay: Duration::ZERO,
        }
    }

    /// Answer only after `delay`
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl From<HttpResponse> for Reply {
    fn from(response: HttpResponse) -> Self {
        Self::ok(response)
    }
}

type Handler = dyn Fn(&HttpRequest) -> Reply + Send + Sync;
type StreamHandler = dyn Fn(&HttpRequest) -> Result<StreamResponse, TransportError> + Send + Sync;

/// Transport answering from closures and recording every request
pub struct ScriptedTransport {
    handler: Box<Handler>,
    stream_handler: Box<StreamHandler>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(handler: impl Fn(&HttpRequest) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            stream_handler: Box::new(|_| Err(TransportError::Connect("no stream scripted".to_string()))),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_stream_handler(
        mut self,
        handler: impl Fn(&HttpRequest) -> Result<StreamResponse, TransportError> + Send + Sync + 'static,
    ) -> Self {
        self.stream_handler = Box::new(handler);
        self
    }

    /// Every request seen so far, in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Requests matching method and path
    pub fn matching(&self, method: Method, path: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.path() == path)
            .cloned()
            .collect()
    }

    /// Number of requests matching method and path
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.matching(method, path).len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request.clone());
        let reply = (self.handler)(&request);
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }

    async fn open_stream(&self, request: HttpRequest) -> Result<StreamResponse, TransportError> {
        self.requests.lock().push(request.clone());
        (self.stream_handler)(&request)
    }
}

/// JSON response with content type set
pub fn json_response(status: u16, body: Value) -> HttpResponse {
    HttpResponse::new(status, body.to_string().into_bytes())
        .with_header("Content-Type", "application/json")
}

/// 200 response wrapping `data` in the standard envelope
pub fn envelope(data: Value) -> HttpResponse {
    json_response(200, json!({"code": "SUCCESS", "message": "OK", "data": data}))
}

/// Error response in the `{code, message}` shape
pub fn error_response(status: u16, code: &str, message: &str) -> HttpResponse {
    json_response(status, json!({"code": code, "message": message}))
}

/// Refresh/login grant envelope
pub fn token_grant(access_token: &str, expires_in_secs: u64) -> HttpResponse {
    envelope(json!({"access_token": access_token, "expires_in": expires_in_secs}))
}

/// Event stream that ends after `chunks`
pub fn finite_stream(chunks: Vec<&str>) -> StreamResponse {
    let items: Vec<Result<Vec<u8>, TransportError>> =
        chunks.into_iter().map(|c| Ok(c.as_bytes().to_vec())).collect();
    stream_response(200, stream::iter(items).boxed())
}

/// Event stream that fails after `chunks`
pub fn failing_stream(chunks: Vec<&str>) -> StreamResponse {
    let mut items: Vec<Result<Vec<u8>, TransportError>> =
        chunks.into_iter().map(|c| Ok(c.as_bytes().to_vec())).collect();
    items.push(Err(TransportError::Body("connection reset".to_string())));
    stream_response(200, stream::iter(items).boxed())
}

/// Event stream that stays open after `chunks`
pub fn open_stream(chunks: Vec<&str>) -> StreamResponse {
    let items: Vec<Result<Vec<u8>, TransportError>> =
        chunks.into_iter().map(|c| Ok(c.as_bytes().to_vec())).collect();
    stream_response(200, stream::iter(items).chain(stream::pending()).boxed())
}

/// Non-OK stream response with an empty body
pub fn rejected_stream(status: u16) -> StreamResponse {
    stream_response(status, stream::empty().boxed())
}

fn stream_response(
    status: u16,
    body: futures::stream::BoxStream<'static, Result<Vec<u8>, TransportError>>,
) -> StreamResponse {
    StreamResponse {
        status,
        status_text: String::new(),
        headers: vec![("Content-Type".to_string(), "text/event-stream".to_string())],
        body,
    }
}

/// Token valid for an hour after [`NOW`]
pub fn valid_token(access_token: &str) -> TokenData {
    TokenData::new(access_token, NOW + HOUR_MS)
}

/// Token store on fresh memory storage with a manual clock at [`NOW`]
pub fn session() -> (TokenStore, Arc<MemoryStorage>, Arc<ManualClock>) {
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(ManualClock::new(NOW));
    let store = TokenStore::new(storage.clone(), clock.clone());
    (store, storage, clock)
}

/// Client against [`TEST_BASE_URL`] using `transport`
pub fn client_with(transport: Arc<ScriptedTransport>, tokens: TokenStore) -> ApiClient {
    ApiClient::new(ClientConfig::new(TEST_BASE_URL), transport, tokens)
}

/// Bearer token carried by a request, if any
pub fn bearer_of(request: &HttpRequest) -> Option<&str> {
    request
        .header_value("Authorization")
        .and_then(|v| v.strip_prefix("Bearer "))
}
