//! Long-lived event-stream connection
//!
//! [`SseConnection::spawn`] starts a tokio task that:
//! - obtains a valid access token before every attempt
//! - opens the stream with `Last-Event-ID` once an id has been seen
//! - feeds body chunks through [`SseFrameParser`] and hands each event to
//!   the callback
//! - waits per [`ReconnectPolicy`] after a drop, refusal or error
//!
//! The task stops when the [`SseHandle`] is closed or dropped, when no
//! token can be obtained, when the policy runs out of attempts, or when
//! the client reports a sign-out or a forced sign-in. A 401 on the stream
//! triggers one refresh; a refresh the backend rejects ends the session.

use crate::parser::{SseEvent, SseFrameParser};
use crate::policy::ReconnectPolicy;
use futures::StreamExt;
use homenote_client::{endpoints, ApiClient, AuthEvent, HttpRequest, Method, TransportError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct SseConfig {
    /// Stream endpoint, relative to the client base URL
    pub endpoint: String,
    pub reconnect: ReconnectPolicy,
}

impl SseConfig {
    /// Default endpoint and policy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With endpoint
    #[inline]
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// With reconnect policy
    #[inline]
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::SSE_CONNECTION.to_string(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Observable connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Obtaining a token or opening the stream
    Connecting,
    /// Stream accepted, reading events
    Open,
    /// Sleeping before the next attempt
    Waiting,
    /// Task finished
    Closed,
}

/// Why the connection task finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseExit {
    /// Handle closed or dropped
    Cancelled,
    /// No valid access token could be obtained
    Unauthenticated,
    /// Reconnect policy gave up
    RetriesExhausted,
    /// The session ended while connected or reconnecting
    SignedOut,
}

type EventCallback = dyn Fn(SseEvent) + Send + Sync;

/// How one attempt ended
#[derive(Debug)]
enum AttemptEnd {
    Rejected(u16),
    Failed(TransportError),
    Ended,
}

impl fmt::Display for AttemptEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(status) => write!(f, "rejected with HTTP {status}"),
            Self::Failed(e) => write!(f, "failed: {e}"),
            Self::Ended => f.write_str("closed by server"),
        }
    }
}

/// Connection task state
pub struct SseConnection {
    client: ApiClient,
    config: SseConfig,
    on_event: Arc<EventCallback>,
    last_id: Arc<Mutex<Option<String>>>,
    state: watch::Sender<ConnectionState>,
}

impl SseConnection {
    /// Start the connection task
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(
        client: ApiClient,
        config: SseConfig,
        on_event: impl Fn(SseEvent) + Send + Sync + 'static,
    ) -> SseHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let last_id = Arc::new(Mutex::new(None));
        // Subscribe before spawning so a logout right after this call is seen
        let auth = client.subscribe_auth_events();

        let connection = Self {
            client,
            config,
            on_event: Arc::new(on_event),
            last_id: last_id.clone(),
            state: state_tx,
        };
        let task = tokio::spawn(connection.run(shutdown_rx, auth));

        SseHandle {
            shutdown: shutdown_tx,
            state: state_rx,
            last_id,
            task: Some(task),
        }
    }

    async fn run(
        self,
        mut shutdown: watch::Receiver<bool>,
        mut auth: broadcast::Receiver<AuthEvent>,
    ) -> SseExit {
        let mut failures: u32 = 0;
        let mut force_refresh = false;

        let exit = loop {
            self.set_state(ConnectionState::Connecting);

            let token = tokio::select! {
                () = cancelled(&mut shutdown) => break SseExit::Cancelled,
                () = signed_out(&mut auth) => break SseExit::SignedOut,
                token = self.obtain_token(force_refresh) => token,
            };
            let Some(token) = token else {
                tracing::warn!("SSE: no valid token, giving up");
                break SseExit::Unauthenticated;
            };

            let (opened, end) = tokio::select! {
                () = cancelled(&mut shutdown) => break SseExit::Cancelled,
                () = signed_out(&mut auth) => break SseExit::SignedOut,
                outcome = self.attempt(&token) => outcome,
            };

            if opened {
                failures = 0;
            }
            failures = failures.saturating_add(1);
            force_refresh = matches!(end, AttemptEnd::Rejected(401));

            let Some(delay) = self.config.reconnect.delay_for(failures) else {
                tracing::warn!("SSE: connection {}, no attempts left", end);
                break SseExit::RetriesExhausted;
            };
            tracing::warn!("SSE: connection {}, reconnecting in {:?}", end, delay);

            self.set_state(ConnectionState::Waiting);
            tokio::select! {
                () = cancelled(&mut shutdown) => break SseExit::Cancelled,
                () = signed_out(&mut auth) => break SseExit::SignedOut,
                () = tokio::time::sleep(delay) => {}
            }
        };

        tracing::info!("SSE: connection task finished ({:?})", exit);
        self.set_state(ConnectionState::Closed);
        exit
    }

    async fn obtain_token(&self, force_refresh: bool) -> Option<String> {
        if !force_refresh {
            return self.client.ensure_valid_token().await;
        }
        // A rejected refresh clears the session and emits SignInRequired
        match self.client.force_refresh().await {
            Ok(token) => Some(token.access_token),
            Err(e) => {
                tracing::debug!("SSE: refresh after 401 failed: {}", e);
                None
            }
        }
    }

    /// One connection attempt; `true` when the stream was accepted
    async fn attempt(&self, token: &str) -> (bool, AttemptEnd) {
        let request = self.build_request(token);
        tracing::debug!("SSE: GET {}", request.url);

        let response = match self.client.transport().open_stream(request).await {
            Ok(response) => response,
            Err(e) => return (false, AttemptEnd::Failed(e)),
        };
        if !response.is_success() {
            return (false, AttemptEnd::Rejected(response.status));
        }

        tracing::info!("SSE: connected");
        self.set_state(ConnectionState::Open);

        let mut parser = SseFrameParser::resuming(self.last_id.lock().clone());
        let mut body = response.body;
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    let events = parser.push(&bytes);
                    *self.last_id.lock() = parser.last_event_id().map(str::to_string);
                    for event in events {
                        self.dispatch(event);
                    }
                }
                Err(e) => return (true, AttemptEnd::Failed(e)),
            }
        }

        (true, AttemptEnd::Ended)
    }

    fn build_request(&self, token: &str) -> HttpRequest {
        let url = self.client.config().url(&self.config.endpoint);
        let mut request = HttpRequest::new(Method::Get, url)
            .header("Authorization", format!("Bearer {token}"))
            .header("Accept", "text/event-stream")
            .header("Cache-Control", "no-cache");

        if let Some(id) = self.last_id.lock().clone() {
            request = request.header("Last-Event-ID", id);
        }
        request
    }

    fn dispatch(&self, event: SseEvent) {
        tracing::debug!("SSE: event {}", event.name);
        (self.on_event)(event);
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

impl fmt::Debug for SseConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseConnection")
            .field("config", &self.config)
            .field("last_id", &*self.last_id.lock())
            .finish_non_exhaustive()
    }
}

/// Resolves once shutdown is requested or the handle is gone
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Resolves once the client signs out or requires a new sign-in
async fn signed_out(auth: &mut broadcast::Receiver<AuthEvent>) {
    loop {
        match auth.recv().await {
            Ok(AuthEvent::SignedOut | AuthEvent::SignInRequired { .. }) => return,
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!("SSE: skipped {} auth events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => std::future::pending().await,
        }
    }
}

/// Owner of a running connection task
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct SseHandle {
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<ConnectionState>,
    last_id: Arc<Mutex<Option<String>>>,
    task: Option<JoinHandle<SseExit>>,
}

impl SseHandle {
    /// Current connection state
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver of state transitions
    #[inline]
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Most recent event id seen on the stream
    #[inline]
    #[must_use]
    pub fn last_event_id(&self) -> Option<String> {
        self.last_id.lock().clone()
    }

    /// Whether the task has finished
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop the task and wait for it
    pub async fn close(mut self) -> SseExit {
        self.shutdown.send_replace(true);
        self.wait().await
    }

    /// Wait for the task to finish on its own
    pub async fn join(mut self) -> SseExit {
        self.wait().await
    }

    async fn wait(&mut self) -> SseExit {
        match self.task.take() {
            Some(task) => task.await.unwrap_or_else(|e| {
                tracing::error!("SSE: connection task failed: {}", e);
                SseExit::Cancelled
            }),
            None => SseExit::Cancelled,
        }
    }
}

impl Drop for SseHandle {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn config_defaults() {
        let config = SseConfig::new();
        assert_eq!(config.endpoint, "/v2/sse/connection");
        assert_eq!(config.reconnect.delay_for(1), Some(Duration::from_secs(3)));
    }

    #[test]
    fn attempt_end_messages() {
        assert_eq!(AttemptEnd::Rejected(503).to_string(), "rejected with HTTP 503");
        assert_eq!(AttemptEnd::Ended.to_string(), "closed by server");
    }

    #[tokio::test]
    async fn cancelled_resolves_when_sender_dropped() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        cancelled(&mut rx).await;
    }

    #[tokio::test]
    async fn cancelled_resolves_on_signal() {
        let (tx, mut rx) = watch::channel(false);
        let waiter = tokio::spawn(async move { cancelled(&mut rx).await });
        tx.send_replace(true);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn signed_out_skips_other_auth_events() {
        let (tx, mut rx) = broadcast::channel(4);
        tx.send(AuthEvent::Refreshed).unwrap();
        tx.send(AuthEvent::SignedOut).unwrap();
        signed_out(&mut rx).await;
        assert!(rx.try_recv().is_err());
    }
}
