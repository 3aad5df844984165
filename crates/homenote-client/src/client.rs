//! Authenticated API client
//!
//! A single logical request moves through:
//!
//! ```text
//! Init -> Sent -> Ok
//!              -> NeedsRefresh -> Refreshing -> RetrySent -> Ok | Fatal
//! ```
//!
//! Fatal outcomes clear the token store, broadcast
//! [`AuthEvent::SignInRequired`] and return [`ClientError::SessionExpired`].
//! The client never navigates; the UI layer decides what sign-in means.

use crate::config::ClientConfig;
use crate::endpoints;
use crate::error::{ClientError, FatalAuthReason, TransportError};
use crate::refresh::{RefreshFailure, RefreshResult, SingleFlight};
use crate::response::{api_error_from_response, decode_body, error_code, ApiEnvelope};
use crate::reqwest_transport::ReqwestTransport;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method};
use futures::FutureExt;
use homenote_session::{TokenData, TokenStore};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Session lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// Login stored a new token
    SignedIn,
    /// Refresh stored a new token
    Refreshed,
    /// User logged out
    SignedOut,
    /// Session ended by the backend; route to sign-in
    SignInRequired { reason: FatalAuthReason },
}

/// Per-request options
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    /// Attach the bearer token and refresh on 401
    pub requires_auth: bool,
    /// Treat 401 as a plain error
    pub skip_refresh: bool,
}

impl RequestOptions {
    /// Options for `method` with auth enabled
    #[inline]
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self {
            method,
            body: None,
            headers: Vec::new(),
            query: Vec::new(),
            requires_auth: true,
            skip_refresh: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn get() -> Self {
        Self::new(Method::Get)
    }

    #[inline]
    #[must_use]
    pub fn post() -> Self {
        Self::new(Method::Post)
    }

    #[inline]
    #[must_use]
    pub fn put() -> Self {
        Self::new(Method::Put)
    }

    #[inline]
    #[must_use]
    pub fn patch() -> Self {
        Self::new(Method::Patch)
    }

    #[inline]
    #[must_use]
    pub fn delete() -> Self {
        Self::new(Method::Delete)
    }

    /// With a JSON body
    #[inline]
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// With a serializable JSON body
    ///
    /// # Errors
    /// - `ClientError::InvalidRequest` if `body` cannot be serialized
    pub fn with_json<B: Serialize + ?Sized>(self, body: &B) -> Result<Self, ClientError> {
        let value =
            serde_json::to_value(body).map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        Ok(self.with_body(value))
    }

    /// With an extra header
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// With a query parameter
    #[inline]
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Without bearer token or refresh
    #[inline]
    #[must_use]
    pub fn public(mut self) -> Self {
        self.requires_auth = false;
        self
    }

    /// Keep the token but never refresh
    #[inline]
    #[must_use]
    pub fn skip_refresh(mut self) -> Self {
        self.skip_refresh = true;
        self
    }
}

/// Token grant returned by login and refresh
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenGrant {
    pub(crate) access_token: String,
    #[serde(default)]
    pub(crate) expires_in: Option<u64>,
    #[serde(default)]
    pub(crate) expires_at: Option<i64>,
}

impl TokenGrant {
    pub(crate) fn into_token(self, now_ms: i64) -> Option<TokenData> {
        match (self.expires_at, self.expires_in) {
            (Some(at), _) => Some(TokenData::new(self.access_token, at)),
            (None, Some(secs)) => Some(TokenData::from_expires_in(self.access_token, secs, now_ms)),
            (None, None) => None,
        }
    }
}

pub(crate) struct ClientInner {
    pub(crate) config: ClientConfig,
    pub(crate) transport: Arc<dyn HttpTransport>,
    pub(crate) tokens: TokenStore,
    pub(crate) refresh: SingleFlight,
    pub(crate) events: broadcast::Sender<AuthEvent>,
}

/// Authenticated REST client
///
/// Cheap to clone; clones share the token store, refresh state and event
/// channel.
#[derive(Clone)]
pub struct ApiClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl ApiClient {
    /// Create client over an arbitrary transport
    #[must_use]
    pub fn new(config: ClientConfig, transport: Arc<dyn HttpTransport>, tokens: TokenStore) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(ClientInner {
                refresh: SingleFlight::new(config.refresh_grace),
                config,
                transport,
                tokens,
                events,
            }),
        }
    }

    /// Create client backed by reqwest
    ///
    /// # Errors
    /// - `TransportError` if the HTTP client cannot be built
    pub fn with_reqwest(config: ClientConfig, tokens: TokenStore) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::new(config, Arc::new(transport), tokens))
    }

    /// Client configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Underlying transport
    #[inline]
    #[must_use]
    pub fn transport(&self) -> Arc<dyn HttpTransport> {
        self.inner.transport.clone()
    }

    /// Token store
    #[inline]
    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    /// Subscribe to session lifecycle events
    #[inline]
    #[must_use]
    pub fn subscribe_auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }

    /// Whether a non-expired token is stored
    #[inline]
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.tokens.get().is_some()
    }

    /// Number of refresh calls started by this client
    #[inline]
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.inner.refresh.flights_started()
    }

    /// Issue a request and decode the body as `T`
    ///
    /// # Errors
    /// - `ClientError::Api` for non-2xx responses
    /// - `ClientError::Network` when no response arrives
    /// - `ClientError::SessionExpired` when auth cannot be recovered
    /// - `ClientError::Decode` when the body does not match `T`
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        let response = self.execute(endpoint, &options).await?;
        decode_body(&response)
    }

    /// Issue a request and unwrap the `data` field of the envelope
    ///
    /// # Errors
    /// Same as [`ApiClient::request`], plus `ClientError::Decode` when
    /// `data` is missing.
    pub async fn request_data<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        let envelope: ApiEnvelope<T> = self.request(endpoint, options).await?;
        envelope
            .data
            .ok_or_else(|| ClientError::Decode(format!("response from {endpoint} has no data")))
    }

    /// Issue a request and discard the body
    ///
    /// # Errors
    /// Same as [`ApiClient::request`], minus decoding.
    pub async fn request_ok(&self, endpoint: &str, options: RequestOptions) -> Result<(), ClientError> {
        self.execute(endpoint, &options).await.map(|_| ())
    }

    /// `GET` and unwrap envelope data
    pub async fn get_data<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ClientError> {
        self.request_data(endpoint, RequestOptions::get()).await
    }

    /// `POST` a JSON body and unwrap envelope data
    pub async fn post_data<B, T>(&self, endpoint: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request_data(endpoint, RequestOptions::post().with_json(body)?)
            .await
    }

    /// `DELETE` and discard the body
    pub async fn delete(&self, endpoint: &str) -> Result<(), ClientError> {
        self.request_ok(endpoint, RequestOptions::delete()).await
    }

    /// Refresh the access token, sharing any in-flight refresh
    ///
    /// # Errors
    /// - `RefreshFailure` if the backend refuses or cannot be reached
    pub async fn refresh(&self) -> RefreshResult {
        let inner = self.inner.clone();
        self.inner
            .refresh
            .run(move || refresh_call(inner).boxed())
            .await
    }

    /// Refresh after the backend refused the current token
    ///
    /// Unlike [`ApiClient::refresh`], a failure is fatal: the token store
    /// is cleared and [`AuthEvent::SignInRequired`] is broadcast.
    ///
    /// # Errors
    /// - `ClientError::SessionExpired` if no new token was issued
    pub async fn force_refresh(&self) -> Result<TokenData, ClientError> {
        self.refresh()
            .await
            .map_err(|e| self.end_session(e.fatal_reason()))
    }

    /// Non-expired access token, refreshing if necessary
    ///
    /// Returns `None` when no valid token can be obtained.
    pub async fn ensure_valid_token(&self) -> Option<String> {
        if let Some(token) = self.inner.tokens.get() {
            return Some(token.access_token);
        }

        match self.refresh().await {
            Ok(token) => Some(token.access_token),
            Err(e) => {
                tracing::debug!("No valid token obtainable: {}", e);
                None
            }
        }
    }

    /// Absolute URL for `endpoint` with query parameters
    ///
    /// # Errors
    /// - `ClientError::InvalidRequest` if the URL cannot be parsed
    pub fn url_with_query(&self, endpoint: &str, query: &[(String, String)]) -> Result<String, ClientError> {
        let url = self.inner.config.url(endpoint);
        if query.is_empty() {
            return Ok(url);
        }
        reqwest::Url::parse_with_params(&url, query)
            .map(String::from)
            .map_err(|e| ClientError::InvalidRequest(format!("{url}: {e}")))
    }

    pub(crate) fn emit(&self, event: AuthEvent) {
        // No receivers is fine
        let _ = self.inner.events.send(event);
    }

    async fn execute(&self, endpoint: &str, options: &RequestOptions) -> Result<HttpResponse, ClientError> {
        let token = if options.requires_auth {
            self.inner.tokens.get()
        } else {
            None
        };

        let response = self.send_once(endpoint, options, token.as_ref()).await?;

        if response.status != 401 || !options.requires_auth || options.skip_refresh {
            return finish(response);
        }

        if let Some(reason) = error_code(&response).as_deref().and_then(FatalAuthReason::from_code) {
            return Err(self.end_session(reason));
        }

        // Another caller may already have refreshed
        let sent = token.as_ref().map(|t| t.access_token.as_str());
        let fresh = match self.inner.tokens.get() {
            Some(current) if Some(current.access_token.as_str()) != sent => current,
            _ => match self.refresh().await {
                Ok(token) => token,
                Err(e) => return Err(self.end_session(e.fatal_reason())),
            },
        };

        let retry = self.send_once(endpoint, options, Some(&fresh)).await?;
        if retry.status == 401 {
            return Err(self.end_session(FatalAuthReason::RetryUnauthorized));
        }

        finish(retry)
    }

    async fn send_once(
        &self,
        endpoint: &str,
        options: &RequestOptions,
        token: Option<&TokenData>,
    ) -> Result<HttpResponse, ClientError> {
        let request = self.build_request(endpoint, options, token)?;
        tracing::debug!("{} {}", request.method, request.url);

        let response = self.inner.transport.send(request).await?;
        tracing::debug!("{} {} -> {}", options.method, endpoint, response.status);
        Ok(response)
    }

    fn build_request(
        &self,
        endpoint: &str,
        options: &RequestOptions,
        token: Option<&TokenData>,
    ) -> Result<HttpRequest, ClientError> {
        let url = self.url_with_query(endpoint, &options.query)?;
        let mut request = HttpRequest::new(options.method, url).header("Accept", "application/json");

        if let Some(token) = token {
            request = request.header("Authorization", token.bearer());
        }
        for (name, value) in &options.headers {
            request = request.header(name.clone(), value.clone());
        }
        if let Some(body) = &options.body {
            let bytes =
                serde_json::to_vec(body).map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
            request = request.header("Content-Type", "application/json").body(bytes);
        }

        Ok(request)
    }

    fn end_session(&self, reason: FatalAuthReason) -> ClientError {
        tracing::error!("Ending session: {}", reason);
        self.inner.tokens.remove();
        self.emit(AuthEvent::SignInRequired {
            reason: reason.clone(),
        });
        ClientError::SessionExpired { reason }
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.inner.config)
            .field("refresh", &self.inner.refresh)
            .finish_non_exhaustive()
    }
}

fn finish(response: HttpResponse) -> Result<HttpResponse, ClientError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ClientError::Api(api_error_from_response(&response)))
    }
}

async fn refresh_call(inner: Arc<ClientInner>) -> RefreshResult {
    let request = HttpRequest::new(Method::Post, inner.config.url(endpoints::AUTH_REFRESH))
        .header("Accept", "application/json");

    let response = inner
        .transport
        .send(request)
        .await
        .map_err(|e| RefreshFailure::Network(e.to_string()))?;

    if !response.is_success() {
        let error = api_error_from_response(&response);
        tracing::warn!("Token refresh rejected: {}", error);
        return Err(RefreshFailure::Rejected {
            status: error.status,
            code: error.code,
            message: error.message,
        });
    }

    let envelope: ApiEnvelope<TokenGrant> =
        decode_body(&response).map_err(|e| RefreshFailure::Malformed(e.to_string()))?;
    let token = envelope
        .data
        .and_then(|grant| grant.into_token(inner.tokens.now_ms()))
        .ok_or_else(|| RefreshFailure::Malformed("missing access token or expiry".to_string()))?;

    inner.tokens.save(&token);
    // No receivers is fine
    let _ = inner.events.send(AuthEvent::Refreshed);
    tracing::info!("Access token refreshed");

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_options_builders() {
        let options = RequestOptions::post()
            .with_body(json!({"a": 1}))
            .with_query("page", 2)
            .with_header("X-Trace", "t1")
            .public();

        assert_eq!(options.method, Method::Post);
        assert!(!options.requires_auth);
        assert!(!options.skip_refresh);
        assert_eq!(options.query, vec![("page".to_string(), "2".to_string())]);
        assert_eq!(options.body, Some(json!({"a": 1})));

        assert!(RequestOptions::get().requires_auth);
        assert!(RequestOptions::delete().skip_refresh().skip_refresh);
    }

    #[test]
    fn token_grant_expiry_forms() {
        let grant: TokenGrant =
            serde_json::from_value(json!({"access_token": "a", "expires_in": 60})).unwrap();
        assert_eq!(grant.into_token(1_000).unwrap().expires_at, 61_000);

        let grant: TokenGrant =
            serde_json::from_value(json!({"access_token": "a", "expires_at": 5})).unwrap();
        assert_eq!(grant.into_token(1_000).unwrap().expires_at, 5);

        let grant: TokenGrant = serde_json::from_value(json!({"access_token": "a"})).unwrap();
        assert!(grant.into_token(1_000).is_none());
    }
}
