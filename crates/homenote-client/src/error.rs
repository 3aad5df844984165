//! Error types for the API client
//!
//! Four failure families reach callers:
//! - Network failures from the transport
//! - HTTP failures (non-2xx), carried as [`ApiError`]
//! - Validation failures, an [`ApiError`] built from a field-error array
//! - Fatal auth failures, which end the session

use serde_json::Value;
use std::fmt;

/// Backend error code: the refresh token is invalid
pub const INVALID_REFRESH_TOKEN: &str = "INVALID_REFRESH_TOKEN";

/// Backend error code: a refresh token was replayed
pub const TOKEN_REUSE_DETECTED: &str = "TOKEN_REUSE_DETECTED";

/// Transport-level failure (no HTTP response available)
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// Request exceeded its deadline
    #[error("request timed out")]
    Timeout,

    /// Response body could not be read
    #[error("failed to read response body: {0}")]
    Body(String),

    /// Request could not be built
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_builder() {
            Self::InvalidRequest(e.to_string())
        } else if e.is_body() || e.is_decode() {
            Self::Body(e.to_string())
        } else {
            Self::Connect(e.to_string())
        }
    }
}

/// Non-2xx response translated into a typed error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("HTTP {status}: {message}")]
pub struct ApiError {
    /// HTTP status code
    pub status: u16,
    /// Human-readable message
    pub message: String,
    /// Backend error code, when the body carried one
    pub code: Option<String>,
    /// Extra payload from the error body
    pub data: Option<Value>,
}

impl ApiError {
    /// Create error with status and message
    #[inline]
    #[must_use]
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
            data: None,
        }
    }

    /// With backend error code
    #[inline]
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// With error payload
    #[inline]
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Whether the code ends the session
    #[inline]
    #[must_use]
    pub fn is_fatal_auth(&self) -> bool {
        matches!(
            self.code.as_deref(),
            Some(INVALID_REFRESH_TOKEN) | Some(TOKEN_REUSE_DETECTED)
        )
    }

    /// Whether this is a 400/422 request validation error
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self.status, 400 | 422)
    }

    /// Whether retrying the same request may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self.status, 408 | 429 | 502 | 503 | 504)
    }
}

/// Why a session was ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalAuthReason {
    /// Backend reported `INVALID_REFRESH_TOKEN`
    InvalidRefreshToken,
    /// Backend reported `TOKEN_REUSE_DETECTED`
    TokenReuseDetected,
    /// Refresh call failed
    RefreshFailed(String),
    /// Request was still unauthorized after a successful refresh
    RetryUnauthorized,
}

impl FatalAuthReason {
    /// Map a backend code to a fatal reason
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            INVALID_REFRESH_TOKEN => Some(Self::InvalidRefreshToken),
            TOKEN_REUSE_DETECTED => Some(Self::TokenReuseDetected),
            _ => None,
        }
    }
}

impl fmt::Display for FatalAuthReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRefreshToken => write!(f, "refresh token is invalid"),
            Self::TokenReuseDetected => write!(f, "refresh token reuse detected"),
            Self::RefreshFailed(e) => write!(f, "token refresh failed: {e}"),
            Self::RetryUnauthorized => write!(f, "still unauthorized after refresh"),
        }
    }
}

/// Main client error type
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// Backend answered with a non-2xx status
    #[error("{0}")]
    Api(#[from] ApiError),

    /// No response was received
    #[error("network error: {0}")]
    Network(#[from] TransportError),

    /// Session ended; the UI should route to sign-in
    #[error("session expired: {reason}")]
    SessionExpired {
        /// Why the session ended
        reason: FatalAuthReason,
    },

    /// Response body did not match the expected type
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Request could not be built
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// HTTP status, if a response was received
    #[inline]
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api(e) => Some(e.status),
            Self::SessionExpired { .. } => Some(401),
            _ => None,
        }
    }

    /// Backend error code, if any
    #[inline]
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api(e) => e.code.as_deref(),
            _ => None,
        }
    }

    /// Whether the session was ended by this failure
    #[inline]
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }

    /// Whether retrying may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Api(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Message suitable for a toast
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.message.clone(),
            Self::Network(_) => "Network connection failed. Please try again.".to_string(),
            Self::SessionExpired { .. } => "Your session has expired. Please sign in again.".to_string(),
            Self::Decode(_) | Self::InvalidRequest(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = ApiError::new(404, "not found").with_code("POST_NOT_FOUND");
        assert_eq!(err.to_string(), "HTTP 404: not found");
        assert_eq!(err.code.as_deref(), Some("POST_NOT_FOUND"));
    }

    #[test]
    fn api_error_fatal_codes() {
        assert!(ApiError::new(401, "x").with_code(INVALID_REFRESH_TOKEN).is_fatal_auth());
        assert!(ApiError::new(401, "x").with_code(TOKEN_REUSE_DETECTED).is_fatal_auth());
        assert!(!ApiError::new(401, "x").with_code("EXPIRED_TOKEN").is_fatal_auth());
        assert!(!ApiError::new(401, "x").is_fatal_auth());
    }

    #[test]
    fn fatal_reason_from_code() {
        assert_eq!(
            FatalAuthReason::from_code(INVALID_REFRESH_TOKEN),
            Some(FatalAuthReason::InvalidRefreshToken)
        );
        assert_eq!(FatalAuthReason::from_code("OTHER"), None);
    }

    #[test]
    fn client_error_classification() {
        let err = ClientError::Network(TransportError::Timeout);
        assert!(err.is_retryable());
        assert_eq!(err.status(), None);

        let err = ClientError::from(ApiError::new(503, "down"));
        assert!(err.is_retryable());
        assert_eq!(err.status(), Some(503));

        let err = ClientError::SessionExpired {
            reason: FatalAuthReason::RetryUnauthorized,
        };
        assert!(err.is_session_expired());
        assert!(!err.is_retryable());
    }

    #[test]
    fn user_message_prefers_backend_message() {
        let err = ClientError::from(ApiError::new(400, "Title is required"));
        assert_eq!(err.user_message(), "Title is required");
    }
}
