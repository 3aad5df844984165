//! Error types for Homenote services
//!
//! Services add local failure modes on top of [`ClientError`]:
//! - input rejected before any request is sent
//! - object-storage upload failures
//! - records missing from local state

use homenote_client::ClientError;

/// Result alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service-level error
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    /// API call failed
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Input rejected locally
    #[error("invalid input: {0}")]
    Validation(String),

    /// Upload to object storage failed
    #[error("upload failed: {0}")]
    Upload(String),

    /// Record not found
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },
}

impl ServiceError {
    /// Whether the session ended and sign-in is required
    #[inline]
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::Client(e) if e.is_session_expired())
    }

    /// Message suitable for a toast
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Client(e) => e.user_message(),
            Self::Validation(message) => message.clone(),
            Self::Upload(_) => "File upload failed. Please try again.".to_string(),
            Self::NotFound { .. } => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homenote_client::{ApiError, FatalAuthReason};

    #[test]
    fn session_expiry_is_detected_through_client_error() {
        let expired = ServiceError::from(ClientError::SessionExpired {
            reason: FatalAuthReason::RetryUnauthorized,
        });
        assert!(expired.is_session_expired());

        let api = ServiceError::from(ClientError::Api(ApiError::new(500, "boom")));
        assert!(!api.is_session_expired());
        assert!(!ServiceError::Validation("x".into()).is_session_expired());
    }

    #[test]
    fn messages() {
        let err = ServiceError::NotFound { kind: "home note", id: 3 };
        assert_eq!(err.to_string(), "home note 3 not found");
        assert_eq!(
            ServiceError::Validation("Nickname is too short".into()).user_message(),
            "Nickname is too short"
        );
    }
}
