//! Login and logout
//!
//! Login exchanges an OAuth authorization code for an access token; the
//! refresh token comes back as an HttpOnly cookie held by the transport.

use crate::client::{ApiClient, AuthEvent, RequestOptions, TokenGrant};
use crate::endpoints;
use crate::error::ClientError;
use homenote_session::TokenData;
use serde::{Deserialize, Serialize};

/// Social login provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthProvider {
    Kakao,
    Naver,
    Google,
}

impl std::str::FromStr for AuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kakao" => Ok(Self::Kakao),
            "naver" => Ok(Self::Naver),
            "google" => Ok(Self::Google),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    provider: AuthProvider,
    code: &'a str,
    redirect_uri: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginGrant {
    #[serde(flatten)]
    grant: TokenGrant,
    #[serde(default)]
    is_new_member: bool,
}

/// Result of a successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub token: TokenData,
    /// Member still has to finish onboarding
    pub is_new_member: bool,
}

impl ApiClient {
    /// Exchange an authorization code for a session
    ///
    /// # Errors
    /// - `ClientError::Api` if the backend rejects the code
    /// - `ClientError::Decode` if the grant carries no expiry
    pub async fn login(
        &self,
        provider: AuthProvider,
        code: &str,
        redirect_uri: &str,
    ) -> Result<LoginOutcome, ClientError> {
        let body = TokenRequest {
            provider,
            code,
            redirect_uri,
        };
        let options = RequestOptions::post().public().with_json(&body)?;
        let login: LoginGrant = self.request_data(endpoints::AUTH_TOKEN, options).await?;

        let token = login
            .grant
            .into_token(self.tokens().now_ms())
            .ok_or_else(|| ClientError::Decode("login grant has no expiry".to_string()))?;

        self.tokens().save(&token);
        self.inner.refresh.reset();
        self.emit(AuthEvent::SignedIn);
        tracing::info!("Signed in with {:?}", provider);

        Ok(LoginOutcome {
            token,
            is_new_member: login.is_new_member,
        })
    }

    /// End the session locally and, best effort, on the backend
    pub async fn logout(&self) {
        let options = RequestOptions::post().skip_refresh();
        if let Err(e) = self.request_ok(endpoints::AUTH_LOGOUT, options).await {
            tracing::warn!("Logout request failed: {}", e);
        }

        self.tokens().remove();
        self.inner.refresh.reset();
        self.emit(AuthEvent::SignedOut);
        tracing::info!("Signed out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_parsing() {
        assert_eq!("Kakao".parse::<AuthProvider>(), Ok(AuthProvider::Kakao));
        assert!("apple".parse::<AuthProvider>().is_err());
    }

    #[test]
    fn token_request_serializes_snake_case() {
        let body = TokenRequest {
            provider: AuthProvider::Naver,
            code: "abc",
            redirect_uri: "https://homenote.kr/callback",
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"provider": "NAVER", "code": "abc", "redirect_uri": "https://homenote.kr/callback"})
        );
    }

    #[test]
    fn login_grant_reads_new_member_flag() {
        let grant: LoginGrant = serde_json::from_value(json!({
            "access_token": "t",
            "expires_in": 1800,
            "is_new_member": true
        }))
        .unwrap();
        assert!(grant.is_new_member);
        assert_eq!(grant.grant.access_token, "t");
    }
}
