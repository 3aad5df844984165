//! Homenote Client - authenticated REST access to the Homenote backend
//!
//! Wraps an HTTP transport with:
//! - Bearer token injection from the [`TokenStore`](homenote_session::TokenStore)
//! - Single-flight token refresh on 401, with exactly one retry
//! - Typed error translation of backend error bodies
//!
//! # Example
//!
//! ```rust,ignore
//! use homenote_client::{ApiClient, ClientConfig, RequestOptions};
//!
//! # async fn example(tokens: homenote_session::TokenStore) -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiClient::with_reqwest(ClientConfig::new("https://api.homenote.kr"), tokens)?;
//! let me: serde_json::Value = client.get_data("/v1/members/me").await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod auth;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod refresh;
pub mod reqwest_transport;
pub mod response;
pub mod transport;

pub use auth::{AuthProvider, LoginOutcome};
pub use client::{ApiClient, AuthEvent, RequestOptions};
pub use config::ClientConfig;
pub use error::{ApiError, ClientError, FatalAuthReason, TransportError};
pub use refresh::{RefreshFailure, RefreshResult};
pub use reqwest_transport::ReqwestTransport;
pub use response::ApiEnvelope;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, StreamResponse};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
