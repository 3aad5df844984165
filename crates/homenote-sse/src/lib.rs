//! Homenote SSE - server push notifications
//!
//! Provides:
//! - [`SseFrameParser`]: incremental `text/event-stream` parsing
//! - [`SseConnection`]: a reconnecting connection task with event-id replay
//! - [`ReconnectPolicy`]: flat or exponential reconnect delays
//!
//! # Example
//!
//! ```rust,ignore
//! use homenote_sse::{SseConfig, SseConnection};
//!
//! let handle = SseConnection::spawn(client, SseConfig::default(), |event| {
//!     println!("{}: {}", event.name, event.data);
//! });
//! // ...
//! handle.close().await;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod connection;
pub mod parser;
pub mod policy;

pub use connection::{ConnectionState, SseConfig, SseConnection, SseExit, SseHandle};
pub use parser::{parse_frame, SseEvent, SseFrameParser, DEFAULT_EVENT_NAME};
pub use policy::{ReconnectPolicy, DEFAULT_RECONNECT_DELAY};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
