//! Homenote Session - persisted client state
//!
//! Owns everything the client keeps between runs:
//! - The access token and its expiry ([`TokenStore`])
//! - A small key-value store standing in for browser local storage
//! - The clock used for expiry checks
//!
//! # Example
//!
//! ```rust,ignore
//! use homenote_session::{MemoryStorage, SystemClock, TokenData, TokenStore};
//! use std::sync::Arc;
//!
//! let store = TokenStore::new(Arc::new(MemoryStorage::new()), Arc::new(SystemClock));
//! store.save(&TokenData::new("access", expires_at));
//! assert!(store.get().is_some());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod clock;
pub mod error;
pub mod storage;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::StorageError;
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use token::{TokenData, TokenStore, EXPIRY_BUFFER_MS};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
