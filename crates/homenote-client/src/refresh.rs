//! Single-flight token refresh
//!
//! Any number of callers may ask for a refresh at once; only the first
//! starts a network call and the rest await the same shared future. Once
//! the flight settles its result stays shared for a grace window, after
//! which the next caller starts a fresh flight. The window is checked
//! against a timestamp under the slot mutex; nothing is scheduled.

use crate::error::FatalAuthReason;
use futures::future::{BoxFuture, FutureExt, Shared};
use homenote_session::TokenData;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Why a refresh did not produce a token
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshFailure {
    /// Backend refused the refresh
    #[error("refresh rejected with HTTP {status}: {message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Refresh request never got a response
    #[error("refresh request failed: {0}")]
    Network(String),

    /// Refresh response did not carry a token
    #[error("malformed refresh response: {0}")]
    Malformed(String),
}

impl RefreshFailure {
    /// Reason recorded when this failure ends the session
    ///
    /// Fatal backend codes keep their typed reason.
    #[must_use]
    pub fn fatal_reason(&self) -> FatalAuthReason {
        match self {
            Self::Rejected {
                code: Some(code), ..
            } => FatalAuthReason::from_code(code)
                .unwrap_or_else(|| FatalAuthReason::RefreshFailed(self.to_string())),
            _ => FatalAuthReason::RefreshFailed(self.to_string()),
        }
    }
}

/// Shared refresh outcome
pub type RefreshResult = Result<TokenData, RefreshFailure>;

type Flight = Shared<BoxFuture<'static, RefreshResult>>;

struct Slot {
    generation: u64,
    future: Flight,
    settled_at: Option<Instant>,
}

/// Single-flight coordinator for refresh calls
pub struct SingleFlight {
    slot: Mutex<Option<Slot>>,
    grace: Duration,
    flights: AtomicU64,
}

impl SingleFlight {
    /// Create coordinator with a settle grace window
    #[inline]
    #[must_use]
    pub fn new(grace: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            grace,
            flights: AtomicU64::new(0),
        }
    }

    /// Join the current flight or start a new one with `start`
    ///
    /// `start` is only called when no reusable flight exists.
    pub async fn run<F>(&self, start: F) -> RefreshResult
    where
        F: FnOnce() -> BoxFuture<'static, RefreshResult>,
    {
        let (generation, flight) = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                Some(current) if self.reusable(current) => {
                    tracing::debug!("Joining in-flight token refresh #{}", current.generation);
                    (current.generation, current.future.clone())
                }
                _ => {
                    let generation = self.flights.fetch_add(1, Ordering::SeqCst) + 1;
                    let future = start().shared();
                    *slot = Some(Slot {
                        generation,
                        future: future.clone(),
                        settled_at: None,
                    });
                    tracing::debug!("Starting token refresh #{}", generation);
                    (generation, future)
                }
            }
        };

        let result = flight.await;

        let mut slot = self.slot.lock();
        if let Some(current) = slot.as_mut() {
            if current.generation == generation && current.settled_at.is_none() {
                current.settled_at = Some(Instant::now());
            }
        }

        result
    }

    /// Number of flights started so far
    #[inline]
    #[must_use]
    pub fn flights_started(&self) -> u64 {
        self.flights.load(Ordering::SeqCst)
    }

    /// Drop any settled or in-flight result
    pub fn reset(&self) {
        *self.slot.lock() = None;
    }

    fn reusable(&self, slot: &Slot) -> bool {
        match slot.settled_at {
            None => true,
            Some(at) => at.elapsed() < self.grace,
        }
    }
}

impl std::fmt::Debug for SingleFlight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("SingleFlight")
            .field("grace", &self.grace)
            .field("flights", &self.flights_started())
            .field("in_flight", &slot.as_ref().is_some_and(|s| s.settled_at.is_none()))
            .finish()
    }
}
