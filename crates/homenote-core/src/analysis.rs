//! Contract analysis state shared between the submit flow and SSE
//!
//! ```text
//! idle --begin(id)--> Processing(id) --result event--> Completed | Failed
//!   ^                                                        |
//!   +------------------------- clear ------------------------+
//! ```
//!
//! Readers subscribe to a `watch` channel and see every transition.

use crate::models::AnalysisStatus;
use homenote_sse::SseEvent;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::watch;

/// Event name carrying analysis results
pub const EASY_CONTRACT_RESULT_EVENT: &str = "easy-contract-result";

/// Current analysis, if any
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisState {
    pub easy_contract_id: Option<u64>,
    pub status: Option<AnalysisStatus>,
    pub error: Option<String>,
}

impl AnalysisState {
    /// Whether no analysis is tracked
    #[inline]
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.easy_contract_id.is_none() && self.status.is_none()
    }
}

/// Payload of [`EASY_CONTRACT_RESULT_EVENT`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnalysisResultEvent {
    pub easy_contract_id: u64,
    pub status: AnalysisStatus,
    #[serde(default)]
    pub error: Option<String>,
}

/// Owner of the analysis state
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    state: Arc<watch::Sender<AnalysisState>>,
}

impl AnalysisContext {
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(AnalysisState::default());
        Self {
            state: Arc::new(state),
        }
    }

    /// Snapshot of the current state
    #[must_use]
    pub fn current(&self) -> AnalysisState {
        self.state.borrow().clone()
    }

    /// Receiver of state changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AnalysisState> {
        self.state.subscribe()
    }

    /// Track a freshly submitted analysis
    pub fn begin(&self, easy_contract_id: u64) {
        tracing::info!("Analysis {} started", easy_contract_id);
        self.state.send_replace(AnalysisState {
            easy_contract_id: Some(easy_contract_id),
            status: Some(AnalysisStatus::Processing),
            error: None,
        });
    }

    /// Apply a server event; returns whether the state changed
    ///
    /// Other event names are ignored, as are results for a contract other
    /// than the one being tracked.
    pub fn apply_event(&self, event: &SseEvent) -> bool {
        if event.name != EASY_CONTRACT_RESULT_EVENT {
            return false;
        }

        let result: AnalysisResultEvent = match serde_json::from_str(&event.data) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Malformed {} payload: {}", EASY_CONTRACT_RESULT_EVENT, e);
                return false;
            }
        };

        self.apply_result(result)
    }

    /// Apply a decoded result; returns whether the state changed
    pub fn apply_result(&self, result: AnalysisResultEvent) -> bool {
        self.state.send_if_modified(|state| {
            if state.easy_contract_id.is_some_and(|id| id != result.easy_contract_id) {
                tracing::debug!(
                    "Ignoring result for contract {} while tracking {:?}",
                    result.easy_contract_id,
                    state.easy_contract_id
                );
                return false;
            }

            let next = AnalysisState {
                easy_contract_id: Some(result.easy_contract_id),
                status: Some(result.status),
                error: result.error,
            };
            if *state == next {
                return false;
            }

            tracing::info!("Analysis {} is now {}", result.easy_contract_id, result.status);
            *state = next;
            true
        })
    }

    /// Acknowledge and forget the current analysis
    pub fn clear(&self) {
        self.state.send_replace(AnalysisState::default());
    }
}

impl Default for AnalysisContext {
    fn default() -> Self {
        Self::new()
    }
}
