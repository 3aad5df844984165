//! Homenote Core - feature services
//!
//! Controllers behind each screen of the app:
//! - Members and onboarding ([`MemberService`], [`Onboarding`])
//! - Contract analysis ([`EasyContractService`], [`AnalysisContext`])
//! - Listings with optimistic bookmarks ([`ListingService`])
//! - Home notes with optimistic checklists ([`HomeNoteService`])
//! - Recent searches ([`RecentSearches`])
//!
//! [`Homenote`] wires them to one client and storage backend.
//!
//! # Example
//!
//! ```rust,ignore
//! use homenote_core::{Homenote, LogNotifier};
//!
//! let app = Homenote::new(client, storage, Arc::new(LogNotifier));
//! let events = app.connect_events(SseConfig::default());
//! let contract = app.contracts.submit(&files).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod analysis;
pub mod contracts;
pub mod error;
pub mod listings;
pub mod media;
pub mod members;
pub mod models;
pub mod nickname;
pub mod notes;
pub mod notify;
pub mod optimistic;
pub mod searches;
pub mod uploads;

pub use analysis::{AnalysisContext, AnalysisResultEvent, AnalysisState, EASY_CONTRACT_RESULT_EVENT};
pub use contracts::EasyContractService;
pub use error::{ServiceError, ServiceResult};
pub use listings::ListingService;
pub use media::MediaKind;
pub use members::{MemberService, Onboarding, OnboardingStep};
pub use models::*;
pub use nickname::{filter_nickname, validate_nickname, NicknameError};
pub use notes::HomeNoteService;
pub use notify::{LogNotifier, Notice, NoticeLevel, Notifier, RecordingNotifier};
pub use optimistic::ToggleSet;
pub use searches::{RecentSearches, MAX_RECENT_SEARCHES};
pub use uploads::{UploadFile, UploadService};

use homenote_client::ApiClient;
use homenote_session::KeyValueStorage;
use homenote_sse::{SseConfig, SseConnection, SseHandle};
use std::sync::Arc;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// All services sharing one client, storage and notifier
#[derive(Debug)]
pub struct Homenote {
    pub client: ApiClient,
    pub members: MemberService,
    pub uploads: UploadService,
    pub contracts: EasyContractService,
    pub listings: ListingService,
    pub notes: HomeNoteService,
    pub analysis: AnalysisContext,
}

impl Homenote {
    #[must_use]
    pub fn new(
        client: ApiClient,
        storage: Arc<dyn KeyValueStorage>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let analysis = AnalysisContext::new();
        let uploads = UploadService::new(client.clone());

        Self {
            members: MemberService::new(client.clone()),
            contracts: EasyContractService::new(client.clone(), uploads.clone(), analysis.clone()),
            listings: ListingService::new(
                client.clone(),
                notifier.clone(),
                RecentSearches::new(storage),
            ),
            notes: HomeNoteService::new(client.clone(), notifier),
            uploads,
            analysis,
            client,
        }
    }

    /// Start the event stream, feeding results into the analysis context
    ///
    /// Must be called inside a tokio runtime.
    pub fn connect_events(&self, config: SseConfig) -> SseHandle {
        let analysis = self.analysis.clone();
        SseConnection::spawn(self.client.clone(), config, move |event| {
            analysis.apply_event(&event);
        })
    }
}
