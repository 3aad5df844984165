//! Server DTOs
//!
//! Mirrors of the backend JSON contracts. Field names are snake_case on the
//! wire; optional fields default so older responses still decode.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// Signed-in member profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: u64,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub is_onboarded: bool,
}

/// Body of `PATCH /v1/members/me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberUpdate {
    pub nickname: String,
}

/// Lifestyle tag chosen during onboarding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifestyle {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub selected: bool,
}

/// Body of `POST /v1/lifestyles`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifestyleSelection {
    pub lifestyle_ids: Vec<u64>,
}

// ---------------------------------------------------------------------------
// Easy contracts
// ---------------------------------------------------------------------------

/// Progress of a contract analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    /// Whether the analysis has finished either way
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Processing => write!(f, "PROCESSING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Full contract analysis record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EasyContract {
    pub id: u64,
    pub status: AnalysisStatus,
    #[serde(default)]
    pub file_asset_ids: Vec<u64>,
    /// Analysis report; shape owned by the backend
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Row of the contract list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EasyContractSummary {
    pub id: u64,
    pub status: AnalysisStatus,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Body of `POST /v1/easy-contracts`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EasyContractRequest {
    pub file_asset_ids: Vec<u64>,
}

// ---------------------------------------------------------------------------
// File assets
// ---------------------------------------------------------------------------

/// Body of `POST /v1/file-assets/presigned-urls`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresignedUrlRequest {
    pub file_name: String,
    pub content_type: String,
    pub file_size: u64,
}

/// Upload target issued by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignedUrl {
    pub file_asset_id: u64,
    pub upload_url: String,
}

/// Body of `POST /v1/file-assets/{id}/complete`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
}

impl FileMetadata {
    /// Image dimensions
    #[inline]
    #[must_use]
    pub fn image(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            page_count: None,
        }
    }

    /// Document page count
    #[inline]
    #[must_use]
    pub fn document(page_count: u32) -> Self {
        Self {
            page_count: Some(page_count),
            ..Self::default()
        }
    }
}

/// Stored file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAsset {
    pub id: u64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Property posts
// ---------------------------------------------------------------------------

/// Listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyPost {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub deposit: Option<u64>,
    #[serde(default)]
    pub monthly_rent: Option<u64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// One page of listings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyPostPage {
    #[serde(default)]
    pub content: Vec<PropertyPost>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_elements: u64,
}

impl PropertyPostPage {
    /// Whether another page follows
    #[inline]
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page + 1 < self.total_pages
    }
}

/// Listing search parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySearch {
    pub keyword: Option<String>,
    pub page: u32,
    pub size: u32,
}

impl PropertySearch {
    /// Default page size
    pub const DEFAULT_SIZE: u32 = 20;

    /// First page, no keyword
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With keyword; blank keywords are dropped
    #[inline]
    #[must_use]
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        let keyword = keyword.into();
        let trimmed = keyword.trim();
        self.keyword = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    /// With page index (0-based)
    #[inline]
    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// With page size
    #[inline]
    #[must_use]
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size.max(1);
        self
    }
}

impl Default for PropertySearch {
    fn default() -> Self {
        Self {
            keyword: None,
            page: 0,
            size: Self::DEFAULT_SIZE,
        }
    }
}

/// Body of `POST /v2/property-posts`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropertyPostDraft {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_rent: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub file_asset_ids: Vec<u64>,
}

// ---------------------------------------------------------------------------
// Home notes
// ---------------------------------------------------------------------------

/// Inspection checklist entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: u64,
    pub content: String,
    #[serde(default)]
    pub checked: bool,
}

/// Property inspection note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeNote {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl HomeNote {
    /// Checked and total checklist counts
    #[must_use]
    pub fn progress(&self) -> (usize, usize) {
        let checked = self.checklist.iter().filter(|item| item.checked).count();
        (checked, self.checklist.len())
    }
}

/// Body of home-note create and update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HomeNoteDraft {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// Body of `PATCH /v1/home-notes/{id}/checklist/{item_id}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChecklistUpdate {
    pub checked: bool,
}
