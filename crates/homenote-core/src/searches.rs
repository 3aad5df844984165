//! Recent listing searches
//!
//! Kept most-recent-first under [`RecentSearches::STORAGE_KEY`], without
//! duplicates, at most [`MAX_RECENT_SEARCHES`] entries. Storage failures
//! are logged and treated as an empty history.

use homenote_session::storage::{get_json, set_json};
use homenote_session::KeyValueStorage;
use std::sync::Arc;

/// Maximum number of remembered keywords
pub const MAX_RECENT_SEARCHES: usize = 10;

/// Search keyword history
#[derive(Clone)]
pub struct RecentSearches {
    storage: Arc<dyn KeyValueStorage>,
}

impl RecentSearches {
    /// Storage key holding the JSON array of keywords
    pub const STORAGE_KEY: &'static str = "recentPropertySearches";

    #[inline]
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// Keywords, most recent first
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        match get_json::<Vec<String>>(self.storage.as_ref(), Self::STORAGE_KEY) {
            Ok(keywords) => keywords.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Failed to read recent searches: {}", e);
                Vec::new()
            }
        }
    }

    /// Put `keyword` at the front, returning the new list
    ///
    /// Blank keywords are ignored.
    pub fn record(&self, keyword: &str) -> Vec<String> {
        let keyword = keyword.trim();
        let mut keywords = self.list();
        if keyword.is_empty() {
            return keywords;
        }

        keywords.retain(|k| k != keyword);
        keywords.insert(0, keyword.to_string());
        keywords.truncate(MAX_RECENT_SEARCHES);
        self.write(&keywords);
        keywords
    }

    /// Forget one keyword, returning the new list
    pub fn remove(&self, keyword: &str) -> Vec<String> {
        let mut keywords = self.list();
        let before = keywords.len();
        keywords.retain(|k| k != keyword.trim());
        if keywords.len() != before {
            self.write(&keywords);
        }
        keywords
    }

    /// Forget everything
    pub fn clear(&self) {
        if let Err(e) = self.storage.remove_item(Self::STORAGE_KEY) {
            tracing::warn!("Failed to clear recent searches: {}", e);
        }
    }

    fn write(&self, keywords: &[String]) {
        if let Err(e) = set_json(self.storage.as_ref(), Self::STORAGE_KEY, keywords) {
            tracing::warn!("Failed to save recent searches: {}", e);
        }
    }
}

impl std::fmt::Debug for RecentSearches {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecentSearches")
            .field("key", &Self::STORAGE_KEY)
            .finish_non_exhaustive()
    }
}
