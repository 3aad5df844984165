//! Property listings and bookmarks
//!
//! Bookmarks are toggled optimistically: [`ListingService::is_favorite`]
//! reports the new value while the request is in flight, and the old value
//! comes back, with an error notice, if the backend refuses.

use crate::error::{ServiceError, ServiceResult};
use crate::models::{PropertyPost, PropertyPostDraft, PropertyPostPage, PropertySearch};
use crate::notify::Notifier;
use crate::optimistic::ToggleSet;
use crate::searches::RecentSearches;
use homenote_client::{endpoints, ApiClient, ClientError, RequestOptions};
use std::fmt;
use std::sync::Arc;

const BOOKMARK_FAILED: &str = "Could not update the bookmark. Please try again.";

pub struct ListingService {
    client: ApiClient,
    notifier: Arc<dyn Notifier>,
    searches: RecentSearches,
    favorites: ToggleSet<u64>,
}

impl ListingService {
    #[must_use]
    pub fn new(client: ApiClient, notifier: Arc<dyn Notifier>, searches: RecentSearches) -> Self {
        Self {
            client,
            notifier,
            searches,
            favorites: ToggleSet::new(),
        }
    }

    /// Search listings; a keyword is remembered in recent searches
    pub async fn search(&self, search: &PropertySearch) -> ServiceResult<PropertyPostPage> {
        let mut options = RequestOptions::get()
            .with_query("page", search.page)
            .with_query("size", search.size);
        if let Some(keyword) = &search.keyword {
            options = options.with_query("keyword", keyword);
            self.searches.record(keyword);
        }

        let page: PropertyPostPage = self
            .client
            .request_data(endpoints::PROPERTY_POSTS, options)
            .await?;
        for post in &page.content {
            self.remember(post);
        }
        tracing::debug!(
            "Listing search returned {} of {}",
            page.content.len(),
            page.total_elements
        );
        Ok(page)
    }

    /// Fetch one listing
    pub async fn get(&self, id: u64) -> ServiceResult<PropertyPost> {
        let post: PropertyPost = self.client.get_data(&post_path(id)).await?;
        self.remember(&post);
        Ok(post)
    }

    /// Publish a listing
    ///
    /// # Errors
    /// - `ServiceError::Validation` when the title is blank
    pub async fn create(&self, draft: &PropertyPostDraft) -> ServiceResult<PropertyPost> {
        if draft.title.trim().is_empty() {
            return Err(ServiceError::Validation("title is required".to_string()));
        }
        let post: PropertyPost = self
            .client
            .post_data(endpoints::PROPERTY_POSTS, draft)
            .await?;
        tracing::info!("Published listing {}", post.id);
        Ok(post)
    }

    /// Remove a listing
    pub async fn delete(&self, id: u64) -> ServiceResult<()> {
        self.client.delete(&post_path(id)).await?;
        Ok(())
    }

    /// Local bookmark state
    #[inline]
    #[must_use]
    pub fn is_favorite(&self, id: u64) -> bool {
        self.favorites.get(id)
    }

    /// Flip the bookmark, returning the confirmed value
    ///
    /// # Errors
    /// - `ServiceError::Client` after rolling back when the backend refuses
    /// - `ServiceError::Validation` if a toggle for `id` is still pending
    pub async fn toggle_favorite(&self, id: u64) -> ServiceResult<bool> {
        self.favorites
            .toggle(id, self.notifier.as_ref(), BOOKMARK_FAILED, |favorite| {
                self.send_favorite(id, favorite)
            })
            .await
    }

    /// Recent search keywords
    #[inline]
    #[must_use]
    pub fn recent_searches(&self) -> &RecentSearches {
        &self.searches
    }

    async fn send_favorite(&self, id: u64, favorite: bool) -> Result<(), ClientError> {
        let path = format!("{}/favorites", post_path(id));
        let options = if favorite {
            RequestOptions::post()
        } else {
            RequestOptions::delete()
        };
        self.client.request_ok(&path, options).await
    }

    fn remember(&self, post: &PropertyPost) {
        if !self.favorites.is_pending(post.id) {
            self.favorites.set(post.id, post.is_favorite);
        }
    }
}

impl fmt::Debug for ListingService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListingService")
            .field("client", &self.client)
            .field("favorites", &self.favorites)
            .finish_non_exhaustive()
    }
}

fn post_path(id: u64) -> String {
    format!("{}/{id}", endpoints::PROPERTY_POSTS)
}
