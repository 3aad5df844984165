//! Access token persistence
//!
//! The token store has a single writer path (login/refresh) and many
//! readers. Expiry checks keep a 5-minute buffer so a request never starts
//! with a token that lapses mid-flight.
//!
//! Storage failures never escape this module: a broken backend degrades to
//! "no token".

use crate::clock::Clock;
use crate::storage::{get_json, set_json, KeyValueStorage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Safety margin subtracted from the real expiry
pub const EXPIRY_BUFFER_MS: i64 = 5 * 60 * 1000;

/// Access token with its absolute expiry
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    /// Bearer credential
    pub access_token: String,
    /// Expiry in epoch milliseconds
    pub expires_at: i64,
}

impl TokenData {
    /// Create token data
    #[inline]
    #[must_use]
    pub fn new(access_token: impl Into<String>, expires_at: i64) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    /// Build from a server `expires_in` (seconds) relative to `now_ms`
    #[inline]
    #[must_use]
    pub fn from_expires_in(access_token: impl Into<String>, expires_in_secs: u64, now_ms: i64) -> Self {
        let lifetime = i64::try_from(expires_in_secs)
            .unwrap_or(i64::MAX / 1000)
            .saturating_mul(1000);
        Self::new(access_token, now_ms.saturating_add(lifetime))
    }

    /// Value for the `Authorization` header
    #[inline]
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for TokenData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenData")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Persisted access token store
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStorage>,
    clock: Arc<dyn Clock>,
}

impl TokenStore {
    /// Storage key holding the serialized token
    pub const STORAGE_KEY: &'static str = "auth_token";

    /// Create store over a storage backend
    #[inline]
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Persist token data
    pub fn save(&self, token: &TokenData) {
        if let Err(e) = set_json(self.storage.as_ref(), Self::STORAGE_KEY, token) {
            tracing::warn!("Failed to save access token: {}", e);
        }
    }

    /// Load the token if present and not expired
    ///
    /// An expired token is removed as a side effect.
    #[must_use]
    pub fn get(&self) -> Option<TokenData> {
        let token: TokenData = match get_json(self.storage.as_ref(), Self::STORAGE_KEY) {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to read access token: {}", e);
                return None;
            }
        };

        if self.is_expired(&token) {
            tracing::debug!("Stored access token expired at {}", token.expires_at);
            self.remove();
            return None;
        }

        Some(token)
    }

    /// Delete the stored token
    pub fn remove(&self) {
        if let Err(e) = self.storage.remove_item(Self::STORAGE_KEY) {
            tracing::warn!("Failed to remove access token: {}", e);
        }
    }

    /// Whether `token` is expired or inside the safety buffer
    #[inline]
    #[must_use]
    pub fn is_expired(&self, token: &TokenData) -> bool {
        token.expires_at.saturating_sub(self.clock.now_ms()) < EXPIRY_BUFFER_MS
    }

    /// Current time from the store's clock
    #[inline]
    #[must_use]
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore")
            .field("key", &Self::STORAGE_KEY)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::StorageError;
    use crate::storage::{MemoryStorage, MockKeyValueStorage};
    use proptest::prelude::*;

    const NOW: i64 = 1_700_000_000_000;
    const HOUR: i64 = 60 * 60 * 1000;

    fn store_at(now: i64) -> (TokenStore, Arc<MemoryStorage>, Arc<ManualClock>) {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(now));
        let store = TokenStore::new(storage.clone(), clock.clone());
        (store, storage, clock)
    }

    #[test]
    fn save_then_get_returns_token() {
        let (store, storage, _) = store_at(NOW);
        let token = TokenData::new("abc", NOW + HOUR);

        store.save(&token);
        assert_eq!(store.get(), Some(token));

        let raw = storage.get_item(TokenStore::STORAGE_KEY).unwrap().unwrap();
        assert!(raw.contains("\"accessToken\":\"abc\""));
        assert!(raw.contains("\"expiresAt\""));
    }

    #[test]
    fn get_clears_expired_token() {
        let (store, storage, clock) = store_at(NOW);
        store.save(&TokenData::new("abc", NOW + HOUR));

        clock.advance_ms(HOUR);
        assert_eq!(store.get(), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn token_inside_buffer_counts_as_expired() {
        let (store, _, _) = store_at(NOW);
        let token = TokenData::new("abc", NOW + EXPIRY_BUFFER_MS - 1);
        assert!(store.is_expired(&token));

        let token = TokenData::new("abc", NOW + EXPIRY_BUFFER_MS);
        assert!(!store.is_expired(&token));
    }

    #[test]
    fn remove_deletes_token() {
        let (store, _, _) = store_at(NOW);
        store.save(&TokenData::new("abc", NOW + HOUR));
        store.remove();
        assert_eq!(store.get(), None);
    }

    #[test]
    fn from_expires_in_uses_seconds() {
        let token = TokenData::from_expires_in("abc", 3600, NOW);
        assert_eq!(token.expires_at, NOW + HOUR);
        assert_eq!(token.bearer(), "Bearer abc");
    }

    #[test]
    fn debug_redacts_token() {
        let token = TokenData::new("super-secret", NOW);
        assert!(!format!("{token:?}").contains("super-secret"));
    }

    #[test]
    fn storage_read_failure_degrades_to_no_token() {
        let mut storage = MockKeyValueStorage::new();
        storage
            .expect_get_item()
            .returning(|_| Err(StorageError::Unavailable("disabled".to_string())));

        let store = TokenStore::new(Arc::new(storage), Arc::new(ManualClock::new(NOW)));
        assert_eq!(store.get(), None);
    }

    #[test]
    fn storage_write_failure_is_swallowed() {
        let mut storage = MockKeyValueStorage::new();
        storage
            .expect_set_item()
            .times(1)
            .returning(|_, _| Err(StorageError::Unavailable("quota".to_string())));
        storage
            .expect_remove_item()
            .times(1)
            .returning(|_| Err(StorageError::Unavailable("quota".to_string())));

        let store = TokenStore::new(Arc::new(storage), Arc::new(ManualClock::new(NOW)));
        store.save(&TokenData::new("abc", NOW + HOUR));
        store.remove();
    }

    #[test]
    fn malformed_stored_token_is_ignored() {
        let (store, storage, _) = store_at(NOW);
        storage
            .set_item(TokenStore::STORAGE_KEY, "{\"accessToken\":1}")
            .unwrap();
        assert_eq!(store.get(), None);
    }

    proptest! {
        #[test]
        fn prop_buffer_invariant(now in 0i64..4_000_000_000_000, remaining in -HOUR..HOUR) {
            let (store, _, _) = store_at(now);
            let token = TokenData::new("t", now + remaining);
            prop_assert_eq!(store.is_expired(&token), remaining < EXPIRY_BUFFER_MS);
        }
    }
}
