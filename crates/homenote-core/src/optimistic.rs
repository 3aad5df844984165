//! Optimistic boolean toggles with rollback
//!
//! The flipped value is visible to readers as soon as the toggle starts.
//! When the backend call fails the value is restored and an error notice
//! is sent. Toggles on the same key are serialised by a per-key in-flight
//! flag: a second toggle while one is pending is refused.

use crate::error::{ServiceError, ServiceResult};
use crate::notify::{Notice, NoticeLevel, Notifier};
use homenote_client::ClientError;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::hash::Hash;

/// Local boolean state keyed by record id
#[derive(Debug)]
pub struct ToggleSet<K> {
    values: Mutex<HashMap<K, bool>>,
    pending: Mutex<HashSet<K>>,
}

impl<K: Copy + Eq + Hash> ToggleSet<K> {
    /// Create empty set
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashSet::new()),
        }
    }

    /// Current value; unknown keys read as `false`
    #[inline]
    #[must_use]
    pub fn get(&self, key: K) -> bool {
        self.values.lock().get(&key).copied().unwrap_or(false)
    }

    /// Record the server's value
    pub fn set(&self, key: K, value: bool) {
        self.values.lock().insert(key, value);
    }

    /// Whether a toggle on `key` is awaiting the backend
    #[inline]
    #[must_use]
    pub fn is_pending(&self, key: K) -> bool {
        self.pending.lock().contains(&key)
    }

    /// Flip `key` now, then confirm with `call(new_value)`
    ///
    /// Returns the confirmed value.
    ///
    /// # Errors
    /// - `ServiceError::Validation` if a toggle on `key` is already pending
    /// - the call's error, after the value has been restored and
    ///   `failure_message` sent to `notifier`
    pub async fn toggle<F, Fut>(
        &self,
        key: K,
        notifier: &dyn Notifier,
        failure_message: &str,
        call: F,
    ) -> ServiceResult<bool>
    where
        F: FnOnce(bool) -> Fut,
        Fut: Future<Output = Result<(), ClientError>>,
    {
        if !self.pending.lock().insert(key) {
            return Err(ServiceError::Validation("update already in progress".to_string()));
        }
        let _pending = PendingGuard { set: self, key };

        let previous = self.get(key);
        let next = !previous;
        self.set(key, next);

        match call(next).await {
            Ok(()) => Ok(next),
            Err(e) => {
                tracing::warn!("Optimistic update reverted: {}", e);
                self.set(key, previous);
                notifier.notify(Notice::new(NoticeLevel::Error, failure_message));
                Err(e.into())
            }
        }
    }
}

impl<K: Copy + Eq + Hash> Default for ToggleSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the pending flag even if the toggle future is dropped
struct PendingGuard<'a, K: Copy + Eq + Hash> {
    set: &'a ToggleSet<K>,
    key: K,
}

impl<K: Copy + Eq + Hash> Drop for PendingGuard<'_, K> {
    fn drop(&mut self) {
        self.set.pending.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{MockNotifier, RecordingNotifier};
    use homenote_client::{ApiError, TransportError};

    #[tokio::test]
    async fn success_keeps_flipped_value() {
        let set = ToggleSet::new();
        let notifier = RecordingNotifier::new();

        let confirmed = set
            .toggle(1_u64, &notifier, "failed", |value| async move {
                assert!(value);
                Ok(())
            })
            .await
            .unwrap();

        assert!(confirmed);
        assert!(set.get(1));
        assert!(notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn failure_restores_and_notifies() {
        let set = ToggleSet::new();
        set.set(5_u64, true);

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|notice| notice.level == NoticeLevel::Error && notice.message == "could not save")
            .times(1)
            .return_const(());

        let err = set
            .toggle(5, &notifier, "could not save", |_| async {
                Err(ClientError::Api(ApiError::new(500, "boom")))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Client(_)));
        assert!(set.get(5));
        assert!(!set.is_pending(5));
    }

    #[tokio::test]
    async fn flipped_value_is_visible_while_pending() {
        let set = ToggleSet::new();
        let notifier = RecordingNotifier::new();

        let result = set
            .toggle(9_u64, &notifier, "failed", |_| {
                // Observed before the backend answers
                assert!(set.get(9));
                assert!(set.is_pending(9));
                async { Err(ClientError::Network(TransportError::Timeout)) }
            })
            .await;

        assert!(result.is_err());
        assert!(!set.get(9));
        assert_eq!(notifier.notices().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_toggle_on_same_key_is_refused() {
        let set = ToggleSet::new();
        let notifier = RecordingNotifier::new();

        let result = set
            .toggle(3_u64, &notifier, "failed", |_| async {
                let nested = set.toggle(3, &notifier, "failed", |_| async { Ok(()) }).await;
                assert!(matches!(nested, Err(ServiceError::Validation(_))));
                Ok(())
            })
            .await;

        assert!(result.unwrap());
        assert!(set.get(3));
    }
}
