//! Process-wide memory of the last credential context that worked

use crate::types::CredentialContext;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared cell holding the last credential context known to have succeeded
///
/// Cloning is cheap and yields a handle to the same cell. All reads and writes are
/// serialised through one async mutex, so concurrent jobs observe a consistent
/// value. The cell is owned by whoever constructs the downloader and passed in
/// explicitly; there is no global instance.
#[derive(Clone, Debug, Default)]
pub struct CredentialCache {
    inner: Arc<Mutex<Option<CredentialContext>>>,
}

impl CredentialCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache that already holds `context`
    pub fn with_context(context: CredentialContext) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(context))),
        }
    }

    /// Current cached context, if any
    pub async fn get(&self) -> Option<CredentialContext> {
        self.inner.lock().await.clone()
    }

    /// Remember `context` as the one to try first from now on
    pub async fn record_success(&self, context: &CredentialContext) {
        let mut cached = self.inner.lock().await;
        if cached.as_ref() != Some(context) {
            tracing::info!(
                context = %context,
                previous = ?cached.as_ref().map(ToString::to_string),
                "caching working credential context"
            );
            *cached = Some(context.clone());
        }
    }

    /// Forget `context` if, and only if, it is still the cached value
    ///
    /// Returns whether the cache was cleared. A different value means another job
    /// already recorded a fresh success, which must not be clobbered.
    pub async fn invalidate(&self, context: &CredentialContext) -> bool {
        let mut cached = self.inner.lock().await;
        if cached.as_ref() == Some(context) {
            *cached = None;
            tracing::warn!(context = %context, "cached credential context failed, cache cleared");
            true
        } else {
            false
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_empty() {
        assert_eq!(CredentialCache::new().get().await, None);
    }

    #[tokio::test]
    async fn record_success_overwrites() {
        let cache = CredentialCache::new();
        cache.record_success(&"firefox".into()).await;
        cache.record_success(&CredentialContext::Anonymous).await;
        assert_eq!(cache.get().await, Some(CredentialContext::Anonymous));
    }

    #[tokio::test]
    async fn invalidate_only_clears_matching_value() {
        let cache = CredentialCache::with_context("chrome".into());

        assert!(!cache.invalidate(&"firefox".into()).await);
        assert_eq!(cache.get().await, Some("chrome".into()));

        assert!(cache.invalidate(&"chrome".into()).await);
        assert_eq!(cache.get().await, None);

        // second invalidate is a no-op
        assert!(!cache.invalidate(&"chrome".into()).await);
    }

    #[tokio::test]
    async fn stale_invalidate_does_not_clobber_fresh_success() {
        let cache = CredentialCache::with_context("firefox".into());
        let other_job = cache.clone();

        // another job already found chrome working
        other_job.record_success(&"chrome".into()).await;
        // this job's firefox attempt failed afterwards
        assert!(!cache.invalidate(&"firefox".into()).await);

        assert_eq!(cache.get().await, Some("chrome".into()));
    }

    #[tokio::test]
    async fn clones_share_state() {
        let cache = CredentialCache::new();
        let clone = cache.clone();
        clone.record_success(&"firefox".into()).await;
        assert_eq!(cache.get().await, Some("firefox".into()));
    }
}
