//! Analysis cache
//!
//! Image critiques are deterministic enough per screenshot that repeating
//! one is wasted quota. Results are cached by a digest of the analysis kind
//! and the image bytes, using moka with capacity and TTL bounds.

use crate::service::InlineImage;
use moka::future::Cache;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use vibe_document::Revision;

const SEPARATOR: &[u8] = &[0x1f];

/// Content-addressed cache of typed analysis results
#[derive(Debug, Clone)]
pub struct AnalysisCache {
    inner: Cache<Revision, Arc<dyn Any + Send + Sync>>,
}

impl AnalysisCache {
    /// Cache with capacity and time-to-live
    #[must_use]
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder().max_capacity(max_capacity).time_to_live(ttl).build(),
        }
    }

    /// Key for `kind` applied to `image`
    #[must_use]
    pub fn key(kind: &str, image: &InlineImage) -> Revision {
        let mut bytes = Vec::with_capacity(kind.len() + image.mime_type.len() + image.data_base64.len() + 2);
        bytes.extend_from_slice(kind.as_bytes());
        bytes.extend_from_slice(SEPARATOR);
        bytes.extend_from_slice(image.mime_type.as_bytes());
        bytes.extend_from_slice(SEPARATOR);
        bytes.extend_from_slice(image.data_base64.as_bytes());
        Revision::of_bytes(&bytes)
    }

    /// Cached value of type `T`, if present
    pub async fn get<T: Clone + Send + Sync + 'static>(&self, key: &Revision) -> Option<T> {
        self.inner
            .get(key)
            .await
            .and_then(|value| value.downcast_ref::<T>().cloned())
    }

    pub async fn insert<T: Send + Sync + 'static>(&self, key: Revision, value: T) {
        self.inner.insert(key, Arc::new(value)).await;
    }

    /// Cached value, or compute, store and return it. Errors are not cached.
    ///
    /// # Errors
    /// Returns the error from `compute`
    pub async fn try_get_or_insert_with<T, E, F, Fut>(&self, key: Revision, compute: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get::<T>(&key).await {
            tracing::debug!(key = %key.short(), "Analysis cache hit");
            return Ok(hit);
        }
        let value = compute().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Approximate number of entries
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new(256, Duration::from_secs(3600))
    }
}
