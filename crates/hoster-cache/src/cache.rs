//! The response cache
//!
//! [`ResponseCache`] is the single point of indirection between code that
//! issues API requests and whatever store holds the responses. It starts out
//! backed by a [`MemoryBackend`] and can be pointed at another backend at any
//! time with [`ResponseCache::configure`]; the most recent call wins.
//!
//! The cache does no key normalization. Callers must build a key that
//! identifies the logical request, including the credential scope when the
//! response depends on who asks.

use crate::backend::{CacheBackend, FnBackend};
use crate::error::{BackendError, CacheError, Result};
use crate::item::{CacheItem, CacheItemPatch};
use crate::memory::{MemoryBackend, DEFAULT_SIZE_LIMIT};
use log::{debug, info};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Hit/miss counters of a [`ResponseCache`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
}

impl CacheStats {
    /// Share of lookups answered from the cache, 0.0 when nothing was looked up
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

/// Pluggable cache for API responses
///
/// Share it behind an `Arc` with every client that issues requests.
///
/// # Example
///
/// ```rust
/// use hoster_cache::{CacheItem, ResponseCache};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), hoster_cache::CacheError> {
/// let cache = ResponseCache::default();
/// let item = cache
///     .fetch_or_compute("github:anonymous:GET /repos/rust-lang/rust", || async {
///         Ok::<_, hoster_cache::CacheError>(CacheItem::new(json!({"id": 724712})))
///     })
///     .await?;
/// assert_eq!(item.data["id"], 724712);
/// # Ok(())
/// # }
/// ```
pub struct ResponseCache {
    backend: RwLock<Arc<dyn CacheBackend>>,
    custom: AtomicBool,
    default_ttl: Option<Duration>,
    counters: Counters,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(None)
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("custom", &self.is_custom())
            .field("default_ttl", &self.default_ttl)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl ResponseCache {
    /// Create a cache on the default in-memory backend
    ///
    /// `default_ttl` is passed to the backend with every write.
    pub fn new(default_ttl: Option<Duration>) -> Self {
        Self::with_size_limit(DEFAULT_SIZE_LIMIT, default_ttl)
    }

    /// Create a cache on the default in-memory backend holding at most
    /// `size_limit` entries
    ///
    /// The backend still counts as the default one for [`Self::is_custom`].
    pub fn with_size_limit(size_limit: usize, default_ttl: Option<Duration>) -> Self {
        Self {
            backend: RwLock::new(Arc::new(MemoryBackend::with_size_limit(size_limit))),
            custom: AtomicBool::new(false),
            default_ttl,
            counters: Counters::default(),
        }
    }

    /// Create a cache that starts on `backend` instead of the default
    pub fn with_backend(backend: Arc<dyn CacheBackend>, default_ttl: Option<Duration>) -> Self {
        let cache = Self::new(default_ttl);
        cache.configure(backend);
        cache
    }

    /// Route all further reads and writes to `backend`
    ///
    /// Entries of the previous backend are not migrated.
    pub fn configure(&self, backend: Arc<dyn CacheBackend>) {
        *self.backend.write().unwrap_or_else(PoisonError::into_inner) = backend;
        self.custom.store(true, Ordering::SeqCst);
        info!("Response cache backend reconfigured");
    }

    /// Route all further reads and writes to a pair of functions
    ///
    /// `getter` receives a key and returns the stored string or `None`.
    /// `setter` receives a key and the string to store.
    pub fn configure_with<G, S>(&self, getter: G, setter: S)
    where
        G: Fn(&str) -> Result<Option<String>, BackendError> + Send + Sync + 'static,
        S: Fn(&str, String) -> Result<(), BackendError> + Send + Sync + 'static,
    {
        self.configure(Arc::new(FnBackend::new(getter, setter)));
    }

    /// Whether a backend other than the built-in default is active
    pub fn is_custom(&self) -> bool {
        self.custom.load(Ordering::SeqCst)
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
        }
    }

    fn backend(&self) -> Arc<dyn CacheBackend> {
        Arc::clone(&self.backend.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Look up `key`
    ///
    /// Returns `Ok(None)` on a miss. A stored value that is not a valid item
    /// also counts as a miss so the caller refetches it. Backend failures are
    /// returned as they are.
    pub async fn get(&self, key: &str) -> Result<Option<CacheItem>> {
        let raw = self.backend().get(key).await?;

        let item = raw.and_then(|raw| match CacheItem::from_json(&raw) {
            Ok(item) => Some(item),
            Err(e) => {
                debug!("Discarding invalid cache entry {}: {}", key, e);
                None
            }
        });

        if item.is_some() {
            debug!("Cache HIT for {}", key);
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            debug!("Cache MISS for {}", key);
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
        }

        Ok(item)
    }

    /// Store `item` under `key`, replacing whatever was there
    pub async fn set(&self, key: &str, item: &CacheItem) -> Result<()> {
        let raw = item.to_json()?;
        self.backend().set(key, raw, self.default_ttl).await?;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Overlay `patch` on the stored item (or on a default item) and store it
    pub async fn update(&self, key: &str, patch: CacheItemPatch) -> Result<CacheItem> {
        let base = self.get(key).await?.unwrap_or_default();
        let item = patch.apply(base);
        self.set(key, &item).await?;
        Ok(item)
    }

    /// Return the cached item for `key`, or run `compute` and cache its result
    ///
    /// On a hit `compute` is not called. On a miss it is called exactly once
    /// and its result is stored before being returned. Errors from `compute`
    /// are returned untouched and nothing is stored.
    pub async fn fetch_or_compute<F, Fut, E>(&self, key: &str, compute: F) -> Result<CacheItem, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CacheItem, E>>,
        E: From<CacheError>,
    {
        if let Some(item) = self.get(key).await? {
            return Ok(item);
        }

        let item = compute().await?;
        self.set(key, &item).await?;
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        init_logger();
        let cache = ResponseCache::default();

        assert_eq!(cache.get("K").await.unwrap(), None);

        let item = CacheItem::new(json!({"name": "IGitt"}));
        cache.set("K", &item).await.unwrap();
        assert_eq!(cache.get("K").await.unwrap(), Some(item));
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let cache = ResponseCache::default();
        cache.set("K", &CacheItem::new(json!(1))).await.unwrap();
        cache.set("K", &CacheItem::new(json!(2))).await.unwrap();

        let item = cache.get("K").await.unwrap().unwrap();
        assert_eq!(item.data, json!(2));
    }

    #[tokio::test]
    async fn test_fetch_or_compute_skips_compute_on_hit() {
        let cache = ResponseCache::default();
        let stored = CacheItem::new(json!("cached"));
        cache.set("K", &stored).await.unwrap();

        let calls = AtomicUsize::new(0);
        let item = cache
            .fetch_or_compute("K", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>(CacheItem::new(json!("fresh")))
            })
            .await
            .unwrap();

        assert_eq!(item, stored);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_or_compute_populates_on_miss() {
        let cache = ResponseCache::default();
        let calls = AtomicUsize::new(0);

        let item = cache
            .fetch_or_compute("K", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>(CacheItem::new(json!("fresh")))
            })
            .await
            .unwrap();

        assert_eq!(item.data, json!("fresh"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get("K").await.unwrap(), Some(item));
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                writes: 1
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_or_compute_does_not_store_errors() {
        #[derive(Debug)]
        enum FetchError {
            Network,
            Cache(CacheError),
        }
        impl From<CacheError> for FetchError {
            fn from(e: CacheError) -> Self {
                FetchError::Cache(e)
            }
        }

        let cache = ResponseCache::default();
        let result = cache
            .fetch_or_compute("K", || async { Err::<CacheItem, _>(FetchError::Network) })
            .await;

        assert!(matches!(result, Err(FetchError::Network)));
        assert_eq!(cache.get("K").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_configure_routes_to_custom_backend() {
        let cache = ResponseCache::default();
        cache
            .set("a", &CacheItem::new(json!("default")))
            .await
            .unwrap();
        assert!(!cache.is_custom());

        let store: Arc<Mutex<HashMap<String, String>>> = Arc::default();
        let read = Arc::clone(&store);
        let write = Arc::clone(&store);
        cache.configure_with(
            move |key| Ok(read.lock().unwrap().get(key).cloned()),
            move |key, value| {
                write.lock().unwrap().insert(key.to_string(), value);
                Ok(())
            },
        );
        assert!(cache.is_custom());

        // The default backend's entry is not visible anymore
        assert_eq!(cache.get("a").await.unwrap(), None);

        cache.set("b", &CacheItem::new(json!("custom"))).await.unwrap();
        assert!(store.lock().unwrap().contains_key("b"));
        assert_eq!(
            cache.get("b").await.unwrap().map(|item| item.data),
            Some(json!("custom"))
        );
    }

    #[tokio::test]
    async fn test_latest_configure_wins() {
        let cache = ResponseCache::default();
        let first = Arc::new(MemoryBackend::default());
        let second = Arc::new(MemoryBackend::default());

        cache.configure(first.clone());
        cache.configure(second.clone());
        cache.set("k", &CacheItem::default()).await.unwrap();

        assert!(first.is_empty());
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_configuration_default() {
        let cache = ResponseCache::default();
        cache.set("a", &CacheItem::new(json!(1))).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap().unwrap().data, json!(1));
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let cache = ResponseCache::default();
        cache.configure_with(|_| Err("redis down".into()), |_, _| Err("redis down".into()));

        let err = cache.get("k").await.unwrap_err();
        assert!(matches!(err, CacheError::Backend(_)));

        let err = cache.set("k", &CacheItem::default()).await.unwrap_err();
        assert!(matches!(err, CacheError::Backend(_)));
    }

    #[tokio::test]
    async fn test_invalid_entry_counts_as_miss() {
        let backend = Arc::new(MemoryBackend::default());
        backend
            .set("k", r#"{"entityTag": 10}"#.to_string(), None)
            .await
            .unwrap();
        backend
            .set("garbage", "not json".to_string(), None)
            .await
            .unwrap();

        let cache = ResponseCache::with_backend(backend, None);
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert_eq!(cache.get("garbage").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_marks_webhook() {
        let cache = ResponseCache::default();
        let item = CacheItem::new(json!({"state": "open"})).with_entity_tag("etag");
        cache.set("issue", &item).await.unwrap();

        let received = chrono::Utc::now();
        let updated = cache
            .update("issue", CacheItemPatch::webhook_received(received))
            .await
            .unwrap();

        assert!(updated.from_webhook);
        assert_eq!(updated.data, json!({"state": "open"}));
        let stored = cache.get("issue").await.unwrap().unwrap();
        assert!(stored.from_webhook);
        assert_eq!(stored.entity_tag.as_deref(), Some("etag"));
    }

    #[tokio::test]
    async fn test_update_creates_missing_entry() {
        let cache = ResponseCache::default();
        let patch = CacheItemPatch {
            data: Some(json!([1, 2, 3])),
            ..CacheItemPatch::default()
        };

        cache.update("new", patch).await.unwrap();
        assert_eq!(cache.get("new").await.unwrap().unwrap().data, json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn test_default_ttl_expires_entries() {
        let cache = ResponseCache::new(Some(Duration::ZERO));
        cache.set("k", &CacheItem::default()).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[test]
    fn test_hit_rate() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            writes: 1,
        };
        assert_eq!(stats.hit_rate(), 0.75);
    }
}
