//! Cache backend trait
//!
//! A backend is the concrete key/value store behind [`crate::ResponseCache`].
//! It stores opaque strings and knows nothing about hosters or items.

use crate::error::{BackendError, CacheError, Result};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Key/value store used by the response cache
///
/// Implementations must be `Send + Sync`: the cache hands the same backend
/// to every task that issues requests. Any locking needed for concurrent
/// access is the backend's own business.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Look up `key`. A miss is `Ok(None)`, never an error.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// Backends without expiry support may ignore `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()>;
}

type Getter = dyn Fn(&str) -> Result<Option<String>, BackendError> + Send + Sync;
type Setter = dyn Fn(&str, String) -> Result<(), BackendError> + Send + Sync;

/// Backend built from a pair of host-supplied functions
///
/// This is what [`crate::ResponseCache::configure_with`] installs. Errors
/// returned by either function reach the caller as [`CacheError::Backend`].
pub struct FnBackend {
    getter: Box<Getter>,
    setter: Box<Setter>,
}

impl FnBackend {
    pub fn new<G, S>(getter: G, setter: S) -> Self
    where
        G: Fn(&str) -> Result<Option<String>, BackendError> + Send + Sync + 'static,
        S: Fn(&str, String) -> Result<(), BackendError> + Send + Sync + 'static,
    {
        Self {
            getter: Box::new(getter),
            setter: Box::new(setter),
        }
    }
}

impl fmt::Debug for FnBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnBackend").finish_non_exhaustive()
    }
}

#[async_trait]
impl CacheBackend for FnBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (self.getter)(key).map_err(CacheError::Backend)
    }

    async fn set(&self, key: &str, value: String, _ttl: Option<Duration>) -> Result<()> {
        (self.setter)(key, value).map_err(CacheError::Backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_fn_backend_routes_calls() {
        let store: Arc<Mutex<HashMap<String, String>>> = Arc::default();
        let read = Arc::clone(&store);
        let write = Arc::clone(&store);

        let backend = FnBackend::new(
            move |key| Ok(read.lock().unwrap().get(key).cloned()),
            move |key, value| {
                write.lock().unwrap().insert(key.to_string(), value);
                Ok(())
            },
        );

        assert_eq!(backend.get("k").await.unwrap(), None);
        backend.set("k", "v".to_string(), None).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fn_backend_passes_errors_through() {
        let backend = FnBackend::new(
            |_| Err("connection refused".into()),
            |_, _| Err("read only".into()),
        );

        let err = backend.get("k").await.unwrap_err();
        assert!(matches!(&err, CacheError::Backend(inner) if inner.to_string() == "connection refused"));

        let err = backend.set("k", String::new(), None).await.unwrap_err();
        assert!(matches!(&err, CacheError::Backend(inner) if inner.to_string() == "read only"));
    }
}
