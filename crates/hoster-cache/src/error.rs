//! Cache error types

use thiserror::Error;

/// Boxed error raised by a substituted cache backend.
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while reading from or writing to the cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The active backend failed. The original error is kept untouched.
    #[error("cache backend failed: {0}")]
    Backend(#[source] BackendError),

    /// A cache item could not be encoded or decoded.
    #[error("cache item serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A cache item field has the wrong type.
    #[error("'{field}' field should be {expected}, not {found}")]
    InvalidType {
        field: &'static str,
        expected: &'static str,
        found: String,
    },

    /// A cache item field has the right type but an invalid value.
    #[error("'{field}' field has an invalid value: {value}")]
    InvalidValue { field: &'static str, value: String },

    /// The file backend could not read or write its store.
    #[error("cache file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// Wrap any backend failure.
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<BackendError>,
    {
        CacheError::Backend(err.into())
    }
}

/// Result alias for cache operations.
pub type Result<T, E = CacheError> = std::result::Result<T, E>;
