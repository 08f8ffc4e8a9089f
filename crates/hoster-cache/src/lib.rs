//! Pluggable response cache for git hosting API clients
//!
//! Adapters ask the cache before they hit the network and write responses
//! back on a miss, which keeps repeated reads off the hoster's rate limit.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                ResponseCache                  │
//! │  - get() / set() / update()                   │
//! │  - fetch_or_compute()                         │
//! │  - configure() / configure_with()             │
//! └──────────────────────────────────────────────┘
//!                        │
//!                        ▼
//!              ┌───────────────────┐
//!              │ CacheBackend trait│
//!              └───────────────────┘
//!        ┌───────────┼──────────────┐
//!        ▼           ▼              ▼
//! ┌─────────────┐ ┌───────────┐ ┌───────────┐
//! │MemoryBackend│ │FileBackend│ │ FnBackend │
//! │ (default)   │ │ (JSON)    │ │ (host fns)│
//! └─────────────┘ └───────────┘ └───────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use hoster_cache::{CacheItem, ResponseCache};
//! use std::collections::HashMap;
//! use std::sync::{Arc, Mutex};
//!
//! # async fn example() -> Result<(), hoster_cache::CacheError> {
//! let cache = ResponseCache::default();
//!
//! // Swap in the application's own store once it is ready
//! let store: Arc<Mutex<HashMap<String, String>>> = Arc::default();
//! let (read, write) = (Arc::clone(&store), Arc::clone(&store));
//! cache.configure_with(
//!     move |key| Ok(read.lock().unwrap().get(key).cloned()),
//!     move |key, value| {
//!         write.lock().unwrap().insert(key.to_string(), value);
//!         Ok(())
//!     },
//! );
//!
//! cache.set("key", &CacheItem::default()).await?;
//! assert!(cache.get("key").await?.is_some());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cache;
pub mod error;
pub mod file;
pub mod item;
pub mod memory;

pub use backend::{CacheBackend, FnBackend};
pub use cache::{CacheStats, ResponseCache};
pub use error::{BackendError, CacheError};
pub use file::FileBackend;
pub use item::{CacheItem, CacheItemPatch, LAST_FETCHED_FORMAT};
pub use memory::{MemoryBackend, DEFAULT_SIZE_LIMIT};
