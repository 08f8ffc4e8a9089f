//! JSON file backend
//!
//! Keeps the whole store in memory and writes it through to a single JSON
//! file on every `set`, so cached responses survive process restarts.

use crate::backend::CacheBackend;
use crate::error::{CacheError, Result};
use crate::memory::DEFAULT_SIZE_LIMIT;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEntry {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    /// Insertion sequence, lowest is evicted first
    #[serde(default)]
    seq: u64,
}

impl FileEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileStore {
    entries: HashMap<String, FileEntry>,
    #[serde(skip)]
    next_seq: u64,
}

impl FileStore {
    fn insert(&mut self, key: &str, value: String, expires_at: Option<DateTime<Utc>>) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.value = value;
            entry.expires_at = expires_at;
            return;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            key.to_string(),
            FileEntry {
                value,
                expires_at,
                seq,
            },
        );
    }

    fn evict_to(&mut self, size_limit: usize) {
        while self.entries.len() > size_limit {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.seq)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            trace!("Evicting cache entry {}", oldest);
            self.entries.remove(&oldest);
        }
    }
}

/// Cache backend persisted to a JSON file
///
/// Holds at most `size_limit` entries and evicts the oldest inserted key
/// first, like [`crate::MemoryBackend`]. Writes run on tokio's blocking pool,
/// so `set` must be called from within a tokio runtime.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    store: Mutex<FileStore>,
    size_limit: usize,
    /// Serializes file writes so an older snapshot never replaces a newer one
    write_lock: tokio::sync::Mutex<()>,
}

impl FileBackend {
    /// Open the store at `path`, creating parent directories as needed.
    ///
    /// A missing file starts an empty store. A file that cannot be parsed is
    /// logged and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut store = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<FileStore>(&content) {
                Ok(store) => {
                    debug!(
                        "Loaded {} cache entries from {}",
                        store.entries.len(),
                        path.display()
                    );
                    store
                }
                Err(e) => {
                    warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                    FileStore::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileStore::default(),
            Err(e) => return Err(e.into()),
        };
        store.next_seq = store.entries.values().map(|e| e.seq + 1).max().unwrap_or(0);

        Ok(Self {
            path,
            store: Mutex::new(store),
            size_limit: DEFAULT_SIZE_LIMIT,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Keep at most `size_limit` entries (at least one)
    ///
    /// Entries loaded from disk above the limit are dropped on the next write.
    pub fn with_size_limit(mut self, size_limit: usize) -> Self {
        self.size_limit = size_limit.max(1);
        self
    }

    pub fn size_limit(&self) -> usize {
        self.size_limit
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored entries, including expired ones not yet pruned
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FileStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn write_atomic(path: &Path, json: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)
}

#[async_trait]
impl CacheBackend for FileBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let store = self.lock();
        Ok(store
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(Utc::now()))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        let now = Utc::now();
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| now + ttl);

        let _writing = self.write_lock.lock().await;
        let json = {
            let mut store = self.lock();
            store.entries.retain(|_, entry| !entry.is_expired(now));
            store.insert(key, value, expires_at);
            store.evict_to(self.size_limit);
            serde_json::to_string(&*store)?
        };

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &json))
            .await
            .map_err(CacheError::backend)??;
        Ok(())
    }
}
