//! Default in-memory backend
//!
//! Bounded map that evicts the oldest inserted key once `size_limit` is
//! exceeded. Overwriting a key keeps its original position in the eviction
//! order. Entries with a TTL are dropped lazily when read after expiry.

use crate::backend::CacheBackend;
use crate::error::Result;
use async_trait::async_trait;
use log::trace;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Default number of entries kept by [`MemoryBackend::default`]
pub const DEFAULT_SIZE_LIMIT: usize = 1_000_000;

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
    /// Insertion sequence, matches the slot in `Store::order`
    seq: u64,
}

#[derive(Debug, Default)]
struct Store {
    entries: HashMap<String, Entry>,
    /// Insertion order. Slots whose `seq` no longer matches the entry are stale.
    order: VecDeque<(u64, String)>,
    next_seq: u64,
}

impl Store {
    fn insert(&mut self, key: &str, value: String, expires_at: Option<Instant>) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.value = value;
            entry.expires_at = expires_at;
            return;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.push_back((seq, key.to_string()));
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at,
                seq,
            },
        );
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.compact();
    }

    /// Drop stale slots once they outnumber live entries
    fn compact(&mut self) {
        if self.order.len() <= 2 * self.entries.len() + 16 {
            return;
        }
        let entries = &self.entries;
        self.order
            .retain(|(seq, key)| entries.get(key).is_some_and(|e| e.seq == *seq));
    }

    fn evict_to(&mut self, size_limit: usize) {
        while self.entries.len() > size_limit {
            let Some((seq, key)) = self.order.pop_front() else {
                break;
            };
            if self.entries.get(&key).is_some_and(|e| e.seq == seq) {
                trace!("Evicting cache entry {}", key);
                self.entries.remove(&key);
            }
        }
    }
}

/// Thread-safe bounded in-memory cache backend
#[derive(Debug)]
pub struct MemoryBackend {
    store: Mutex<Store>,
    size_limit: usize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::with_size_limit(DEFAULT_SIZE_LIMIT)
    }
}

impl MemoryBackend {
    /// Create a backend holding at most `size_limit` entries (at least one)
    pub fn with_size_limit(size_limit: usize) -> Self {
        Self {
            store: Mutex::new(Store::default()),
            size_limit: size_limit.max(1),
        }
    }

    pub fn size_limit(&self) -> usize {
        self.size_limit
    }

    /// Number of stored entries, including expired ones not yet read
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<String> {
        let mut store = self.lock();
        let expired = store
            .entries
            .get(key)
            .map(|e| e.expires_at.is_some_and(|at| at <= now))?;

        if expired {
            trace!("Cache entry {} expired", key);
            store.remove(key);
            return None;
        }

        store.entries.get(key).map(|e| e.value.clone())
    }

    fn set_at(&self, key: &str, value: String, ttl: Option<Duration>, now: Instant) {
        let expires_at = ttl.map(|ttl| now + ttl);
        let mut store = self.lock();
        store.insert(key, value, expires_at);
        store.evict_to(self.size_limit);
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_at(key, Instant::now()))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        self.set_at(key, value, ttl, Instant::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_limit_keeps_latest_entries() {
        let backend = MemoryBackend::with_size_limit(10);
        let now = Instant::now();
        for i in 0..100 {
            backend.set_at(&i.to_string(), (i + 1).to_string(), None, now);
        }

        assert_eq!(backend.len(), 10);
        assert_eq!(backend.get_at("0", now), None);
        assert_eq!(backend.get_at("89", now), None);
        assert_eq!(backend.get_at("90", now).as_deref(), Some("91"));
        assert_eq!(backend.get_at("99", now).as_deref(), Some("100"));
    }

    #[test]
    fn test_overwrite_keeps_insertion_position() {
        let backend = MemoryBackend::with_size_limit(2);
        let now = Instant::now();
        backend.set_at("a", "1".into(), None, now);
        backend.set_at("b", "2".into(), None, now);
        backend.set_at("a", "3".into(), None, now);
        backend.set_at("c", "4".into(), None, now);

        // "a" was inserted first, so it goes first even though it was rewritten
        assert_eq!(backend.get_at("a", now), None);
        assert_eq!(backend.get_at("b", now).as_deref(), Some("2"));
        assert_eq!(backend.get_at("c", now).as_deref(), Some("4"));
    }

    #[test]
    fn test_ttl_expiry() {
        let backend = MemoryBackend::default();
        let now = Instant::now();
        backend.set_at("k", "v".into(), Some(Duration::from_secs(60)), now);

        assert_eq!(
            backend.get_at("k", now + Duration::from_secs(59)).as_deref(),
            Some("v")
        );
        assert_eq!(backend.get_at("k", now + Duration::from_secs(60)), None);
        assert!(backend.is_empty());
    }

    #[test]
    fn test_reinserted_key_is_not_evicted_by_stale_slot() {
        let backend = MemoryBackend::with_size_limit(2);
        let now = Instant::now();
        backend.set_at("a", "1".into(), Some(Duration::from_secs(1)), now);
        let later = now + Duration::from_secs(5);
        assert_eq!(backend.get_at("a", later), None);

        backend.set_at("b", "2".into(), None, later);
        backend.set_at("a", "3".into(), None, later);
        backend.set_at("c", "4".into(), None, later);

        assert_eq!(backend.get_at("b", later), None);
        assert_eq!(backend.get_at("a", later).as_deref(), Some("3"));
        assert_eq!(backend.get_at("c", later).as_deref(), Some("4"));
    }

    #[test]
    fn test_expired_rewrites_do_not_grow_order() {
        let backend = MemoryBackend::with_size_limit(1000);
        let mut now = Instant::now();
        for _ in 0..10_000 {
            backend.set_at("k", "v".into(), Some(Duration::from_secs(1)), now);
            now += Duration::from_secs(2);
            assert_eq!(backend.get_at("k", now), None);
        }

        let store = backend.lock();
        assert!(store.entries.is_empty());
        assert!(store.order.len() <= 2 * store.entries.len() + 16);
    }

    #[test]
    fn test_zero_size_limit_is_clamped() {
        assert_eq!(MemoryBackend::with_size_limit(0).size_limit(), 1);
    }

    #[tokio::test]
    async fn test_backend_trait_roundtrip() {
        let backend = MemoryBackend::default();
        assert_eq!(backend.get("a").await.unwrap(), None);
        backend.set("a", "1".into(), None).await.unwrap();
        assert_eq!(backend.get("a").await.unwrap().as_deref(), Some("1"));
    }
}
