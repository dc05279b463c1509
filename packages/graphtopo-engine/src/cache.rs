//! Result cache with TTL and generational eviction
//!
//! The in-memory tier is authoritative for capacity and eviction; an
//! optional backend tier (shared across processes) is consulted on miss
//! and written through on store. Backend failures degrade to a cache
//! miss, they never fail the request.
//!
//! Eviction runs when capacity is exceeded: expired entries first, then
//! the oldest half of what remains.

use crate::aggregate::AggregatedResult;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::fingerprint::Fingerprint;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Durable second tier behind the in-memory cache
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn load(&self, key: &Fingerprint) -> Result<Option<Vec<u8>>>;
    async fn store(&self, key: &Fingerprint, bytes: Vec<u8>, ttl_seconds: u64) -> Result<()>;
}

/// Wire form of a backend entry; TTL is re-checked client-side so a
/// backend without native expiry still honors it
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    payload: AggregatedResult,
    created_at_ms: i64,
    ttl_seconds: u64,
}

/// Process-local backend, used in tests and single-node deployments
#[derive(Debug, Default)]
pub struct MemoryBackend {
    blobs: DashMap<Fingerprint, Vec<u8>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn load(&self, key: &Fingerprint) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.get(key).map(|b| b.value().clone()))
    }

    async fn store(&self, key: &Fingerprint, bytes: Vec<u8>, _ttl_seconds: u64) -> Result<()> {
        self.blobs.insert(*key, bytes);
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct CacheEntry {
    pub(crate) payload: AggregatedResult,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) ttl_seconds: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        (now - self.created_at).num_milliseconds() > self.ttl_seconds as i64 * 1000
    }
}

/// Counters exposed for operational visibility
#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    backend_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub backend_errors: u64,
}

pub struct CacheStore {
    entries: DashMap<Fingerprint, CacheEntry>,
    capacity: usize,
    ttl_seconds: u64,
    backend: Option<Arc<dyn CacheBackend>>,
    /// Serializes eviction sweeps; lookups and inserts stay lock-free
    sweep_lock: Mutex<()>,
    counters: CacheCounters,
}

impl CacheStore {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: config.cache_capacity,
            ttl_seconds: config.cache_ttl_seconds,
            backend: None,
            sweep_lock: Mutex::new(()),
            counters: CacheCounters::default(),
        }
    }

    pub fn with_backend(config: &EngineConfig, backend: Arc<dyn CacheBackend>) -> Self {
        let mut store = Self::new(config);
        store.backend = Some(backend);
        store
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            backend_errors: self.counters.backend_errors.load(Ordering::Relaxed),
        }
    }

    pub async fn get(&self, key: &Fingerprint) -> Option<AggregatedResult> {
        let now = Utc::now();

        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.payload.clone());
            }
        }
        // Expired entries are dropped lazily on access
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));

        if let Some(payload) = self.load_from_backend(key, now).await {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Some(payload);
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub async fn put(&self, key: Fingerprint, payload: AggregatedResult) {
        let now = Utc::now();
        self.entries.insert(
            key,
            CacheEntry {
                payload: payload.clone(),
                created_at: now,
                ttl_seconds: self.ttl_seconds,
            },
        );

        if self.entries.len() > self.capacity {
            self.sweep();
        }

        if let Some(backend) = &self.backend {
            let stored = StoredEntry {
                payload,
                created_at_ms: now.timestamp_millis(),
                ttl_seconds: self.ttl_seconds,
            };
            match bincode::serialize(&stored) {
                Ok(bytes) => {
                    if let Err(e) = backend.store(&key, bytes, self.ttl_seconds).await {
                        self.counters.backend_errors.fetch_add(1, Ordering::Relaxed);
                        warn!(key = %key, error = %e, "Cache backend store failed");
                    }
                }
                Err(e) => {
                    self.counters.backend_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(key = %key, error = %e, "Cache entry serialization failed");
                }
            }
        }
    }

    /// Administrative reset; counters are preserved
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop all expired entries, returning how many were removed
    pub fn evict_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.counters
                .evictions
                .fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, "Evicted expired cache entries");
        }
        removed
    }

    async fn load_from_backend(
        &self,
        key: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Option<AggregatedResult> {
        let backend = self.backend.as_ref()?;
        let bytes = match backend.load(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                self.counters.backend_errors.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, error = %e, "Cache backend load failed");
                return None;
            }
        };

        let stored: StoredEntry = match bincode::deserialize(&bytes) {
            Ok(stored) => stored,
            Err(e) => {
                self.counters.backend_errors.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, error = %e, "Cache entry deserialization failed");
                return None;
            }
        };

        // The backend may outlive the TTL; re-check before trusting it
        let age_ms = now.timestamp_millis() - stored.created_at_ms;
        if age_ms > stored.ttl_seconds as i64 * 1000 {
            return None;
        }

        let created_at = DateTime::from_timestamp_millis(stored.created_at_ms)?;
        self.entries.insert(
            *key,
            CacheEntry {
                payload: stored.payload.clone(),
                created_at,
                ttl_seconds: stored.ttl_seconds,
            },
        );
        Some(stored.payload)
    }

    /// Capacity sweep: expired first, then the oldest half of the rest
    fn sweep(&self) {
        let _guard = self.sweep_lock.lock();
        if self.entries.len() <= self.capacity {
            return;
        }

        self.evict_expired();
        if self.entries.len() <= self.capacity {
            return;
        }

        let mut by_age: Vec<(Fingerprint, DateTime<Utc>)> = self
            .entries
            .iter()
            .map(|e| (*e.key(), e.created_at))
            .collect();
        by_age.sort_by_key(|(_, created_at)| *created_at);

        let drop_count = by_age.len() / 2;
        for (key, _) in by_age.into_iter().take(drop_count) {
            self.entries.remove(&key);
        }
        self.counters
            .evictions
            .fetch_add(drop_count as u64, Ordering::Relaxed);
        warn!(
            dropped = drop_count,
            remaining = self.entries.len(),
            "Cache over capacity, dropped oldest generation"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use chrono::Duration as ChronoDuration;
    use pretty_assertions::assert_eq;

    fn key(n: u8) -> Fingerprint {
        let mut bytes = [0u8; 32];
        bytes[0] = n;
        Fingerprint(bytes)
    }

    fn payload(nodes: usize) -> AggregatedResult {
        AggregatedResult {
            node_count: nodes,
            ..AggregatedResult::empty()
        }
    }

    fn config(capacity: usize, ttl: u64) -> EngineConfig {
        EngineConfig {
            cache_capacity: capacity,
            cache_ttl_seconds: ttl,
            ..Default::default()
        }
    }

    fn backdate(store: &CacheStore, key: &Fingerprint, seconds: i64) {
        let mut entry = store.entries.get_mut(key).unwrap();
        entry.created_at = entry.created_at - ChronoDuration::seconds(seconds);
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = CacheStore::new(&config(10, 3600));
        store.put(key(1), payload(5)).await;

        let hit = store.get(&key(1)).await.unwrap();
        assert_eq!(hit.node_count, 5);
        assert!(store.get(&key(2)).await.is_none());

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let store = CacheStore::new(&config(10, 60));
        store.put(key(1), payload(5)).await;
        backdate(&store, &key(1), 120);

        assert!(store.get(&key(1)).await.is_none());
        assert_eq!(store.len(), 0, "expired entry dropped on access");
    }

    #[tokio::test]
    async fn test_evict_expired_keeps_fresh_entries() {
        let store = CacheStore::new(&config(10, 60));
        store.put(key(1), payload(1)).await;
        store.put(key(2), payload(2)).await;
        backdate(&store, &key(1), 120);

        assert_eq!(store.evict_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(&key(2)).await.is_some());
    }

    #[tokio::test]
    async fn test_capacity_sweep_drops_oldest_half() {
        let store = CacheStore::new(&config(4, 3600));
        for n in 1..=4u8 {
            store.put(key(n), payload(n as usize)).await;
            // Distinct ages, oldest first
            backdate(&store, &key(n), (10 - n) as i64);
        }
        store.put(key(5), payload(5)).await;

        assert!(store.len() <= 4);
        // Newest entry always survives the sweep
        assert!(store.get(&key(5)).await.is_some());
        assert!(store.get(&key(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_capacity_sweep_drops_expired_before_fresh() {
        let store = CacheStore::new(&config(4, 60));
        // Three fresh entries, oldest first (50s, 40s, 30s old; TTL 60s)
        for n in 1..=3u8 {
            store.put(key(n), payload(n as usize)).await;
            backdate(&store, &key(n), 60 - n as i64 * 10);
        }
        // Expired entry
        store.put(key(4), payload(4)).await;
        backdate(&store, &key(4), 120);
        // Fifth insert exceeds capacity and triggers the sweep
        store.put(key(5), payload(5)).await;

        assert_eq!(store.len(), 4);
        assert!(
            store.get(&key(4)).await.is_none(),
            "expired entry must be evicted first"
        );
        // Removing the expired entry was enough; even the oldest fresh
        // entry survives
        assert!(store.get(&key(1)).await.is_some());
        assert!(store.get(&key(5)).await.is_some());
    }

    #[tokio::test]
    async fn test_clear_empties_store() {
        let store = CacheStore::new(&config(10, 3600));
        store.put(key(1), payload(1)).await;
        store.put(key(2), payload(2)).await;

        store.clear();
        assert!(store.is_empty());
        assert!(store.get(&key(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_backend_fallback_populates_memory() {
        let backend = Arc::new(MemoryBackend::new());
        let writer = CacheStore::with_backend(&config(10, 3600), backend.clone());
        writer.put(key(1), payload(7)).await;

        // Second store shares only the backend
        let reader = CacheStore::with_backend(&config(10, 3600), backend);
        let hit = reader.get(&key(1)).await.unwrap();
        assert_eq!(hit.node_count, 7);
        assert_eq!(reader.len(), 1, "backend hit promoted to memory");
    }

    struct FailingBackend;

    #[async_trait]
    impl CacheBackend for FailingBackend {
        async fn load(&self, _key: &Fingerprint) -> Result<Option<Vec<u8>>> {
            Err(EngineError::Cache("connection refused".into()))
        }

        async fn store(&self, _key: &Fingerprint, _b: Vec<u8>, _ttl: u64) -> Result<()> {
            Err(EngineError::Cache("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_backend_failure_degrades_to_miss() {
        let store = CacheStore::with_backend(&config(10, 3600), Arc::new(FailingBackend));
        store.put(key(1), payload(1)).await;

        // In-memory tier still works despite the backend failing
        assert!(store.get(&key(1)).await.is_some());
        assert!(store.get(&key(2)).await.is_none());

        let stats = store.stats();
        assert!(stats.backend_errors >= 2);
    }

    #[tokio::test]
    async fn test_backend_ttl_rechecked_on_load() {
        let backend = Arc::new(MemoryBackend::new());
        let stored = StoredEntry {
            payload: payload(3),
            created_at_ms: Utc::now().timestamp_millis() - 120_000,
            ttl_seconds: 60,
        };
        backend
            .store(&key(1), bincode::serialize(&stored).unwrap(), 60)
            .await
            .unwrap();

        let store = CacheStore::with_backend(&config(10, 3600), backend);
        assert!(store.get(&key(1)).await.is_none());
    }
}
