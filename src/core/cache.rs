use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// A cached value and the moment it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: Instant,
    version: u64,
}

impl<V> CacheEntry<V> {
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

/// Snapshot of the cache state taken before a fetch starts. Writing with a
/// ticket fails if the cache was cleared, or the key rewritten, meanwhile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    epoch: u64,
    version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<String>,
}

struct Inner<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    epoch: u64,
    next_version: u64,
}

impl<K: Eq + Hash, V> Inner<K, V> {
    fn insert(&mut self, key: K, value: V) {
        self.next_version += 1;
        self.entries.insert(
            key,
            CacheEntry {
                value,
                fetched_at: Instant::now(),
                version: self.next_version,
            },
        );
    }

    fn version_of(&self, key: &K) -> u64 {
        self.entries.get(key).map_or(0, |e| e.version)
    }
}

/// Mutex-guarded map with a fixed time-to-live. Expired entries are kept so
/// callers can still serve them as stale.
pub struct TtlCache<K, V> {
    ttl: Duration,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + std::fmt::Debug,
    V: Clone + Send + Sync,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                epoch: 0,
                next_version: 0,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the entry regardless of age.
    pub async fn get(&self, key: &K) -> Option<CacheEntry<V>> {
        let cache = self.inner.lock().await;
        cache.entries.get(key).cloned()
    }

    /// Returns the value only while it is younger than the TTL.
    pub async fn get_fresh(&self, key: &K) -> Option<V> {
        let cache = self.inner.lock().await;
        match cache.entries.get(key) {
            Some(entry) if entry.is_fresh(self.ttl) => {
                debug!("Cache HIT for key: {:?}", key);
                Some(entry.value.clone())
            }
            Some(_) => {
                debug!("Cache entry expired for key: {:?}", key);
                None
            }
            None => {
                debug!("Cache MISS for key: {:?}", key);
                None
            }
        }
    }

    pub async fn ticket(&self, key: &K) -> Ticket {
        let cache = self.inner.lock().await;
        Ticket {
            epoch: cache.epoch,
            version: cache.version_of(key),
        }
    }

    pub async fn put(&self, key: K, value: V) {
        let mut cache = self.inner.lock().await;
        debug!("Cache PUT for key: {:?}", key);
        cache.insert(key, value);
    }

    /// Writes only if nothing touched `key` (and no clear happened) since
    /// `ticket` was taken. Returns whether the write landed.
    pub async fn put_if_current(&self, key: K, value: V, ticket: Ticket) -> bool {
        let mut cache = self.inner.lock().await;
        if cache.epoch != ticket.epoch || cache.version_of(&key) != ticket.version {
            debug!("Dropping late result for key: {:?}", key);
            return false;
        }
        cache.insert(key, value);
        true
    }

    /// Read-modify-write under the lock. Only a clear invalidates the ticket,
    /// so concurrent merges into the same key all land.
    pub async fn merge_if_current<F>(&self, key: K, ticket: Ticket, merge: F) -> Option<V>
    where
        F: FnOnce(Option<&V>) -> V,
    {
        let mut cache = self.inner.lock().await;
        if cache.epoch != ticket.epoch {
            debug!("Dropping late merge for key: {:?}", key);
            return None;
        }
        let merged = merge(cache.entries.get(&key).map(|e| &e.value));
        cache.insert(key, merged.clone());
        Some(merged)
    }

    pub async fn remove(&self, key: &K) {
        let mut cache = self.inner.lock().await;
        cache.entries.remove(key);
        debug!("Cache REMOVE for key: {:?}", key);
    }

    pub async fn clear(&self) {
        let mut cache = self.inner.lock().await;
        cache.entries.clear();
        cache.epoch += 1;
        debug!("Cache CLEAR");
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + std::fmt::Debug + Display,
    V: Clone + Send + Sync,
{
    pub async fn stats(&self) -> CacheStats {
        let cache = self.inner.lock().await;
        let mut keys: Vec<String> = cache.entries.keys().map(|k| k.to_string()).collect();
        keys.sort();
        CacheStats {
            size: keys.len(),
            keys,
        }
    }
}
