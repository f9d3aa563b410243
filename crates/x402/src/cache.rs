//! Generic in-memory TTL cache.
//!
//! Backs the gateway's idempotency receipts and consumed-nonce stores.
//! Reads expire lazily; a periodic sweeper bounds memory for keys that are
//! never read again. The sweeper is a liveness optimization, not a
//! correctness requirement.

use std::hash::Hash;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Keyed store of `(value, absolute-expiry)` safe for concurrent use from
/// many request handlers.
pub struct TtlCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    default_ttl: Duration,
    sweeper: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
            sweeper: Mutex::new(None),
        }
    }

    /// Insert a value with the default TTL, replacing any existing entry.
    pub fn set(&self, key: K, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Insert a value with an explicit TTL override.
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Fetch a live value. Expired entries are deleted on the way out.
    pub fn get(&self, key: &K) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn has(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn delete(&self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Atomically insert `value` if no live entry exists for `key`.
    ///
    /// Returns `true` if this call claimed the key. An expired entry counts
    /// as absent. This is the linearization point for replay protection:
    /// of N concurrent calls with the same key, exactly one returns `true`.
    pub fn insert_if_absent(&self, key: K, value: V) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at > Instant::now() {
                    false
                } else {
                    occupied.insert(CacheEntry {
                        value,
                        expires_at: Instant::now() + self.default_ttl,
                    });
                    true
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry {
                    value,
                    expires_at: Instant::now() + self.default_ttl,
                });
                true
            }
        }
    }

    /// Remove all currently expired entries. Returns how many were removed.
    /// Tolerates concurrent insertions.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// Number of live entries. Sweeps first so the count excludes expired
    /// entries that were never read again.
    pub fn len(&self) -> usize {
        self.sweep();
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Start the once-per-minute background sweeper.
    ///
    /// Holds only a weak reference, so dropping the cache (or calling
    /// [`TtlCache::destroy`]) stops the task; it never keeps the process
    /// alive on shutdown.
    pub fn start_sweeper(cache: &Arc<Self>) {
        Self::start_sweeper_with_interval(cache, Duration::from_secs(60));
    }

    fn start_sweeper_with_interval(cache: &Arc<Self>, period: Duration) {
        let weak: Weak<Self> = Arc::downgrade(cache);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick fires immediately; skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                let swept = cache.sweep();
                if swept > 0 {
                    tracing::debug!(swept, "ttl cache sweep");
                }
            }
        });
        let mut guard = cache.sweeper.lock().expect("sweeper lock poisoned");
        if let Some(old) = guard.replace(handle) {
            old.abort();
        }
    }

    /// Stop the background sweeper deterministically.
    pub fn destroy(&self) {
        if let Some(handle) = self.sweeper.lock().expect("sweeper lock poisoned").take() {
            handle.abort();
        }
    }
}

impl<K, V> Drop for TtlCache<K, V> {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.sweeper.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(ttl_ms: u64) -> TtlCache<String, String> {
        TtlCache::new(Duration::from_millis(ttl_ms))
    }

    #[test]
    fn test_set_get_has_delete() {
        let c = cache(60_000);
        c.set("k".to_string(), "v".to_string());
        assert_eq!(c.get(&"k".to_string()), Some("v".to_string()));
        assert!(c.has(&"k".to_string()));
        assert!(c.delete(&"k".to_string()));
        assert!(!c.has(&"k".to_string()));
        assert!(!c.delete(&"k".to_string()));
    }

    #[test]
    fn test_get_expires_lazily() {
        let c = cache(60_000);
        c.set_with_ttl("k".to_string(), "v".to_string(), Duration::ZERO);
        assert_eq!(c.get(&"k".to_string()), None);
        // The expired entry was deleted on read.
        assert_eq!(c.entries.len(), 0);
    }

    #[test]
    fn test_len_sweeps_first() {
        let c = cache(60_000);
        c.set("live".to_string(), "v".to_string());
        c.set_with_ttl("dead".to_string(), "v".to_string(), Duration::ZERO);
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_sweep_counts_removed() {
        let c = cache(60_000);
        c.set_with_ttl("a".to_string(), "v".to_string(), Duration::ZERO);
        c.set_with_ttl("b".to_string(), "v".to_string(), Duration::ZERO);
        c.set("c".to_string(), "v".to_string());
        assert_eq!(c.sweep(), 2);
        assert_eq!(c.sweep(), 0);
    }

    #[test]
    fn test_insert_if_absent_claims_once() {
        let c = cache(60_000);
        assert!(c.insert_if_absent("n".to_string(), "1".to_string()));
        assert!(!c.insert_if_absent("n".to_string(), "2".to_string()));
        assert_eq!(c.get(&"n".to_string()), Some("1".to_string()));
    }

    #[test]
    fn test_insert_if_absent_treats_expired_as_absent() {
        let c = cache(60_000);
        c.set_with_ttl("n".to_string(), "old".to_string(), Duration::ZERO);
        assert!(c.insert_if_absent("n".to_string(), "new".to_string()));
        assert_eq!(c.get(&"n".to_string()), Some("new".to_string()));
    }

    #[test]
    fn test_insert_if_absent_concurrent_single_winner() {
        let c = Arc::new(cache(60_000));
        let mut handles = Vec::new();
        for i in 0..16 {
            let c = Arc::clone(&c);
            handles.push(std::thread::spawn(move || {
                c.insert_if_absent("nonce".to_string(), format!("{i}"))
            }));
        }
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
    }

    #[test]
    fn test_clear() {
        let c = cache(60_000);
        c.set("a".to_string(), "v".to_string());
        c.set("b".to_string(), "v".to_string());
        c.clear();
        assert!(c.is_empty());
    }

    #[tokio::test]
    async fn test_sweeper_runs_and_stops() {
        let c = Arc::new(cache(60_000));
        c.set_with_ttl("dead".to_string(), "v".to_string(), Duration::ZERO);
        TtlCache::start_sweeper_with_interval(&c, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(c.entries.len(), 0);
        c.destroy();
        // destroy is idempotent
        c.destroy();
    }
}
