use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires: Instant,
}

/// Expiring key/value store. Expiry is only enforced when a key is read;
/// there is no background sweep, so stale entries linger until the next
/// `get` or overwrite of the same key.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value while `now <= expiry`; otherwise drops the entry.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            None => return None,
            Some(entry) => Instant::now() > entry.expires,
        };
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires: Instant::now() + ttl,
        };
        self.lock().insert(key, entry);
    }

    /// Number of stored entries, expired-but-unread ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_raw(&self, key: &K) -> bool {
        self.lock().contains_key(key)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poison) => poison.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn value_is_served_until_expiry_then_evicted() {
        let cache: TtlCache<String, u32> = TtlCache::new();
        cache.set("k".to_string(), 7, Duration::from_millis(100));
        assert_eq!(cache.get(&"k".to_string()), Some(7));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(cache.get(&"k".to_string()), Some(7));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cache.contains_raw(&"k".to_string()));
        assert_eq!(cache.get(&"k".to_string()), None);
        assert!(!cache.contains_raw(&"k".to_string()));
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_resets_expiry() {
        let cache: TtlCache<&'static str, &'static str> = TtlCache::new();
        cache.set("k", "old", Duration::from_millis(50));
        tokio::time::advance(Duration::from_millis(40)).await;
        cache.set("k", "new", Duration::from_millis(50));
        tokio::time::advance(Duration::from_millis(40)).await;
        assert_eq!(cache.get(&"k"), Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn unread_expired_entries_linger() {
        let cache: TtlCache<u32, u32> = TtlCache::new();
        cache.set(1, 1, Duration::from_millis(10));
        cache.set(2, 2, Duration::from_secs(10));
        tokio::time::advance(Duration::from_millis(20)).await;
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&2), Some(2));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.len(), 1);
    }
}
