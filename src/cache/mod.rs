use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

/// A value with its storage timestamp
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// Per-user TTL cache
///
/// An entry is returned only while younger than the configured TTL; an
/// expired entry reads as a miss and is evicted on that read. There is no
/// proactive sweep. `invalidate` removes an entry unconditionally and is
/// idempotent for absent keys.
///
/// Cloning is shallow: clones share the same table, so the event ingestor,
/// the training worker, and request handlers all see one another's writes.
#[derive(Clone)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<String, CacheEntry<V>>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the cached value for `user_id` if present and not expired
    pub async fn get(&self, user_id: &str) -> Option<V> {
        {
            let entries = self.entries.read().await;
            match entries.get(user_id) {
                Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Entry exists but has expired: evict it under the write lock. The
        // age is re-checked in case a concurrent put refreshed the entry
        // between lock acquisitions.
        let mut entries = self.entries.write().await;
        match entries.get(user_id) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(user_id);
                None
            }
            None => None,
        }
    }

    /// Stores a value for `user_id`, resetting its age
    pub async fn put(&self, user_id: &str, value: V) {
        let mut entries = self.entries.write().await;
        entries.insert(
            user_id.to_string(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Removes the entry for `user_id`, expired or not
    pub async fn invalidate(&self, user_id: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(user_id);
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(100);

    #[tokio::test(start_paused = true)]
    async fn test_get_after_put_returns_value() {
        let cache: TtlCache<Vec<String>> = TtlCache::new(TTL);
        cache.put("u1", vec!["a".to_string()]).await;

        assert_eq!(cache.get("u1").await, Some(vec!["a".to_string()]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_absent_key_is_miss() {
        let cache: TtlCache<u32> = TtlCache::new(TTL);
        assert_eq!(cache.get("nobody").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache: TtlCache<u32> = TtlCache::new(TTL);
        cache.put("u1", 7).await;

        tokio::time::advance(Duration::from_secs(99)).await;
        assert_eq!(cache.get("u1").await, Some(7));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("u1").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_evicted_on_read() {
        let cache: TtlCache<u32> = TtlCache::new(TTL);
        cache.put("u1", 7).await;

        tokio::time::advance(Duration::from_secs(101)).await;
        assert_eq!(cache.get("u1").await, None);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_before_expiry() {
        let cache: TtlCache<u32> = TtlCache::new(TTL);
        cache.put("u1", 7).await;

        cache.invalidate("u1").await;
        assert_eq!(cache.get("u1").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_absent_key_is_idempotent() {
        let cache: TtlCache<u32> = TtlCache::new(TTL);
        cache.invalidate("u1").await;
        cache.invalidate("u1").await;
        assert_eq!(cache.get("u1").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_refreshes_age() {
        let cache: TtlCache<u32> = TtlCache::new(TTL);
        cache.put("u1", 1).await;

        tokio::time::advance(Duration::from_secs(90)).await;
        cache.put("u1", 2).await;

        tokio::time::advance(Duration::from_secs(90)).await;
        assert_eq!(cache.get("u1").await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_are_independent_per_user() {
        let cache: TtlCache<u32> = TtlCache::new(TTL);
        cache.put("u1", 1).await;
        cache.put("u2", 2).await;

        cache.invalidate("u1").await;
        assert_eq!(cache.get("u1").await, None);
        assert_eq!(cache.get("u2").await, Some(2));
    }
}
