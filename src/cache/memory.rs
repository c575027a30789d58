// src/cache/memory.rs
use super::CacheBackend;
use crate::errors::CacheError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Process-local backend. Expired entries are dropped lazily on read and in
/// bulk by [`CacheBackend::purge_expired`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let value = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            Some(_) => None,
            None => return Ok(None),
        };
        if value.is_none() {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut removed = 0u64;
        self.entries.retain(|key, _| {
            let keep = !key.starts_with(prefix);
            removed += u64::from(!keep);
            keep
        });
        Ok(removed)
    }

    async fn count_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let now = Instant::now();
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix) && !entry.is_expired(now))
            .count() as u64)
    }

    async fn purge_expired(&self) -> Result<u64, CacheError> {
        let now = Instant::now();
        let mut removed = 0u64;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(now);
            removed += u64::from(!keep);
            keep
        });
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn delete_prefix_counts_only_matching_keys() {
        let cache = MemoryCache::new();
        for key in ["jobs:a", "jobs:b", "proxy_list"] {
            cache
                .set_raw(key, "{}".into(), Duration::from_secs(60))
                .await
                .unwrap();
        }

        assert_eq!(cache.delete_prefix("jobs:").await.unwrap(), 2);
        assert_eq!(cache.count_prefix("").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn purge_counts_only_expired_entries() {
        let cache = MemoryCache::new();
        cache.set_raw("stale", "1".into(), Duration::ZERO).await.unwrap();
        cache
            .set_raw("fresh", "2".into(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert_eq!(cache.get_raw("fresh").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn removal_counts_stay_exact_under_concurrent_writes() {
        let cache = Arc::new(MemoryCache::new());
        for i in 0..200 {
            cache
                .set_raw(&format!("jobs:{}", i), "x".into(), Duration::from_secs(60))
                .await
                .unwrap();
        }

        let writer = {
            let cache = cache.clone();
            tokio::spawn(async move {
                for i in 0..500 {
                    cache
                        .set_raw(&format!("other:{}", i), "y".into(), Duration::from_secs(60))
                        .await
                        .unwrap();
                }
            })
        };
        let removed = cache.delete_prefix("jobs:").await.unwrap();
        writer.await.unwrap();

        assert_eq!(removed, 200);
        assert_eq!(cache.count_prefix("other:").await.unwrap(), 500);
    }
}
