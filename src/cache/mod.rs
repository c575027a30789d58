// src/cache/mod.rs
//! Keyed TTL cache for proxy lists, per-keyword listing snapshots and the run
//! status blob.
//!
//! Every [`JobCache`] operation is best-effort: backend or codec failures are
//! logged and surface as a miss (or `false`), never as an error.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

use crate::core::config_manager::CacheConfig;
use crate::errors::CacheError;
use crate::fetch::ProxyEndpoint;
use crate::types::{MergedRecord, ScrapeStatus};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const PROXY_LIST_KEY: &str = "proxy_list";
pub const STATUS_KEY: &str = "scraping_status";
pub const JOBS_PREFIX: &str = "jobs:";
pub const LISTINGS_PREFIX: &str = "job_listings:";

/// Raw string storage with per-entry expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// `None` for absent and expired keys alike.
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError>;
    /// Live (unexpired) entries under `prefix`.
    async fn count_prefix(&self, prefix: &str) -> Result<u64, CacheError>;
    async fn purge_expired(&self) -> Result<u64, CacheError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_keys: u64,
    pub job_cache_keys: u64,
    pub listing_cache_keys: u64,
    pub proxy_list_cached: bool,
    pub status_cached: bool,
}

/// `job_listings:<keyword>` with the keyword lowercased and spaces replaced by `_`.
pub fn listings_key(keyword: &str) -> String {
    format!(
        "{}{}",
        LISTINGS_PREFIX,
        keyword.trim().to_lowercase().replace(' ', "_")
    )
}

/// Typed, namespaced facade over a [`CacheBackend`].
#[derive(Clone)]
pub struct JobCache {
    backend: Arc<dyn CacheBackend>,
    ttl: CacheConfig,
}

impl JobCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: CacheConfig) -> Self {
        Self { backend, ttl }
    }

    pub fn in_memory(ttl: CacheConfig) -> Self {
        Self::new(Arc::new(MemoryCache::new()), ttl)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get_raw(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("Cache miss: {}", key);
                return None;
            }
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!("Cache hit: {}", key);
                Some(value)
            }
            Err(source) => {
                let err = CacheError::Codec {
                    key: key.to_string(),
                    source,
                };
                warn!("{}", err);
                None
            }
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(source) => {
                let err = CacheError::Codec {
                    key: key.to_string(),
                    source,
                };
                warn!("{}", err);
                return false;
            }
        };

        match self.backend.set_raw(key, raw, ttl).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Cache write failed for {}: {}", key, e);
                false
            }
        }
    }

    /// Arbitrary payload under the `jobs:` namespace.
    pub async fn job_data<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(&format!("{}{}", JOBS_PREFIX, key)).await
    }

    pub async fn set_job_data<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> bool {
        self.set(&format!("{}{}", JOBS_PREFIX, key), value, ttl).await
    }

    pub async fn proxy_list(&self) -> Option<Vec<ProxyEndpoint>> {
        self.get::<Vec<ProxyEndpoint>>(PROXY_LIST_KEY)
            .await
            .filter(|list| !list.is_empty())
    }

    pub async fn set_proxy_list(&self, endpoints: &[ProxyEndpoint]) -> bool {
        self.set(
            PROXY_LIST_KEY,
            endpoints,
            Duration::from_secs(self.ttl.proxy_list_ttl_secs),
        )
        .await
    }

    pub async fn listings(&self, keyword: &str) -> Option<Vec<MergedRecord>> {
        self.get(&listings_key(keyword)).await
    }

    pub async fn set_listings(&self, keyword: &str, records: &[MergedRecord]) -> bool {
        self.set(
            &listings_key(keyword),
            records,
            Duration::from_secs(self.ttl.listings_ttl_secs),
        )
        .await
    }

    pub async fn status(&self) -> Option<ScrapeStatus> {
        self.get(STATUS_KEY).await
    }

    pub async fn set_status(&self, status: &ScrapeStatus) -> bool {
        self.set(
            STATUS_KEY,
            status,
            Duration::from_secs(self.ttl.status_ttl_secs),
        )
        .await
    }

    /// Drop every `jobs:*` and `job_listings:*` entry.
    pub async fn clear_job_cache(&self) -> bool {
        let mut removed = 0;
        for prefix in [JOBS_PREFIX, LISTINGS_PREFIX] {
            match self.backend.delete_prefix(prefix).await {
                Ok(n) => removed += n,
                Err(e) => {
                    warn!("Failed to clear {}* entries: {}", prefix, e);
                    return false;
                }
            }
        }
        debug!("Cleared {} job cache entries", removed);
        true
    }

    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        Ok(CacheStats {
            total_keys: self.backend.count_prefix("").await?,
            job_cache_keys: self.backend.count_prefix(JOBS_PREFIX).await?,
            listing_cache_keys: self.backend.count_prefix(LISTINGS_PREFIX).await?,
            proxy_list_cached: self.backend.count_prefix(PROXY_LIST_KEY).await? > 0,
            status_cached: self.backend.count_prefix(STATUS_KEY).await? > 0,
        })
    }

    /// Remove expired entries; returns how many went away (0 on failure).
    pub async fn purge_expired(&self) -> u64 {
        match self.backend.purge_expired().await {
            Ok(purged) => purged,
            Err(e) => {
                warn!("Cache purge failed: {}", e);
                0
            }
        }
    }
}
