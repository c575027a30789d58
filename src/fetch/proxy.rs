// src/fetch/proxy.rs
//! Rotating outbound proxy pool and the remote list it is refreshed from

use crate::errors::{PoolError, ProxySourceError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{info, warn};

/// Opaque proxy address as delivered by the provider (`host:port` or a full URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProxyEndpoint(String);

impl ProxyEndpoint {
    pub fn new(address: &str) -> Option<Self> {
        let address = address.trim();
        if address.is_empty() || address.starts_with('#') {
            None
        } else {
            Some(Self(address.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address usable by the HTTP client; bare `host:port` entries are plain HTTP proxies.
    pub fn proxy_url(&self) -> String {
        if self.0.contains("://") {
            self.0.clone()
        } else {
            format!("http://{}", self.0)
        }
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Split a plaintext provider response into endpoints, dropping blanks and repeats.
pub fn parse_proxy_list(body: &str) -> Vec<ProxyEndpoint> {
    let mut seen = HashSet::new();
    body.lines()
        .filter_map(ProxyEndpoint::new)
        .filter(|endpoint| seen.insert(endpoint.clone()))
        .collect()
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProxySource: Send + Sync {
    async fn fetch_list(&self) -> Result<Vec<ProxyEndpoint>, ProxySourceError>;
}

/// Provider answering a GET with newline-separated addresses.
pub struct HttpProxySource {
    client: Client,
    url: String,
}

impl HttpProxySource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ProxySourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProxySourceError::Unreachable(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ProxySource for HttpProxySource {
    async fn fetch_list(&self) -> Result<Vec<ProxyEndpoint>, ProxySourceError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ProxySourceError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProxySourceError::Unreachable(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProxySourceError::Unreachable(e.to_string()))?;

        let endpoints = parse_proxy_list(&body);
        if endpoints.is_empty() {
            return Err(ProxySourceError::EmptyList);
        }
        Ok(endpoints)
    }
}

/// Fixed endpoint list, for deployments with their own proxy fleet.
pub struct StaticProxySource {
    endpoints: Vec<ProxyEndpoint>,
}

impl StaticProxySource {
    pub fn new(endpoints: Vec<ProxyEndpoint>) -> Self {
        Self { endpoints }
    }
}

#[async_trait]
impl ProxySource for StaticProxySource {
    async fn fetch_list(&self) -> Result<Vec<ProxyEndpoint>, ProxySourceError> {
        if self.endpoints.is_empty() {
            return Err(ProxySourceError::EmptyList);
        }
        Ok(self.endpoints.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolMode {
    Rotating,
    Direct,
}

/// Round-robin pool. The cursor wraps modulo the pool size, so consecutive
/// calls spread load over every endpoint.
#[derive(Debug)]
pub struct ProxyPool {
    endpoints: Vec<ProxyEndpoint>,
    cursor: AtomicUsize,
    mode: PoolMode,
}

impl ProxyPool {
    pub fn new(endpoints: Vec<ProxyEndpoint>) -> Self {
        Self {
            endpoints,
            cursor: AtomicUsize::new(0),
            mode: PoolMode::Rotating,
        }
    }

    /// Pool that routes every request without a proxy.
    pub fn direct() -> Self {
        Self {
            endpoints: Vec::new(),
            cursor: AtomicUsize::new(0),
            mode: PoolMode::Direct,
        }
    }

    /// Replace the whole list with a fresh one from `source`.
    ///
    /// The current list is kept when the provider fails or returns nothing.
    pub async fn refresh(
        &mut self,
        source: &dyn ProxySource,
    ) -> Result<&[ProxyEndpoint], ProxySourceError> {
        let endpoints = match source.fetch_list().await {
            Ok(endpoints) if endpoints.is_empty() => return Err(ProxySourceError::EmptyList),
            Ok(endpoints) => endpoints,
            Err(e) => {
                warn!("Proxy refresh failed: {}", e);
                return Err(e);
            }
        };

        info!("Proxy pool refreshed with {} endpoints", endpoints.len());
        self.endpoints = endpoints;
        self.cursor.store(0, Ordering::Relaxed);
        self.mode = PoolMode::Rotating;
        Ok(&self.endpoints)
    }

    pub fn next(&self) -> Result<ProxyEndpoint, PoolError> {
        if self.endpoints.is_empty() {
            return Err(PoolError::Empty);
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        Ok(self.endpoints[index].clone())
    }

    /// Proxy for the next request; `None` means connect directly.
    pub fn route(&self) -> Result<Option<ProxyEndpoint>, PoolError> {
        match self.mode {
            PoolMode::Direct => Ok(None),
            PoolMode::Rotating => self.next().map(Some),
        }
    }

    pub fn endpoints(&self) -> &[ProxyEndpoint] {
        &self.endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(addresses: &[&str]) -> Vec<ProxyEndpoint> {
        addresses
            .iter()
            .filter_map(|a| ProxyEndpoint::new(a))
            .collect()
    }

    #[test]
    fn parses_plaintext_list() {
        let parsed = parse_proxy_list("10.0.0.1:8080\r\n\n  10.0.0.2:3128 \n10.0.0.1:8080\n# comment\n");
        assert_eq!(parsed, endpoints(&["10.0.0.1:8080", "10.0.0.2:3128"]));
    }

    #[test]
    fn bare_addresses_become_http_proxies() {
        let bare = ProxyEndpoint::new("10.0.0.1:8080").unwrap();
        let full = ProxyEndpoint::new("socks5://10.0.0.1:1080").unwrap();

        assert_eq!(bare.proxy_url(), "http://10.0.0.1:8080");
        assert_eq!(full.proxy_url(), "socks5://10.0.0.1:1080");
    }

    #[test]
    fn next_rotates_round_robin() {
        let pool = ProxyPool::new(endpoints(&["a:1", "b:2", "c:3"]));

        let picked: Vec<String> = (0..5)
            .map(|_| pool.next().unwrap().as_str().to_string())
            .collect();

        assert_eq!(picked, vec!["a:1", "b:2", "c:3", "a:1", "b:2"]);
    }

    #[test]
    fn consecutive_calls_differ_when_pool_has_several_endpoints() {
        let pool = ProxyPool::new(endpoints(&["a:1", "b:2"]));
        assert_ne!(pool.next().unwrap(), pool.next().unwrap());
    }

    #[test]
    fn empty_pool_fails() {
        let pool = ProxyPool::new(Vec::new());
        assert_eq!(pool.next(), Err(PoolError::Empty));
        assert_eq!(pool.route(), Err(PoolError::Empty));
    }

    #[test]
    fn direct_pool_routes_without_proxy() {
        let pool = ProxyPool::direct();
        assert_eq!(pool.route(), Ok(None));
    }

    #[tokio::test]
    async fn refresh_replaces_list_wholesale() {
        let mut source = MockProxySource::new();
        source
            .expect_fetch_list()
            .times(1)
            .returning(|| Ok(vec![ProxyEndpoint::new("fresh:1").unwrap()]));

        let mut pool = ProxyPool::new(endpoints(&["stale:1", "stale:2"]));
        pool.next().unwrap();

        let refreshed = pool.refresh(&source).await.unwrap();
        assert_eq!(refreshed.len(), 1);
        assert_eq!(pool.next().unwrap().as_str(), "fresh:1");
        assert_eq!(pool.next().unwrap().as_str(), "fresh:1");
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_list() {
        let mut source = MockProxySource::new();
        source
            .expect_fetch_list()
            .returning(|| Err(ProxySourceError::Unreachable("connection refused".into())));

        let mut pool = ProxyPool::new(endpoints(&["kept:1"]));
        assert!(pool.refresh(&source).await.is_err());
        assert_eq!(pool.next().unwrap().as_str(), "kept:1");
    }

    #[tokio::test]
    async fn empty_provider_response_is_an_error() {
        let mut source = MockProxySource::new();
        source.expect_fetch_list().returning(|| Ok(Vec::new()));

        let mut pool = ProxyPool::new(Vec::new());
        assert!(matches!(
            pool.refresh(&source).await,
            Err(ProxySourceError::EmptyList)
        ));
    }
}
