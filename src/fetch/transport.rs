// src/fetch/transport.rs
//! Single-attempt HTTP GET, optionally routed through a proxy

use super::proxy::ProxyEndpoint;
use crate::errors::FetchError;
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

const DIRECT_ROUTE: &str = "direct";

/// One request, no retries. Errors are classified so the caller can decide
/// whether another attempt is worthwhile.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        proxy: Option<&ProxyEndpoint>,
        timeout: Duration,
    ) -> Result<Vec<u8>, FetchError>;
}

/// Statuses worth retrying: throttling, timeouts, server errors.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 425 | 429 | 500..=599)
}

/// `reqwest` transport keeping one client (and its connection pool) per proxy.
pub struct ReqwestTransport {
    clients: DashMap<String, Client>,
    user_agent: String,
}

impl ReqwestTransport {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            clients: DashMap::new(),
            user_agent: user_agent.into(),
        }
    }

    fn client_for(&self, proxy: Option<&ProxyEndpoint>) -> Result<Client, String> {
        let key = proxy
            .map(ProxyEndpoint::proxy_url)
            .unwrap_or_else(|| DIRECT_ROUTE.to_string());

        if let Some(client) = self.clients.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = Client::builder().user_agent(self.user_agent.as_str());
        if let Some(proxy) = proxy {
            let proxy = reqwest::Proxy::all(proxy.proxy_url())
                .map_err(|e| format!("invalid proxy {}: {}", proxy, e))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| format!("failed to build HTTP client: {}", e))?;

        self.clients.insert(key, client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        proxy: Option<&ProxyEndpoint>,
        timeout: Duration,
    ) -> Result<Vec<u8>, FetchError> {
        // A malformed proxy address will not get better on retry.
        let client = self
            .client_for(proxy)
            .map_err(|reason| FetchError::permanent(url, 1, reason))?;

        debug!(
            "GET {} via {}",
            url,
            proxy.map(ProxyEndpoint::as_str).unwrap_or(DIRECT_ROUTE)
        );

        let response = client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    FetchError::permanent(url, 1, e.to_string())
                } else {
                    FetchError::transient(url, e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let reason = format!("HTTP {}", status);
            return Err(if is_retryable_status(status) {
                FetchError::transient(url, reason)
            } else {
                FetchError::permanent(url, 1, reason)
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::transient(url, format!("failed to read body: {}", e)))?;

        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::REQUEST_TIMEOUT));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));

        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::FORBIDDEN));
        assert!(!is_retryable_status(StatusCode::GONE));
    }

    #[test]
    fn clients_are_reused_per_route() {
        let transport = ReqwestTransport::new("test-agent");
        let proxy = ProxyEndpoint::new("127.0.0.1:9").unwrap();

        transport.client_for(Some(&proxy)).unwrap();
        transport.client_for(Some(&proxy)).unwrap();
        transport.client_for(None).unwrap();

        assert_eq!(transport.clients.len(), 2);
    }
}
