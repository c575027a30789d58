// src/fetch/fetcher.rs
use super::proxy::{ProxyEndpoint, ProxyPool};
use super::retry::RetryPolicy;
use super::transport::Transport;
use crate::errors::{FetchError, PoolError};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// GET with timeout, capped attempts and jittered exponential backoff.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    timeout: Duration,
    cancel: CancellationToken,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            transport,
            policy,
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort backoff waits as soon as `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fetch `url` through a fixed proxy.
    pub async fn fetch(
        &self,
        url: &str,
        proxy: Option<&ProxyEndpoint>,
    ) -> Result<Vec<u8>, FetchError> {
        self.fetch_with(url, |_| Ok(proxy.cloned())).await
    }

    /// Fetch `url`, taking a fresh proxy from `pool` for every attempt so a dead
    /// proxy does not burn the whole retry budget.
    pub async fn fetch_rotating(
        &self,
        url: &str,
        pool: &ProxyPool,
    ) -> Result<Vec<u8>, FetchError> {
        self.fetch_with(url, |_| pool.route()).await
    }

    async fn fetch_with<F>(&self, url: &str, mut route: F) -> Result<Vec<u8>, FetchError>
    where
        F: FnMut(u32) -> Result<Option<ProxyEndpoint>, PoolError>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_reason = String::new();

        for attempt in 1..=max_attempts {
            let proxy = route(attempt)
                .map_err(|e| FetchError::permanent(url, attempt - 1, e.to_string()))?;

            match self.transport.get(url, proxy.as_ref(), self.timeout).await {
                Ok(body) => {
                    if attempt > 1 {
                        debug!("Fetched {} on attempt {}/{}", url, attempt, max_attempts);
                    }
                    return Ok(body);
                }
                Err(FetchError::Permanent { reason, .. }) => {
                    warn!("Non-retryable failure for {}: {}", url, reason);
                    return Err(FetchError::permanent(url, attempt, reason));
                }
                Err(FetchError::Transient { reason, .. }) => {
                    debug!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt, max_attempts, url, reason
                    );
                    last_reason = reason;
                }
            }

            if attempt < max_attempts {
                let delay = self.policy.jittered_delay(attempt);
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        return Err(FetchError::permanent(url, attempt, "cancelled"));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        warn!(
            "Retries exhausted for {} after {} attempts: {}",
            url, max_attempts, last_reason
        );
        Err(FetchError::permanent(url, max_attempts, last_reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Fails transiently until `succeed_on`, recording the proxy of every attempt.
    struct FlakyTransport {
        calls: AtomicU32,
        succeed_on: u32,
        proxies: Mutex<Vec<Option<String>>>,
    }

    impl FlakyTransport {
        fn new(succeed_on: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                succeed_on,
                proxies: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn get(
            &self,
            url: &str,
            proxy: Option<&ProxyEndpoint>,
            _timeout: Duration,
        ) -> Result<Vec<u8>, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.proxies
                .lock()
                .unwrap()
                .push(proxy.map(|p| p.as_str().to_string()));
            if call >= self.succeed_on {
                Ok(b"<html></html>".to_vec())
            } else {
                Err(FetchError::transient(url, "connection reset"))
            }
        }
    }

    struct NotFoundTransport {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Transport for NotFoundTransport {
        async fn get(
            &self,
            url: &str,
            _proxy: Option<&ProxyEndpoint>,
            _timeout: Duration,
        ) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::permanent(url, 1, "HTTP 404 Not Found"))
        }
    }

    fn fetcher(transport: Arc<dyn Transport>) -> Fetcher {
        Fetcher::new(transport, RetryPolicy::without_delay(5), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let transport = Arc::new(FlakyTransport::new(3));
        let body = fetcher(transport.clone())
            .fetch("https://example.test/a", None)
            .await
            .unwrap();

        assert_eq!(body, b"<html></html>");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let transport = Arc::new(NotFoundTransport {
            calls: AtomicU32::new(0),
        });
        let err = fetcher(transport.clone())
            .fetch("https://example.test/gone", None)
            .await
            .unwrap_err();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, FetchError::Permanent { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn rotating_fetch_uses_a_new_proxy_per_attempt() {
        let transport = Arc::new(FlakyTransport::new(3));
        let pool = ProxyPool::new(vec![
            ProxyEndpoint::new("p1:1").unwrap(),
            ProxyEndpoint::new("p2:2").unwrap(),
        ]);

        fetcher(transport.clone())
            .fetch_rotating("https://example.test/a", &pool)
            .await
            .unwrap();

        let proxies = transport.proxies.lock().unwrap().clone();
        assert_eq!(
            proxies,
            vec![
                Some("p1:1".to_string()),
                Some("p2:2".to_string()),
                Some("p1:1".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn empty_pool_fails_before_any_request() {
        let transport = Arc::new(FlakyTransport::new(1));
        let pool = ProxyPool::new(Vec::new());

        let err = fetcher(transport.clone())
            .fetch_rotating("https://example.test/a", &pool)
            .await
            .unwrap_err();

        assert!(!err.is_transient());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff() {
        let transport = Arc::new(FlakyTransport::new(u32::MAX));
        let cancel = CancellationToken::new();
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(30),
        };
        let fetcher = Fetcher::new(transport.clone(), policy, Duration::from_secs(1))
            .with_cancellation(cancel.clone());

        cancel.cancel();
        let err = fetcher.fetch("https://example.test/a", None).await.unwrap_err();

        assert_eq!(err.reason(), "cancelled");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}
