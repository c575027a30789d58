// src/fetch/mod.rs
//! Outbound HTTP: proxy rotation, retries and request pacing

pub mod fetcher;
pub mod limiter;
pub mod proxy;
pub mod retry;
pub mod transport;

pub use fetcher::Fetcher;
pub use limiter::{page_delay, RequestLimiter};
pub use proxy::{HttpProxySource, ProxyEndpoint, ProxyPool, ProxySource, StaticProxySource};
pub use retry::RetryPolicy;
pub use transport::{ReqwestTransport, Transport};
