// src/fetch/limiter.rs
//! Request pacing: a shared per-minute budget for detail fetches and the
//! randomized pause between listing pages.

use crate::core::config_manager::PacingConfig;
use governor::{Quota, RateLimiter};
use rand::Rng;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Cloneable handle onto one governor bucket, shared by every detail worker.
#[derive(Clone)]
pub struct RequestLimiter {
    limiter: Arc<DirectLimiter>,
}

impl RequestLimiter {
    pub fn per_minute(requests: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn from_config(config: &PacingConfig) -> Self {
        Self::per_minute(config.detail_requests_per_minute)
    }

    /// Wait until the bucket grants a permit.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}

/// Uniformly random pause in `[min_secs, max_secs]` between listing pages.
pub fn page_delay(config: &PacingConfig) -> Duration {
    let min = config.page_delay_min_secs;
    let max = config.page_delay_max_secs.max(min);
    if max == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(min * 1_000..=max * 1_000))
}
