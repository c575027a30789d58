// src/errors.rs
//! Typed failures for the harvesting pipeline.
//!
//! Only [`RunError`] ever ends a run; everything else is absorbed per item and logged.

use thiserror::Error;

/// Outcome of a single GET that did not yield a body.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Timeout, connection/proxy failure, 5xx, 408 or 429. Worth another attempt.
    #[error("transient failure fetching {url}: {reason}")]
    Transient { url: String, reason: String },

    /// Non-retryable response, or retries exhausted.
    #[error("giving up on {url} after {attempts} attempt(s): {reason}")]
    Permanent {
        url: String,
        attempts: u32,
        reason: String,
    },
}

impl FetchError {
    pub fn transient(url: &str, reason: impl Into<String>) -> Self {
        Self::Transient {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    pub fn permanent(url: &str, attempts: u32, reason: impl Into<String>) -> Self {
        Self::Permanent {
            url: url.to_string(),
            attempts,
            reason: reason.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Transient { url, .. } | Self::Permanent { url, .. } => url,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Transient { reason, .. } | Self::Permanent { reason, .. } => reason,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("proxy pool is empty")]
    Empty,
}

#[derive(Debug, Error)]
pub enum ProxySourceError {
    #[error("proxy list provider unreachable: {0}")]
    Unreachable(String),

    #[error("proxy list provider returned no usable endpoints")]
    EmptyList,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Backend(String),

    #[error("cache payload for '{key}' could not be (de)serialized: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    #[error("record '{external_url}' rejected: {reason}")]
    Rejected {
        external_url: String,
        reason: String,
    },
}

/// Failures that terminate a pipeline run and are reported in the status blob.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no proxies available")]
    EmptyPool,

    #[error(transparent)]
    ProxySource(#[from] ProxySourceError),

    #[error("listing phase produced no data for '{keyword}'")]
    NoListings { keyword: String },

    #[error("run cancelled during {phase}")]
    Cancelled { phase: String },

    #[error(transparent)]
    Storage(#[from] PersistenceError),
}

impl RunError {
    /// Proxy exhaustion is retried by the scheduler inside the same slot; everything
    /// else waits for the next scheduled invocation.
    pub fn is_pool_exhaustion(&self) -> bool {
        matches!(self, Self::EmptyPool | Self::ProxySource(_))
    }
}

impl From<PoolError> for RunError {
    fn from(_: PoolError) -> Self {
        Self::EmptyPool
    }
}
