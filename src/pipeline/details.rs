// src/pipeline/details.rs
use super::{cancelled, RunPhase};
use crate::errors::{FetchError, RunError};
use crate::extract::DetailExtractor;
use crate::fetch::{Fetcher, ProxyPool, RequestLimiter};
use crate::types::DetailRecord;
use futures::{stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct DetailHarvest {
    pub records: Vec<DetailRecord>,
    /// URLs that still failed after the second pass; dropped from enrichment.
    pub failed_urls: Vec<String>,
    /// URLs that failed the first pass but succeeded on the second.
    pub recovered: usize,
}

/// Bounded worker pool over detail pages.
///
/// Every request first takes a permit from the shared limiter. Pages that
/// fail are collected and retried once, together, after the first pass.
pub struct DetailHarvester<'a> {
    pub fetcher: &'a Fetcher,
    pub pool: &'a ProxyPool,
    pub extractor: &'a DetailExtractor,
    pub limiter: &'a RequestLimiter,
    pub workers: usize,
    pub cancel: &'a CancellationToken,
}

impl DetailHarvester<'_> {
    pub async fn harvest(&self, urls: &[String]) -> Result<DetailHarvest, RunError> {
        let (mut records, failed) = self.pass(urls.to_vec()).await?;
        if failed.is_empty() {
            return Ok(DetailHarvest {
                records,
                ..DetailHarvest::default()
            });
        }

        info!("Retrying {} failed detail pages", failed.len());
        let first_failures = failed.len();
        let (retried, failed_urls) = self.pass(failed).await?;
        records.extend(retried);

        for url in &failed_urls {
            warn!("Dropping detail page after second pass: {}", url);
        }

        Ok(DetailHarvest {
            records,
            recovered: first_failures - failed_urls.len(),
            failed_urls,
        })
    }

    async fn pass(&self, urls: Vec<String>) -> Result<(Vec<DetailRecord>, Vec<String>), RunError> {
        let results: Vec<(String, Result<Vec<u8>, FetchError>)> = stream::iter(urls)
            .map(|url| async move {
                self.limiter.acquire().await;
                let result = self.fetcher.fetch_rotating(&url, self.pool).await;
                (url, result)
            })
            .buffer_unordered(self.workers.max(1))
            .take_until(self.cancel.cancelled())
            .collect()
            .await;

        if self.cancel.is_cancelled() {
            return Err(cancelled(RunPhase::FetchingDetails));
        }

        let mut records = Vec::with_capacity(results.len());
        let mut failed = Vec::new();
        for (url, result) in results {
            match result {
                Ok(body) => records.push(self.extractor.extract(&url, &body)),
                Err(e) => {
                    warn!("Detail fetch failed: {}", e);
                    failed.push(url);
                }
            }
        }
        Ok((records, failed))
    }
}
