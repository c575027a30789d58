// src/pipeline/paginator.rs
use super::{cancelled, pause, RunPhase};
use crate::core::config_manager::{PacingConfig, SearchConfig};
use crate::errors::RunError;
use crate::extract::ListingExtractor;
use crate::fetch::{page_delay, Fetcher, ProxyPool};
use crate::types::ListingRecord;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

/// Consecutive failed pages after which a sweep gives up on a location.
const MAX_CONSECUTIVE_PAGE_FAILURES: u32 = 3;

/// Hard stop for sweeps without a page bound.
pub const MAX_UNBOUNDED_PAGES: u32 = 40;

/// Builds listing-search URLs: `keywords`, `location`, recency filter and the
/// `start` offset of the requested page.
#[derive(Debug, Clone)]
pub struct SearchUrlBuilder {
    base: Url,
    page_size: u32,
    recency_filter: String,
}

impl SearchUrlBuilder {
    pub fn new(config: &SearchConfig) -> Result<Self, url::ParseError> {
        Ok(Self {
            base: Url::parse(&config.base_url)?,
            page_size: config.page_size.max(1),
            recency_filter: config.recency_filter.clone(),
        })
    }

    pub fn page_url(&self, keyword: &str, location: &str, page: u32) -> String {
        let mut url = self.base.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("keywords", keyword);
            if !location.is_empty() {
                query.append_pair("location", location);
            }
            if !self.recency_filter.is_empty() {
                query.append_pair("f_TPR", &self.recency_filter);
            }
            query.append_pair("start", &(page.saturating_mul(self.page_size)).to_string());
        }
        url.to_string()
    }
}

/// Result of paging through one keyword/location pair.
#[derive(Debug, Default)]
pub struct PageSweep {
    pub records: Vec<ListingRecord>,
    pub pages_fetched: u32,
    pub pages_failed: u32,
}

/// Walks listing pages in increasing order with a randomized pause between
/// requests.
///
/// Without a page bound the sweep ends at the first page that adds no new
/// listing (empty, or only repeats), or after [`MAX_UNBOUNDED_PAGES`]. With a
/// bound, such pages simply contribute nothing. Failed pages are skipped.
pub struct Paginator<'a> {
    pub fetcher: &'a Fetcher,
    pub pool: &'a ProxyPool,
    pub extractor: &'a ListingExtractor,
    pub urls: &'a SearchUrlBuilder,
    pub pacing: &'a PacingConfig,
    pub cancel: &'a CancellationToken,
}

impl Paginator<'_> {
    pub async fn sweep(
        &self,
        keyword: &str,
        location: &str,
        max_pages: Option<u32>,
    ) -> Result<PageSweep, RunError> {
        let mut sweep = PageSweep::default();
        let mut consecutive_failures = 0;
        let mut seen = HashSet::new();
        let mut page = 0u32;
        let limit = max_pages.unwrap_or(MAX_UNBOUNDED_PAGES);

        while page < limit {
            if page > 0 {
                pause(page_delay(self.pacing), self.cancel, RunPhase::FetchingListings).await?;
            }

            let url = self.urls.page_url(keyword, location, page);
            match self.fetcher.fetch_rotating(&url, self.pool).await {
                Ok(body) => {
                    consecutive_failures = 0;
                    sweep.pages_fetched += 1;

                    let records = self.extractor.extract(&body);
                    let found = records.len();
                    let fresh: Vec<ListingRecord> = records
                        .into_iter()
                        .filter(|record| seen.insert(record.detail_url.clone()))
                        .collect();
                    info!(
                        "Page {} for '{}' in '{}': {} listings ({} new)",
                        page,
                        keyword,
                        location,
                        found,
                        fresh.len()
                    );
                    if fresh.is_empty() && max_pages.is_none() {
                        break;
                    }
                    sweep.records.extend(fresh);
                }
                Err(e) => {
                    if self.cancel.is_cancelled() {
                        return Err(cancelled(RunPhase::FetchingListings));
                    }
                    warn!("Skipping listing page {}: {}", page, e);
                    sweep.pages_failed += 1;
                    consecutive_failures += 1;
                    if consecutive_failures >= MAX_CONSECUTIVE_PAGE_FAILURES {
                        warn!(
                            "Giving up on '{}' in '{}' after {} failed pages in a row",
                            keyword, location, consecutive_failures
                        );
                        break;
                    }
                }
            }

            page += 1;
        }

        Ok(sweep)
    }
}
