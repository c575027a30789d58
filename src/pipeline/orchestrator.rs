// src/pipeline/orchestrator.rs
//! One pipeline run: proxies → listing pages → detail pages → merge → persist → cleanup

use super::details::DetailHarvester;
use super::paginator::{Paginator, SearchUrlBuilder};
use super::phase::{PhaseTracker, RunPhase};
use super::staging::StagingFile;
use super::pause;
use crate::app_log;
use crate::cache::JobCache;
use crate::core::config_manager::HarvestConfig;
use crate::errors::RunError;
use crate::etl;
use crate::extract::{DetailExtractor, ListingExtractor};
use crate::fetch::{Fetcher, ProxyPool, ProxySource, RequestLimiter, RetryPolicy, Transport};
use crate::persister::{PersistReport, Persister};
use crate::types::{MergedRecord, RunRequest, ScrapeStatus};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// `jobs:` cache key holding the report of the most recent successful run.
pub const LAST_RUN_KEY: &str = "last_run";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub keyword: String,
    /// Records came from a cached snapshot; nothing was fetched.
    pub from_cache: bool,
    pub pages_fetched: u32,
    pub pages_failed: u32,
    pub listings: usize,
    pub details_fetched: usize,
    pub details_failed: usize,
    pub merged: usize,
    pub persisted: PersistReport,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Sequences a run and reports its outcome through the cached status blob.
///
/// Holds no per-run state: concurrent runs share only the cache and the
/// database behind the persister.
pub struct Orchestrator {
    config: HarvestConfig,
    transport: Arc<dyn Transport>,
    proxy_source: Option<Arc<dyn ProxySource>>,
    cache: JobCache,
    persister: Persister,
    urls: SearchUrlBuilder,
    listing_extractor: ListingExtractor,
    detail_extractor: DetailExtractor,
}

impl Orchestrator {
    pub fn new(
        config: HarvestConfig,
        transport: Arc<dyn Transport>,
        proxy_source: Option<Arc<dyn ProxySource>>,
        cache: JobCache,
        pool: SqlitePool,
    ) -> Result<Self> {
        let urls = SearchUrlBuilder::new(&config.search)
            .with_context(|| format!("Invalid search base URL: {}", config.search.base_url))?;

        Ok(Self {
            persister: Persister::new(pool, config.persist.chunk_size),
            listing_extractor: ListingExtractor::from_config(&config.search),
            detail_extractor: DetailExtractor::new(),
            urls,
            config,
            transport,
            proxy_source,
            cache,
        })
    }

    /// Request for `keyword` over the configured locations and page bound.
    pub fn request_for(&self, keyword: &str) -> RunRequest {
        RunRequest {
            keyword: keyword.to_string(),
            locations: self.config.search.locations.clone(),
            max_pages: self.config.search.max_pages.filter(|pages| *pages > 0),
        }
    }

    pub async fn run(
        &self,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> Result<RunReport, RunError> {
        let mut tracker = PhaseTracker::new(Uuid::new_v4());
        let staging = StagingFile::for_run(&self.config.storage.staging_dir, tracker.run_id());
        app_log!(
            info,
            "Run {} started for '{}' in {:?}",
            tracker.run_id(),
            request.keyword,
            request.locations
        );

        let outcome = self
            .execute(&request, &cancel, &mut tracker, &staging)
            .await;

        match &outcome {
            Ok(report) => {
                self.cache
                    .set_status(&ScrapeStatus::success(&request.keyword, report.merged))
                    .await;
                self.cache
                    .set_job_data(
                        LAST_RUN_KEY,
                        report,
                        Duration::from_secs(self.config.cache.listings_ttl_secs),
                    )
                    .await;
                app_log!(
                    info,
                    "✅ Run {} finished: {} merged, {} new, {} already stored",
                    report.run_id,
                    report.merged,
                    report.persisted.inserted,
                    report.persisted.skipped_existing
                );
            }
            Err(e) => {
                tracker.fail();
                if let Err(cleanup_err) = staging.remove().await {
                    app_log!(warn, "Failed to remove staging file: {}", cleanup_err);
                }
                self.cache
                    .set_status(&ScrapeStatus::failure(&request.keyword, &e.to_string()))
                    .await;
                app_log!(error, "❌ Run {} failed: {}", tracker.run_id(), e);
                tracker.advance(RunPhase::Idle);
            }
        }

        outcome
    }

    async fn execute(
        &self,
        request: &RunRequest,
        cancel: &CancellationToken,
        tracker: &mut PhaseTracker,
        staging: &StagingFile,
    ) -> Result<RunReport, RunError> {
        let started_at = Utc::now();

        if let Some(cached) = self.cache.listings(&request.keyword).await {
            app_log!(
                info,
                "Found {} cached records for '{}', skipping fetch phases",
                cached.len(),
                request.keyword
            );
            return self
                .replay_cached(request, cached, tracker, started_at)
                .await;
        }

        let pool = self.load_pool().await?;
        let fetcher = Fetcher::new(
            self.transport.clone(),
            RetryPolicy::from_config(&self.config.fetch),
            self.config.fetch.timeout(),
        )
        .with_cancellation(cancel.clone());
        let pacing = &self.config.pacing;

        // FETCHING_LISTINGS
        tracker.advance(RunPhase::FetchingListings);
        let paginator = Paginator {
            fetcher: &fetcher,
            pool: &pool,
            extractor: &self.listing_extractor,
            urls: &self.urls,
            pacing,
            cancel,
        };

        let locations = if request.locations.is_empty() {
            vec![String::new()]
        } else {
            request.locations.clone()
        };

        let mut listings = Vec::new();
        let (mut pages_fetched, mut pages_failed) = (0, 0);
        for location in &locations {
            let sweep = paginator
                .sweep(&request.keyword, location, request.max_pages)
                .await?;
            pages_fetched += sweep.pages_fetched;
            pages_failed += sweep.pages_failed;
            listings.extend(sweep.records);
        }

        let listings = etl::deduplicate(listings, |listing| listing.detail_url.clone());
        if listings.is_empty() {
            return Err(RunError::NoListings {
                keyword: request.keyword.clone(),
            });
        }
        app_log!(
            info,
            "Collected {} unique listings over {} pages ({} failed)",
            listings.len(),
            pages_fetched,
            pages_failed
        );

        if let Err(e) = staging.write_listings(&listings).await {
            app_log!(warn, "Could not stage listing batch: {}", e);
        }
        pause(pacing.phase_delay(), cancel, RunPhase::FetchingListings).await?;

        // FETCHING_DETAILS
        tracker.advance(RunPhase::FetchingDetails);
        let limiter = RequestLimiter::from_config(pacing);
        let harvester = DetailHarvester {
            fetcher: &fetcher,
            pool: &pool,
            extractor: &self.detail_extractor,
            limiter: &limiter,
            workers: pacing.detail_workers,
            cancel,
        };
        let urls: Vec<String> = listings.iter().map(|l| l.detail_url.clone()).collect();
        let harvest = harvester.harvest(&urls).await?;
        let details_fetched = harvest.records.len();
        let details_failed = harvest.failed_urls.len();
        app_log!(
            info,
            "Fetched {} detail pages ({} recovered on retry, {} dropped)",
            details_fetched,
            harvest.recovered,
            details_failed
        );

        // MERGING
        tracker.advance(RunPhase::Merging);
        let listings_count = listings.len();
        let merged = etl::merge(listings, harvest.records);
        self.cache.set_listings(&request.keyword, &merged).await;
        pause(pacing.persist_delay(), cancel, RunPhase::Merging).await?;

        // PERSISTING
        tracker.advance(RunPhase::Persisting);
        let persisted = self.persister.persist_merged(&merged, Utc::now()).await?;

        // CLEANUP
        tracker.advance(RunPhase::Cleanup);
        self.cleanup(staging).await;
        tracker.advance(RunPhase::Idle);

        Ok(RunReport {
            run_id: tracker.run_id(),
            keyword: request.keyword.clone(),
            from_cache: false,
            pages_fetched,
            pages_failed,
            listings: listings_count,
            details_fetched,
            details_failed,
            merged: merged.len(),
            persisted,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Persist a cached merged snapshot; persisting is idempotent, so replaying
    /// it inside its TTL window only fills gaps.
    async fn replay_cached(
        &self,
        request: &RunRequest,
        cached: Vec<MergedRecord>,
        tracker: &mut PhaseTracker,
        started_at: DateTime<Utc>,
    ) -> Result<RunReport, RunError> {
        for phase in [
            RunPhase::FetchingListings,
            RunPhase::FetchingDetails,
            RunPhase::Merging,
            RunPhase::Persisting,
        ] {
            tracker.advance(phase);
        }
        let persisted = self.persister.persist_merged(&cached, Utc::now()).await?;

        tracker.advance(RunPhase::Cleanup);
        self.cache.purge_expired().await;
        tracker.advance(RunPhase::Idle);

        Ok(RunReport {
            run_id: tracker.run_id(),
            keyword: request.keyword.clone(),
            from_cache: true,
            pages_fetched: 0,
            pages_failed: 0,
            listings: cached.len(),
            details_fetched: cached.iter().filter(|r| r.detail.is_some()).count(),
            details_failed: 0,
            merged: cached.len(),
            persisted,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Cached proxy list if still fresh, otherwise a wholesale refresh from the
    /// provider (which is then cached).
    async fn load_pool(&self) -> Result<ProxyPool, RunError> {
        if let Some(endpoints) = self.cache.proxy_list().await {
            app_log!(debug, "Using {} cached proxies", endpoints.len());
            return Ok(ProxyPool::new(endpoints));
        }

        match &self.proxy_source {
            Some(source) => {
                let mut pool = ProxyPool::new(Vec::new());
                pool.refresh(source.as_ref()).await?;
                self.cache.set_proxy_list(pool.endpoints()).await;
                Ok(pool)
            }
            None if self.config.proxy.allow_direct => {
                app_log!(warn, "No proxy source configured, fetching directly");
                Ok(ProxyPool::direct())
            }
            None => Err(RunError::EmptyPool),
        }
    }

    async fn cleanup(&self, staging: &StagingFile) {
        match staging.remove().await {
            Ok(true) => app_log!(debug, "Removed staging file {}", staging.path().display()),
            Ok(false) => {}
            Err(e) => app_log!(warn, "Failed to remove staging file: {}", e),
        }
        let purged = self.cache.purge_expired().await;
        if purged > 0 {
            app_log!(debug, "Purged {} expired cache entries", purged);
        }
    }
}
