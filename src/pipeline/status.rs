// src/pipeline/status.rs
use super::keywords::KeywordRotation;
use crate::cache::JobCache;
use crate::core::database::{JobPostingRepository, OrganizationRepository};
use crate::types::{ScrapeStatus, StoreStats};
use anyhow::Result;
use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StatusReport {
    /// Status blob left by the most recent run, while its TTL lasts.
    LastRun(ScrapeStatus),
    /// Store-wide numbers computed on demand.
    Store(StoreStats),
}

/// Cached status blob if present, otherwise fresh store statistics.
pub async fn status_report(
    cache: &JobCache,
    pool: &SqlitePool,
    rotation: &KeywordRotation,
) -> Result<StatusReport> {
    if let Some(status) = cache.status().await {
        return Ok(StatusReport::LastRun(status));
    }
    Ok(StatusReport::Store(store_stats(pool, rotation).await?))
}

pub async fn store_stats(pool: &SqlitePool, rotation: &KeywordRotation) -> Result<StoreStats> {
    let jobs = JobPostingRepository::new(pool);
    let now = Utc::now();

    Ok(StoreStats {
        total_jobs: jobs.count().await?,
        total_organizations: OrganizationRepository::new(pool).count().await?,
        jobs_last_24h: jobs.count_created_since(now - Duration::hours(24)).await?,
        current_keyword: rotation.current_at(now).to_string(),
        next_keyword: rotation.next_at(now).to_string(),
    })
}
