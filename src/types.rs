// src/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One summary card from a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub title: String,
    pub organization: String,
    pub raw_location: String,
    /// Canonical permalink; the idempotency key for everything downstream.
    pub detail_url: String,
}

/// Enrichment fields read from a single detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub detail_url: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub compensation_text: Option<String>,
    pub seniority: Option<String>,
    pub employment_type: Option<String>,
    pub function: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
}

/// A listing left-joined with its detail record, if one was fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub listing: ListingRecord,
    pub detail: Option<DetailRecord>,
}

impl MergedRecord {
    pub fn external_url(&self) -> &str {
        &self.listing.detail_url
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub state: String,
    pub country: String,
}

/// Fully typed, normalized posting ready for the persister.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDraft {
    pub external_url: String,
    pub title: String,
    pub organization: String,
    pub organization_industry: Option<String>,
    pub location: Location,
    pub employment_type: Option<String>,
    pub seniority_level: Option<String>,
    pub function: Option<String>,
    pub compensation_text: Option<String>,
    pub posted_at: DateTime<Utc>,
    pub description: String,
}

/// Parameters of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub keyword: String,
    pub locations: Vec<String>,
    /// `None` pages until an empty listing page is seen.
    pub max_pages: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

/// Blob cached under `scraping_status` after every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeStatus {
    pub last_run_at: DateTime<Utc>,
    pub keyword: String,
    pub jobs_count: usize,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScrapeStatus {
    pub fn success(keyword: &str, jobs_count: usize) -> Self {
        Self {
            last_run_at: Utc::now(),
            keyword: keyword.to_string(),
            jobs_count,
            status: RunStatus::Success,
            error: None,
        }
    }

    pub fn failure(keyword: &str, error: &str) -> Self {
        Self {
            last_run_at: Utc::now(),
            keyword: keyword.to_string(),
            jobs_count: 0,
            status: RunStatus::Error,
            error: Some(error.to_string()),
        }
    }
}

/// Aggregate numbers shown when no status blob is cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_jobs: i64,
    pub total_organizations: i64,
    pub jobs_last_24h: i64,
    pub current_keyword: String,
    pub next_keyword: String,
}
