// tests/utils/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use job_harvester::cache::JobCache;
use job_harvester::core::config_manager::{CacheConfig, HarvestConfig, PacingConfig};
use job_harvester::core::Database;
use job_harvester::errors::{FetchError, ProxySourceError};
use job_harvester::fetch::{ProxyEndpoint, ProxySource, StaticProxySource, Transport};
use job_harvester::pipeline::Orchestrator;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const EMPTY_PAGE: &str = "<html><body><ul class=\"jobs-search__results-list\"></ul></body></html>";

pub const FIRST_JOB_URL: &str = "https://www.linkedin.com/jobs/view/4000000001";
pub const SECOND_JOB_URL: &str = "https://www.linkedin.com/jobs/view/4000000002";

pub const LISTING_PAGE: &str = r#"
<html><body>
<ul class="jobs-search__results-list">
  <li>
    <div class="base-card base-search-card job-search-card">
      <a class="base-card__full-link" href="https://www.linkedin.com/jobs/view/backend-engineer-at-acme-4000000001?refId=1">Backend Engineer</a>
      <h3 class="base-search-card__title">Backend Engineer</h3>
      <h4 class="base-search-card__subtitle"><a>Acme Corp</a></h4>
      <span class="job-search-card__location">Austin, TX, United States</span>
    </div>
  </li>
  <li>
    <div class="base-card base-search-card job-search-card">
      <a class="base-card__full-link" href="https://www.linkedin.com/jobs/view/data-engineer-at-globex-4000000002?refId=2">Data Engineer</a>
      <h3 class="base-search-card__title">Data Engineer</h3>
      <h4 class="base-search-card__subtitle"><a>Globex</a></h4>
      <span class="job-search-card__location">Remote</span>
    </div>
  </li>
</ul>
</body></html>
"#;

pub const DETAIL_PAGE: &str = r#"
<html><body>
<span class="posted-time-ago__text">2 days ago</span>
<div class="salary compensation__salary">$140,000.00/yr</div>
<div class="show-more-less-html__markup"><p>Own the ingestion pipeline.</p></div>
<ul class="description__job-criteria-list">
  <li class="description__job-criteria-item">
    <h3 class="description__job-criteria-subheader">Seniority level</h3>
    <span class="description__job-criteria-text">Mid-Senior level</span>
  </li>
  <li class="description__job-criteria-item">
    <h3 class="description__job-criteria-subheader">Employment type</h3>
    <span class="description__job-criteria-text">Full-time</span>
  </li>
  <li class="description__job-criteria-item">
    <h3 class="description__job-criteria-subheader">Industries</h3>
    <span class="description__job-criteria-text">Software Development</span>
  </li>
</ul>
</body></html>
"#;

enum Reply {
    Body(String),
    Fail,
}

/// Answers by URL fragment (first matching rule wins, anything else gets an
/// empty listing page) and records every requested URL.
pub struct ScriptedTransport {
    rules: Vec<(String, Reply)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Listing page 0 with two cards, a detail page for each of them.
    pub fn two_jobs() -> Self {
        Self::new()
            .respond("start=0", LISTING_PAGE)
            .respond(FIRST_JOB_URL, DETAIL_PAGE)
            .respond(SECOND_JOB_URL, DETAIL_PAGE)
    }

    pub fn respond(mut self, fragment: &str, body: &str) -> Self {
        self.rules.push((fragment.to_string(), Reply::Body(body.to_string())));
        self
    }

    /// Transient failure on every request matching `fragment`.
    pub fn fail(mut self, fragment: &str) -> Self {
        self.rules.push((fragment.to_string(), Reply::Fail));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(
        &self,
        url: &str,
        _proxy: Option<&ProxyEndpoint>,
        _timeout: Duration,
    ) -> Result<Vec<u8>, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());

        match self.rules.iter().find(|(fragment, _)| url.contains(fragment.as_str())) {
            Some((_, Reply::Body(body))) => Ok(body.clone().into_bytes()),
            Some((_, Reply::Fail)) => Err(FetchError::transient(url, "connection reset")),
            None => Ok(EMPTY_PAGE.as_bytes().to_vec()),
        }
    }
}

/// Provider that is unreachable for the first `failures` calls.
pub struct FlakyProxySource {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyProxySource {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProxySource for FlakyProxySource {
    async fn fetch_list(&self) -> Result<Vec<ProxyEndpoint>, ProxySourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(ProxySourceError::Unreachable("connection refused".into()));
        }
        Ok(proxies())
    }
}

pub fn proxies() -> Vec<ProxyEndpoint> {
    ["10.0.0.1:8080", "10.0.0.2:8080"]
        .iter()
        .filter_map(|a| ProxyEndpoint::new(a))
        .collect()
}

pub fn static_source() -> Arc<dyn ProxySource> {
    Arc::new(StaticProxySource::new(proxies()))
}

pub fn staging_dir() -> PathBuf {
    std::env::temp_dir().join(format!("jobharvest-test-{}", Uuid::new_v4()))
}

/// Unbounded paging over one location, no pacing, no backoff.
pub fn test_config() -> HarvestConfig {
    let mut config = HarvestConfig::default();
    config.search.locations = vec!["United States".to_string()];
    config.search.max_pages = None;
    config.pacing = PacingConfig::immediate();
    config.fetch.max_attempts = 2;
    config.fetch.base_delay_ms = 0;
    config.fetch.max_delay_ms = 0;
    config.cache = CacheConfig::default();
    config.storage.staging_dir = staging_dir();
    config
}

pub struct Harness {
    pub db: Database,
    pub cache: JobCache,
    pub transport: Arc<ScriptedTransport>,
    pub orchestrator: Arc<Orchestrator>,
}

pub async fn harness(
    transport: ScriptedTransport,
    proxy_source: Option<Arc<dyn ProxySource>>,
) -> Harness {
    harness_with(test_config(), transport, proxy_source).await
}

pub async fn harness_with(
    config: HarvestConfig,
    transport: ScriptedTransport,
    proxy_source: Option<Arc<dyn ProxySource>>,
) -> Harness {
    let db = Database::in_memory().await.unwrap();
    let cache = JobCache::in_memory(config.cache.clone());
    let transport = Arc::new(transport);

    let orchestrator = Orchestrator::new(
        config,
        transport.clone(),
        proxy_source,
        cache.clone(),
        db.pool().clone(),
    )
    .unwrap();

    Harness {
        db,
        cache,
        transport,
        orchestrator: Arc::new(orchestrator),
    }
}
