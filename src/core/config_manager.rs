// src/core/config_manager.rs
//! Harvester configuration: TOML file, environment overrides, built-in defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const DEFAULT_CONFIG_FILE: &str = "jobharvest.toml";

pub const DEFAULT_KEYWORDS: [&str; 20] = [
    "software engineer",
    "data scientist",
    "product manager",
    "full stack developer",
    "machine learning engineer",
    "devops engineer",
    "cloud architect",
    "cybersecurity analyst",
    "business analyst",
    "project manager",
    "sales manager",
    "marketing manager",
    "financial analyst",
    "operations manager",
    "ui ux designer",
    "qa engineer",
    "system administrator",
    "network engineer",
    "database administrator",
    "frontend developer",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub search: SearchConfig,
    pub keywords: KeywordConfig,
    pub proxy: ProxyConfig,
    pub fetch: FetchConfig,
    pub pacing: PacingConfig,
    pub cache: CacheConfig,
    pub persist: PersistConfig,
    pub schedule: ScheduleConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    /// Canonical permalink prefix; the extracted job id is appended.
    pub detail_url_prefix: String,
    pub page_size: u32,
    /// Value of the recency filter parameter (`f_TPR`); empty disables it.
    pub recency_filter: String,
    pub locations: Vec<String>,
    /// Upper bound on listing pages per location; `0` keeps paging until a page
    /// adds nothing new.
    pub max_pages: Option<u32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.linkedin.com/jobs/search/".to_string(),
            detail_url_prefix: "https://www.linkedin.com/jobs/view/".to_string(),
            page_size: 25,
            recency_filter: "r86400".to_string(),
            locations: vec!["United States".to_string()],
            max_pages: Some(3),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub rotation: Vec<String>,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            rotation: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Plaintext, newline-separated proxy list endpoint. Usually supplied
    /// through `JOBHARVEST_PROXY_SOURCE_URL` so credentials stay out of files.
    pub source_url: Option<String>,
    /// Fetch directly when no source is configured instead of failing the run.
    pub allow_direct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub page_delay_min_secs: u64,
    pub page_delay_max_secs: u64,
    /// Pause between the listing and detail phases.
    pub phase_delay_secs: u64,
    /// Pause right before writing to the database.
    pub persist_delay_secs: u64,
    pub detail_workers: usize,
    pub detail_requests_per_minute: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            page_delay_min_secs: 60,
            page_delay_max_secs: 120,
            phase_delay_secs: 120,
            persist_delay_secs: 60,
            detail_workers: 4,
            detail_requests_per_minute: 20,
        }
    }
}

impl PacingConfig {
    /// No sleeps and an effectively unlimited request rate.
    pub fn immediate() -> Self {
        Self {
            page_delay_min_secs: 0,
            page_delay_max_secs: 0,
            phase_delay_secs: 0,
            persist_delay_secs: 0,
            detail_workers: 4,
            detail_requests_per_minute: 60_000,
        }
    }

    pub fn phase_delay(&self) -> Duration {
        Duration::from_secs(self.phase_delay_secs)
    }

    pub fn persist_delay(&self) -> Duration {
        Duration::from_secs(self.persist_delay_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub proxy_list_ttl_secs: u64,
    pub listings_ttl_secs: u64,
    pub status_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            proxy_list_ttl_secs: 600,
            listings_ttl_secs: 1_800,
            status_ttl_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    pub chunk_size: usize,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self { chunk_size: 100 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
    /// In-slot retries when no proxy is available.
    pub max_retries: u32,
    /// First in-slot retry delay; doubles on every further retry.
    pub empty_pool_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3_600,
            max_retries: 3,
            empty_pool_delay_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub staging_dir: PathBuf,
    pub log_file: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/jobharvest.db"),
            staging_dir: PathBuf::from("uploads"),
            log_file: None,
        }
    }
}

pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration: explicit path, `$JOBHARVEST_CONFIG`, `./jobharvest.toml`,
    /// or defaults, then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<HarvestConfig> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("JOBHARVEST_CONFIG").ok().map(PathBuf::from))
            .or_else(|| {
                let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                local.exists().then_some(local)
            });

        let mut config = match path {
            Some(path) => Self::load_from_file(&path)?,
            None => {
                info!("No configuration file found, using defaults");
                HarvestConfig::default()
            }
        };

        Self::apply_env_overrides(&mut config);
        Self::resolve_paths(&mut config)?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<HarvestConfig> {
        info!("Loading configuration from {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<HarvestConfig> {
        let config: HarvestConfig = toml::from_str(content)?;
        if config.keywords.rotation.is_empty() {
            anyhow::bail!("keywords.rotation must contain at least one keyword");
        }
        if config.fetch.max_attempts == 0 {
            anyhow::bail!("fetch.max_attempts must be at least 1");
        }
        Ok(config)
    }

    fn apply_env_overrides(config: &mut HarvestConfig) {
        if let Ok(url) = std::env::var("JOBHARVEST_PROXY_SOURCE_URL") {
            if !url.trim().is_empty() {
                config.proxy.source_url = Some(url.trim().to_string());
            }
        }
        if let Ok(path) = std::env::var("JOBHARVEST_DATABASE_PATH") {
            config.storage.database_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("JOBHARVEST_STAGING_DIR") {
            config.storage.staging_dir = PathBuf::from(path);
        }
    }

    /// Relative paths resolve against `/app` in production, the working directory otherwise.
    fn resolve_paths(config: &mut HarvestConfig) -> Result<()> {
        let env = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "local".to_string());
        let base_dir = if env == "production" {
            PathBuf::from("/app")
        } else {
            std::env::current_dir().context("Failed to get current directory")?
        };

        let resolve = |path: &PathBuf| {
            if path.is_absolute() {
                path.clone()
            } else {
                base_dir.join(path)
            }
        };

        config.storage.database_path = resolve(&config.storage.database_path);
        config.storage.staging_dir = resolve(&config.storage.staging_dir);
        if let Some(log_file) = &config.storage.log_file {
            config.storage.log_file = Some(resolve(log_file));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = ConfigManager::parse("").unwrap();

        assert_eq!(config.fetch.max_attempts, 5);
        assert_eq!(config.search.page_size, 25);
        assert_eq!(config.cache.proxy_list_ttl_secs, 600);
        assert_eq!(config.cache.listings_ttl_secs, 1_800);
        assert_eq!(config.cache.status_ttl_secs, 300);
        assert_eq!(config.keywords.rotation.len(), 20);
        assert!(config.proxy.source_url.is_none());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = ConfigManager::parse(
            r#"
            [search]
            locations = ["Canada", "Germany"]
            max_pages = 5

            [pacing]
            detail_workers = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.search.locations, vec!["Canada", "Germany"]);
        assert_eq!(config.search.max_pages, Some(5));
        assert_eq!(config.search.page_size, 25);
        assert_eq!(config.pacing.detail_workers, 8);
        assert_eq!(config.pacing.phase_delay_secs, 120);
    }

    #[test]
    fn rejects_empty_keyword_rotation() {
        let err = ConfigManager::parse("[keywords]\nrotation = []\n").unwrap_err();
        assert!(err.to_string().contains("at least one keyword"));
    }
}
