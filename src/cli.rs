// src/cli.rs
use crate::app_log;
use crate::cache::{JobCache, SqliteCache};
use crate::core::{Database, FsOps, HarvestConfig};
use crate::fetch::{HttpProxySource, ProxySource, ReqwestTransport, Transport};
use crate::pipeline::{status_report, KeywordRotation, Orchestrator, RunReport, Scheduler};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "jobharvest")]
#[command(about = "Harvest job postings into a local database")]
pub struct HarvestCli {
    #[command(subcommand)]
    pub command: HarvestCommand,

    /// Configuration file (defaults to $JOBHARVEST_CONFIG or ./jobharvest.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Also write JSON logs to this file
    #[arg(long, global = true, env = "JOBHARVEST_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum HarvestCommand {
    /// Run the pipeline once for an explicit keyword
    Scrape {
        /// Search keyword (defaults to the current rotation keyword)
        #[arg(long)]
        keyword: Option<String>,
        /// Comma-separated locations, overriding the configured ones
        #[arg(long, value_delimiter = ',')]
        locations: Vec<String>,
        /// Listing pages per location; 0 pages until an empty page
        #[arg(long)]
        max_pages: Option<u32>,
    },
    /// Run the pipeline once for the current rotation keyword
    RunOnce,
    /// Run the rotated-keyword pipeline on the configured interval
    Schedule,
    /// Show the last run status or store statistics
    Status,
    /// Inspect or clear the cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
    /// Create the database and staging directory
    Init,
}

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Delete cached job data and listing snapshots
    Clear,
    /// Count cached entries per namespace
    Stats,
}

/// Long-lived pieces shared by every command that touches the pipeline.
struct Harvester {
    db: Database,
    cache: JobCache,
    rotation: KeywordRotation,
    orchestrator: Arc<Orchestrator>,
}

impl Harvester {
    async fn build(config: HarvestConfig) -> Result<Self> {
        let db = Database::new(&config.storage.database_path).await?;
        let cache = JobCache::new(
            Arc::new(SqliteCache::new(db.pool().clone())),
            config.cache.clone(),
        );
        let rotation = KeywordRotation::new(config.keywords.rotation.clone())
            .context("keywords.rotation must contain at least one keyword")?;

        let transport: Arc<dyn Transport> =
            Arc::new(ReqwestTransport::new(config.fetch.user_agent.as_str()));
        let proxy_source = match config.proxy.source_url.as_deref() {
            Some(url) => {
                let source = HttpProxySource::new(url, config.fetch.timeout())
                    .context("Failed to set up proxy list client")?;
                Some(Arc::new(source) as Arc<dyn ProxySource>)
            }
            None => {
                app_log!(
                    warn,
                    "No proxy source configured (JOBHARVEST_PROXY_SOURCE_URL); direct fetching {}",
                    if config.proxy.allow_direct { "allowed" } else { "disabled" }
                );
                None
            }
        };

        let orchestrator = Orchestrator::new(
            config,
            transport,
            proxy_source,
            cache.clone(),
            db.pool().clone(),
        )?;

        Ok(Self {
            db,
            cache,
            rotation,
            orchestrator: Arc::new(orchestrator),
        })
    }
}

pub async fn handle_command(cli: HarvestCli, config: HarvestConfig) -> Result<()> {
    match cli.command {
        HarvestCommand::Scrape {
            keyword,
            locations,
            max_pages,
        } => {
            let harvester = Harvester::build(config).await?;
            let keyword = keyword.unwrap_or_else(|| harvester.rotation.current().to_string());

            let mut request = harvester.orchestrator.request_for(&keyword);
            let locations: Vec<String> = locations
                .into_iter()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
            if !locations.is_empty() {
                request.locations = locations;
            }
            if let Some(pages) = max_pages {
                request.max_pages = (pages > 0).then_some(pages);
            }

            let report = harvester
                .orchestrator
                .run(request, cancel_on_ctrl_c())
                .await?;
            print_report(&report)?;
        }

        HarvestCommand::RunOnce => {
            let harvester = Harvester::build(config).await?;
            let keyword = harvester.rotation.current().to_string();
            let request = harvester.orchestrator.request_for(&keyword);

            let report = harvester
                .orchestrator
                .run(request, cancel_on_ctrl_c())
                .await?;
            print_report(&report)?;
        }

        HarvestCommand::Schedule => {
            let schedule = config.schedule.clone();
            let harvester = Harvester::build(config).await?;
            let scheduler = Scheduler::new(
                harvester.orchestrator.clone(),
                harvester.rotation.clone(),
                schedule,
            );
            scheduler.run_forever(cancel_on_ctrl_c()).await;
        }

        HarvestCommand::Status => {
            let harvester = Harvester::build(config).await?;
            let report =
                status_report(&harvester.cache, harvester.db.pool(), &harvester.rotation).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        HarvestCommand::Cache { action } => {
            let db = Database::new(&config.storage.database_path).await?;
            let cache = JobCache::new(
                Arc::new(SqliteCache::new(db.pool().clone())),
                config.cache.clone(),
            );

            match action {
                CacheCommand::Clear => {
                    if cache.clear_job_cache().await {
                        app_log!(info, "✅ Job cache cleared");
                    } else {
                        app_log!(info, "❌ Failed to clear job cache");
                    }
                }
                CacheCommand::Stats => {
                    let stats = cache.stats().await?;
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                }
            }
        }

        HarvestCommand::Init => {
            let db = Database::new(&config.storage.database_path).await?;
            db.health_check().await?;
            FsOps::ensure_dir_exists(&config.storage.staging_dir).await?;

            app_log!(info, "✅ Harvester initialized:");
            app_log!(info, "   Database: {}", config.storage.database_path.display());
            app_log!(info, "   Staging: {}", config.storage.staging_dir.display());
        }
    }

    Ok(())
}

fn print_report(report: &RunReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Token cancelled on the first Ctrl-C; in-flight work stops at the next
/// cancellation point.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            app_log!(warn, "Interrupt received, stopping");
            token.cancel();
        }
    });
    cancel
}
