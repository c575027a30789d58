use anyhow::Result;
use clap::Parser;
use job_harvester::app_log;
use job_harvester::cli::{handle_command, HarvestCli};
use job_harvester::core::ConfigManager;
use job_harvester::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = HarvestCli::parse();

    // Load configuration before logging so the log file can come from it
    let mut config = ConfigManager::load(cli.config.as_deref())?;
    if let Some(log_file) = &cli.log_file {
        config.storage.log_file = Some(log_file.clone());
    }
    logging::init(config.storage.log_file.as_deref())?;

    app_log!(
        info,
        "Environment: {}",
        std::env::var("ENVIRONMENT").unwrap_or_else(|_| "local".to_string())
    );
    app_log!(info, "Database: {}", config.storage.database_path.display());

    handle_command(cli, config).await
}
