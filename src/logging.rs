// src/logging.rs
//! Logging setup shared by the binary and long-running schedules

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Forward to the matching `tracing` macro: `app_log!(info, "Saved {} jobs", n)`.
#[macro_export]
macro_rules! app_log {
    (trace, $($arg:tt)+) => { ::tracing::trace!($($arg)+) };
    (debug, $($arg:tt)+) => { ::tracing::debug!($($arg)+) };
    (info, $($arg:tt)+) => { ::tracing::info!($($arg)+) };
    (warn, $($arg:tt)+) => { ::tracing::warn!($($arg)+) };
    (error, $($arg:tt)+) => { ::tracing::error!($($arg)+) };
}

/// Install the global subscriber.
///
/// Human-readable output goes to stderr. When `log_file` is set, a JSON copy of
/// every event is written there as well; the file is truncated on startup.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn,reqwest=warn"));

    let json_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create log directory: {}", parent.display())
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;

            Some(
                fmt::layer()
                    .json()
                    .with_writer(Mutex::new(file))
                    .with_current_span(false)
                    .with_span_list(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(json_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}
