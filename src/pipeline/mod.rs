// src/pipeline/mod.rs
//! Run orchestration: phases, paging, the detail worker pool, scheduling and
//! status reporting

pub mod details;
pub mod keywords;
pub mod orchestrator;
pub mod paginator;
pub mod phase;
pub mod scheduler;
pub mod staging;
pub mod status;

pub use keywords::KeywordRotation;
pub use orchestrator::{Orchestrator, RunReport};
pub use phase::{PhaseTracker, RunPhase};
pub use scheduler::Scheduler;
pub use status::{status_report, StatusReport};

use crate::errors::RunError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleep for `duration` unless `cancel` fires first.
pub(crate) async fn pause(
    duration: Duration,
    cancel: &CancellationToken,
    phase: RunPhase,
) -> Result<(), RunError> {
    if cancel.is_cancelled() {
        return Err(cancelled(phase));
    }
    if duration.is_zero() {
        return Ok(());
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(cancelled(phase)),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

pub(crate) fn cancelled(phase: RunPhase) -> RunError {
    RunError::Cancelled {
        phase: phase.to_string(),
    }
}
