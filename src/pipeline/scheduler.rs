// src/pipeline/scheduler.rs
use super::keywords::KeywordRotation;
use super::orchestrator::{Orchestrator, RunReport};
use super::{pause, RunPhase};
use crate::app_log;
use crate::core::config_manager::ScheduleConfig;
use crate::errors::RunError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Recurring trigger: one rotated-keyword run per interval tick.
///
/// A run that fails for lack of proxies is retried inside the same slot with
/// a doubling delay, up to `max_retries`. Any other failure is left for the
/// next tick.
pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    rotation: KeywordRotation,
    schedule: ScheduleConfig,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        rotation: KeywordRotation,
        schedule: ScheduleConfig,
    ) -> Self {
        Self {
            orchestrator,
            rotation,
            schedule,
        }
    }

    /// Delay before in-slot retry number `retry` (0-based).
    pub fn retry_delay(&self, retry: u32) -> Duration {
        let base = Duration::from_secs(self.schedule.empty_pool_delay_secs);
        base.checked_mul(1u32 << retry.min(16))
            .unwrap_or(Duration::MAX)
    }

    /// Run `keyword` once, retrying pool exhaustion within the slot.
    pub async fn run_slot(
        &self,
        keyword: &str,
        cancel: &CancellationToken,
    ) -> Result<RunReport, RunError> {
        let request = self.orchestrator.request_for(keyword);
        let mut retries = 0;

        loop {
            match self.orchestrator.run(request.clone(), cancel.clone()).await {
                Err(e) if e.is_pool_exhaustion() && retries < self.schedule.max_retries => {
                    let delay = self.retry_delay(retries);
                    retries += 1;
                    app_log!(
                        warn,
                        "{}; retry {}/{} for '{}' in {:?}",
                        e,
                        retries,
                        self.schedule.max_retries,
                        keyword,
                        delay
                    );
                    pause(delay, cancel, RunPhase::Idle).await?;
                }
                outcome => return outcome,
            }
        }
    }

    /// Tick every `interval_secs` until `cancel` fires. The first run starts
    /// immediately.
    pub async fn run_forever(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(Duration::from_secs(
            self.schedule.interval_secs.max(1),
        ));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        app_log!(
            info,
            "Scheduler started: every {}s over {} keywords",
            self.schedule.interval_secs,
            self.rotation.keywords().len()
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let keyword = self.rotation.current().to_string();
            match self.run_slot(&keyword, &cancel).await {
                Ok(_) => app_log!(info, "Next keyword: '{}'", self.rotation.next()),
                Err(RunError::Cancelled { phase }) => {
                    app_log!(info, "Run for '{}' cancelled during {}", keyword, phase);
                    break;
                }
                Err(e) => app_log!(
                    warn,
                    "Slot for '{}' ended in failure ({}); waiting for next tick",
                    keyword,
                    e
                ),
            }
        }

        app_log!(info, "Scheduler stopped");
    }
}
