// src/pipeline/phase.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    FetchingListings,
    FetchingDetails,
    Merging,
    Persisting,
    Cleanup,
    Failed,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FetchingListings => "fetching_listings",
            Self::FetchingDetails => "fetching_details",
            Self::Merging => "merging",
            Self::Persisting => "persisting",
            Self::Cleanup => "cleanup",
            Self::Failed => "failed",
        }
    }

    /// Forward edge of the happy path; `Failed` is reachable from every phase.
    pub fn can_transition_to(&self, to: RunPhase) -> bool {
        matches!(
            (*self, to),
            (Self::Idle, Self::FetchingListings)
                | (Self::FetchingListings, Self::FetchingDetails)
                | (Self::FetchingDetails, Self::Merging)
                | (Self::Merging, Self::Persisting)
                | (Self::Persisting, Self::Cleanup)
                | (Self::Cleanup, Self::Idle)
                | (Self::Failed, Self::Idle)
                | (_, Self::Failed)
        ) && *self != to
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one run, with the time each phase was entered.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    run_id: Uuid,
    current: RunPhase,
    history: Vec<(RunPhase, DateTime<Utc>)>,
}

impl PhaseTracker {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            current: RunPhase::Idle,
            history: vec![(RunPhase::Idle, Utc::now())],
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn current(&self) -> RunPhase {
        self.current
    }

    pub fn history(&self) -> &[(RunPhase, DateTime<Utc>)] {
        &self.history
    }

    /// Move to `to`; an illegal edge is logged and ignored.
    pub fn advance(&mut self, to: RunPhase) -> bool {
        if !self.current.can_transition_to(to) {
            warn!(
                "Run {}: ignoring illegal transition {} -> {}",
                self.run_id, self.current, to
            );
            return false;
        }
        info!("Run {}: {} -> {}", self.run_id, self.current, to);
        self.current = to;
        self.history.push((to, Utc::now()));
        true
    }

    pub fn fail(&mut self) -> bool {
        self.advance(RunPhase::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_cycles_back_to_idle() {
        let mut tracker = PhaseTracker::new(Uuid::new_v4());
        for phase in [
            RunPhase::FetchingListings,
            RunPhase::FetchingDetails,
            RunPhase::Merging,
            RunPhase::Persisting,
            RunPhase::Cleanup,
            RunPhase::Idle,
        ] {
            assert!(tracker.advance(phase), "{} rejected", phase);
        }
        assert_eq!(tracker.history().len(), 7);
    }

    #[test]
    fn phases_cannot_be_skipped() {
        let mut tracker = PhaseTracker::new(Uuid::new_v4());
        assert!(!tracker.advance(RunPhase::Persisting));
        assert_eq!(tracker.current(), RunPhase::Idle);
    }

    #[test]
    fn failed_is_reachable_from_anywhere() {
        for from in [
            RunPhase::Idle,
            RunPhase::FetchingListings,
            RunPhase::FetchingDetails,
            RunPhase::Merging,
            RunPhase::Persisting,
            RunPhase::Cleanup,
        ] {
            assert!(from.can_transition_to(RunPhase::Failed));
        }
        assert!(!RunPhase::Failed.can_transition_to(RunPhase::Failed));
        assert!(RunPhase::Failed.can_transition_to(RunPhase::Idle));
    }
}
