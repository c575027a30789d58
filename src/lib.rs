//! Job-board harvester: rotating proxies, paced listing and detail scraping,
//! merge and idempotent persistence into SQLite.

pub mod logging;

pub mod cache;
pub mod cli;
pub mod core;
pub mod errors;
pub mod etl;
pub mod extract;
pub mod fetch;
pub mod persister;
pub mod pipeline;
pub mod types;

pub use cache::JobCache;
pub use errors::{FetchError, PersistenceError, RunError};
pub use persister::{PersistReport, Persister};
pub use pipeline::{Orchestrator, RunReport, Scheduler};
pub use types::{DetailRecord, JobDraft, ListingRecord, MergedRecord, RunRequest};
