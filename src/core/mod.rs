// src/core/mod.rs
//! Configuration, storage and file system plumbing shared by the pipeline

pub mod config_manager;
pub mod database;
pub mod fs_ops;

pub use config_manager::{ConfigManager, HarvestConfig};
pub use database::{Database, JobPostingRepository, OrganizationRepository};
pub use fs_ops::FsOps;
