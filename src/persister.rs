// src/persister.rs
//! Idempotent bulk writes into the system of record

use crate::app_log;
use crate::core::database::{JobPostingRepository, OrganizationRepository};
use crate::errors::PersistenceError;
use crate::etl::to_drafts;
use crate::types::{JobDraft, MergedRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, Sqlite, SqlitePool, Transaction};

const UNKNOWN_ORGANIZATION: &str = "Unknown";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistReport {
    pub inserted: usize,
    pub skipped_existing: usize,
    pub failed: usize,
}

impl PersistReport {
    fn absorb(&mut self, other: PersistReport) {
        self.inserted += other.inserted;
        self.skipped_existing += other.skipped_existing;
        self.failed += other.failed;
    }
}

/// Writes drafts in chunked transactions. Each record runs in its own
/// savepoint so one bad row only costs that row.
#[derive(Debug, Clone)]
pub struct Persister {
    pool: SqlitePool,
    chunk_size: usize,
}

impl Persister {
    pub fn new(pool: SqlitePool, chunk_size: usize) -> Self {
        Self {
            pool,
            chunk_size: chunk_size.max(1),
        }
    }

    pub async fn persist_merged(
        &self,
        records: &[MergedRecord],
        now: DateTime<Utc>,
    ) -> Result<PersistReport, PersistenceError> {
        self.persist(&to_drafts(records, now)).await
    }

    /// Insert every draft whose `external_url` is not stored yet.
    ///
    /// Fails only when storage could not be reached for any chunk at all;
    /// per-record problems are logged and counted in `failed`.
    pub async fn persist(&self, drafts: &[JobDraft]) -> Result<PersistReport, PersistenceError> {
        let mut report = PersistReport::default();
        let mut storage_error = None;

        for (index, chunk) in drafts.chunks(self.chunk_size).enumerate() {
            match self.persist_chunk(chunk).await {
                Ok(chunk_report) => {
                    app_log!(
                        debug,
                        "Chunk {}: {} inserted, {} existing, {} failed",
                        index + 1,
                        chunk_report.inserted,
                        chunk_report.skipped_existing,
                        chunk_report.failed
                    );
                    report.absorb(chunk_report);
                }
                Err(e) => {
                    app_log!(error, "Chunk {} could not be written: {}", index + 1, e);
                    report.failed += chunk.len();
                    storage_error = Some(e);
                }
            }
        }

        if let Some(e) = storage_error {
            if report.inserted + report.skipped_existing == 0 {
                return Err(PersistenceError::Unavailable(e));
            }
        }

        app_log!(
            info,
            "Persisted {} new postings ({} already stored, {} failed)",
            report.inserted,
            report.skipped_existing,
            report.failed
        );
        Ok(report)
    }

    async fn persist_chunk(&self, chunk: &[JobDraft]) -> Result<PersistReport, sqlx::Error> {
        let mut report = PersistReport::default();
        let mut tx = self.pool.begin().await?;

        for draft in chunk {
            match Self::persist_one(&mut tx, draft).await {
                Ok(true) => report.inserted += 1,
                Ok(false) => report.skipped_existing += 1,
                Err(e) => {
                    app_log!(warn, "Skipping {}: {}", draft.external_url, e);
                    report.failed += 1;
                }
            }
        }

        tx.commit().await?;
        Ok(report)
    }

    async fn persist_one(
        tx: &mut Transaction<'_, Sqlite>,
        draft: &JobDraft,
    ) -> Result<bool, PersistenceError> {
        if draft.external_url.trim().is_empty() {
            return Err(PersistenceError::Rejected {
                external_url: draft.external_url.clone(),
                reason: "empty external url".to_string(),
            });
        }

        let organization = if draft.organization.trim().is_empty() {
            UNKNOWN_ORGANIZATION
        } else {
            draft.organization.as_str()
        };

        let mut savepoint = tx.begin().await?;
        let organization = OrganizationRepository::get_or_create_in(
            &mut savepoint,
            organization,
            draft.organization_industry.as_deref(),
        )
        .await?;
        let inserted =
            JobPostingRepository::insert_if_absent_in(&mut savepoint, draft, &organization.id)
                .await?;
        savepoint.commit().await?;

        Ok(inserted)
    }
}
