// src/pipeline/staging.rs
//! Per-run CSV snapshot of the listing batch, removed during cleanup

use crate::core::FsOps;
use crate::types::ListingRecord;
use anyhow::Result;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const HEADER: [&str; 4] = ["title", "organization", "location", "link"];

#[derive(Debug, Clone)]
pub struct StagingFile {
    path: PathBuf,
}

impl StagingFile {
    /// `<dir>/<run_id>.csv`
    pub fn for_run(dir: &Path, run_id: Uuid) -> Self {
        Self {
            path: dir.join(format!("{}.csv", run_id)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write_listings(&self, records: &[ListingRecord]) -> Result<()> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(HEADER)?;
        for record in records {
            writer.write_record([
                record.title.as_str(),
                record.organization.as_str(),
                record.raw_location.as_str(),
                record.detail_url.as_str(),
            ])?;
        }
        let content = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush staging CSV: {}", e.error()))?;

        FsOps::write_file_safe(&self.path, &content).await
    }

    pub async fn remove(&self) -> Result<bool> {
        FsOps::remove_file_if_exists(&self.path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stages_and_removes_listing_batch() {
        let dir = std::env::temp_dir().join(format!("jobharvest-staging-{}", Uuid::new_v4()));
        let staging = StagingFile::for_run(&dir, Uuid::new_v4());
        let records = vec![ListingRecord {
            title: "Analyst, Data".into(),
            organization: "Acme".into(),
            raw_location: "Austin, TX".into(),
            detail_url: "https://jobs.test/1".into(),
        }];

        staging.write_listings(&records).await.unwrap();

        let mut reader = csv::Reader::from_path(staging.path()).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(reader.headers().unwrap(), HEADER.as_slice());
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "Analyst, Data");
        assert_eq!(&rows[0][3], "https://jobs.test/1");

        assert!(staging.remove().await.unwrap());
        assert!(!staging.path().exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
