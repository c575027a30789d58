// tests/persister_test.rs
use chrono::Utc;
use job_harvester::core::{Database, JobPostingRepository};
use job_harvester::persister::Persister;
use job_harvester::types::{DetailRecord, ListingRecord, MergedRecord};

fn record(id: u32) -> MergedRecord {
    let url = format!("https://www.linkedin.com/jobs/view/50000000{:02}", id);
    MergedRecord {
        listing: ListingRecord {
            title: format!("Engineer {}", id),
            organization: "Initech".into(),
            raw_location: "Berlin, Germany".into(),
            detail_url: url.clone(),
        },
        detail: Some(DetailRecord {
            detail_url: url,
            employment_type: Some("Contract".into()),
            ..DetailRecord::default()
        }),
    }
}

#[tokio::test]
async fn second_identical_batch_inserts_nothing() {
    let db = Database::in_memory().await.unwrap();
    let persister = Persister::new(db.pool().clone(), 3);
    let batch: Vec<MergedRecord> = (0..7).map(record).collect();

    let first = persister.persist_merged(&batch, Utc::now()).await.unwrap();
    let second = persister.persist_merged(&batch, Utc::now()).await.unwrap();

    assert_eq!(first.inserted, 7);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped_existing, 7);
    assert_eq!(JobPostingRepository::new(db.pool()).count().await.unwrap(), 7);
}

#[tokio::test]
async fn overlapping_concurrent_batches_store_each_url_once() {
    let db = Database::in_memory().await.unwrap();
    let persister = Persister::new(db.pool().clone(), 2);
    let left: Vec<MergedRecord> = (0..6).map(record).collect();
    let right: Vec<MergedRecord> = (3..9).map(record).collect();

    let (a, b) = tokio::join!(
        persister.persist_merged(&left, Utc::now()),
        persister.persist_merged(&right, Utc::now())
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.inserted + b.inserted, 9);
    assert_eq!(a.skipped_existing + b.skipped_existing, 3);
    assert_eq!(JobPostingRepository::new(db.pool()).count().await.unwrap(), 9);
}

#[tokio::test]
async fn duplicate_urls_within_one_batch_collapse() {
    let db = Database::in_memory().await.unwrap();
    let persister = Persister::new(db.pool().clone(), 100);
    let batch = vec![record(1), record(1), record(2)];

    let report = persister.persist_merged(&batch, Utc::now()).await.unwrap();

    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped_existing, 1);
}
