// src/etl.rs
//! In-memory transforms between extraction and persistence: dedup, location
//! splitting, the listing/detail join and draft construction.

use crate::types::{DetailRecord, JobDraft, ListingRecord, Location, MergedRecord};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Keep the first record per key, preserving input order.
pub fn deduplicate<T, K, F>(records: Vec<T>, key_fn: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(key_fn(record)))
        .collect()
}

/// Left join of listings with details on the canonical detail URL.
///
/// Listings are deduplicated first so every output URL is unique. A listing
/// without a detail record is still emitted with `detail: None`.
pub fn merge(listings: Vec<ListingRecord>, details: Vec<DetailRecord>) -> Vec<MergedRecord> {
    let mut by_url: HashMap<String, DetailRecord> = HashMap::with_capacity(details.len());
    for detail in details {
        by_url.entry(detail.detail_url.clone()).or_insert(detail);
    }

    deduplicate(listings, |listing| listing.detail_url.clone())
        .into_iter()
        .map(|listing| {
            let detail = by_url.remove(&listing.detail_url);
            MergedRecord { listing, detail }
        })
        .collect()
}

/// Split `"city, state, country"` into its first three comma-separated parts.
pub fn split_location(raw: &str) -> Location {
    let mut parts = raw.split(',').map(str::trim);
    let mut next = || parts.next().unwrap_or_default().to_string();

    Location {
        city: next(),
        state: next(),
        country: next(),
    }
}

/// Display form of an organization name: trimmed, inner whitespace collapsed.
pub fn normalize_organization(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lookup key for get-or-create: the display form, lowercased.
pub fn organization_key(name: &str) -> String {
    normalize_organization(name).to_lowercase()
}

/// Typed draft for the persister. A missing posted time means "seen now".
pub fn to_draft(record: &MergedRecord, now: DateTime<Utc>) -> JobDraft {
    let listing = &record.listing;
    let detail = record.detail.as_ref();

    JobDraft {
        external_url: listing.detail_url.clone(),
        title: listing.title.trim().to_string(),
        organization: normalize_organization(&listing.organization),
        organization_industry: detail.and_then(|d| d.industry.clone()),
        location: split_location(&listing.raw_location),
        employment_type: detail.and_then(|d| d.employment_type.clone()),
        seniority_level: detail.and_then(|d| d.seniority.clone()),
        function: detail.and_then(|d| d.function.clone()),
        compensation_text: detail.and_then(|d| d.compensation_text.clone()),
        posted_at: detail.and_then(|d| d.posted_at).unwrap_or(now),
        description: detail
            .and_then(|d| d.description.clone())
            .unwrap_or_default(),
    }
}

pub fn to_drafts(records: &[MergedRecord], now: DateTime<Utc>) -> Vec<JobDraft> {
    records.iter().map(|record| to_draft(record, now)).collect()
}
