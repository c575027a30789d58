// src/extract/detail.rs
use super::text::{element_text, find_text_by_selectors, non_empty, selector};
use super::time::parse_posted_at;
use crate::types::DetailRecord;
use chrono::{DateTime, Utc};
use scraper::Html;
use std::collections::HashMap;

const POSTED_SELECTORS: [&str; 3] = [
    "span.posted-time-ago__text",
    "span.topcard__flavor--metadata",
    ".topcard__flavor--metadata",
];
const SALARY_SELECTORS: [&str; 3] = [
    "span.main-job-card__salary-info",
    "div.salary.compensation__salary",
    ".compensation__salary",
];
const DESCRIPTION_SELECTORS: [&str; 2] = ["div.show-more-less-html__markup", "div.description__text"];
const CRITERIA_ITEM: &str = "li.description__job-criteria-item";

/// Parses a posting page into enrichment fields. Never fails; a page that is
/// not a posting at all produces a record with every field empty.
#[derive(Debug, Clone, Default)]
pub struct DetailExtractor;

impl DetailExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, detail_url: &str, markup: &[u8]) -> DetailRecord {
        self.extract_at(detail_url, markup, Utc::now())
    }

    /// Relative posted-time labels are resolved against `now`.
    pub fn extract_at(&self, detail_url: &str, markup: &[u8], now: DateTime<Utc>) -> DetailRecord {
        let html = String::from_utf8_lossy(markup);
        let document = Html::parse_document(&html);
        let mut criteria = criteria_table(&document);

        let posted_at = find_text_by_selectors(&document, &POSTED_SELECTORS)
            .map(|label| parse_posted_at(Some(&label), now));

        DetailRecord {
            detail_url: detail_url.to_string(),
            posted_at,
            compensation_text: find_text_by_selectors(&document, &SALARY_SELECTORS),
            seniority: criteria.remove("seniority level"),
            employment_type: criteria.remove("employment type"),
            function: criteria.remove("job function"),
            industry: criteria.remove("industries"),
            description: find_text_by_selectors(&document, &DESCRIPTION_SELECTORS),
        }
    }
}

/// Label → value pairs from the criteria list, labels lowercased.
fn criteria_table(document: &Html) -> HashMap<String, String> {
    let (Some(item_sel), Some(label_sel), Some(value_sel)) =
        (selector(CRITERIA_ITEM), selector("h3"), selector("span"))
    else {
        return HashMap::new();
    };

    document
        .select(&item_sel)
        .filter_map(|li| {
            let key = li.select(&label_sel).next().map(|h3| element_text(&h3))?;
            let value = li
                .select(&value_sel)
                .map(|span| element_text(&span))
                .find(|text| !text.is_empty())?;
            Some((key.to_lowercase(), value))
        })
        .filter_map(|(key, value)| non_empty(key).map(|key| (key, value)))
        .collect()
}
