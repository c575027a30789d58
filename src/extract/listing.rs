// src/extract/listing.rs
use super::text::{find_text_in, selector};
use crate::core::config_manager::SearchConfig;
use crate::types::ListingRecord;
use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

/// Job ids are the first run of more than eight digits in a posting link.
static RE_JOB_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{9,}").expect("valid job id regex"));

const CARD_SELECTORS: [&str; 3] = [
    "div.base-card.job-search-card",
    "div.job-search-card",
    "div.base-search-card",
];
const TITLE_SELECTORS: [&str; 2] = ["h3.base-search-card__title", "h3"];
const ORGANIZATION_SELECTORS: [&str; 2] = ["h4.base-search-card__subtitle", "h4"];
const LOCATION_SELECTORS: [&str; 1] = ["span.job-search-card__location"];
const LINK_SELECTORS: [&str; 2] = ["a.base-card__full-link[href]", "a[href]"];

/// Parses a search-results page into summary cards.
#[derive(Debug, Clone)]
pub struct ListingExtractor {
    base_url: Option<Url>,
    detail_url_prefix: String,
}

impl ListingExtractor {
    pub fn new(base_url: &str, detail_url_prefix: impl Into<String>) -> Self {
        Self {
            base_url: Url::parse(base_url).ok(),
            detail_url_prefix: detail_url_prefix.into(),
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(&config.base_url, config.detail_url_prefix.clone())
    }

    /// Every card with a usable link becomes a record; missing text fields are
    /// left empty. Malformed or unrelated markup yields an empty batch.
    pub fn extract(&self, markup: &[u8]) -> Vec<ListingRecord> {
        let html = String::from_utf8_lossy(markup);
        let document = Html::parse_document(&html);

        let Some(cards) = CARD_SELECTORS
            .iter()
            .filter_map(|css| selector(css))
            .map(|sel| document.select(&sel).collect::<Vec<_>>())
            .find(|cards| !cards.is_empty())
        else {
            return Vec::new();
        };

        let records: Vec<ListingRecord> = cards
            .iter()
            .filter_map(|card| {
                let href = LINK_SELECTORS
                    .iter()
                    .filter_map(|css| selector(css))
                    .find_map(|sel| card.select(&sel).find_map(|a| a.value().attr("href")))?;

                let Some(detail_url) = self.canonicalize(href) else {
                    debug!("Skipping card without a usable link: {:?}", href);
                    return None;
                };

                Some(ListingRecord {
                    title: find_text_in(card, &TITLE_SELECTORS).unwrap_or_default(),
                    organization: find_text_in(card, &ORGANIZATION_SELECTORS).unwrap_or_default(),
                    raw_location: find_text_in(card, &LOCATION_SELECTORS).unwrap_or_default(),
                    detail_url,
                })
            })
            .collect();

        debug!(
            "Extracted {} of {} listing cards",
            records.len(),
            cards.len()
        );
        records
    }

    /// Canonical permalink for a posting link.
    ///
    /// Links carrying a job id map to `<detail_url_prefix><id>`. Others are made
    /// absolute and stripped of query string and fragment. Blank links yield `None`.
    pub fn canonicalize(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }

        if let Some(id) = RE_JOB_ID.find(href) {
            return Some(format!("{}{}", self.detail_url_prefix, id.as_str()));
        }

        let mut absolute = match Url::parse(href) {
            Ok(url) => url,
            Err(_) => self.base_url.as_ref()?.join(href).ok()?,
        };
        if !matches!(absolute.scheme(), "http" | "https") {
            return None;
        }
        absolute.set_query(None);
        absolute.set_fragment(None);
        Some(absolute.to_string())
    }
}
