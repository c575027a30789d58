// src/extract/mod.rs
//! HTML extraction for listing and posting pages. Extraction never fails:
//! missing fields come back empty and unrelated markup yields no records.

pub mod detail;
pub mod listing;
pub mod text;
pub mod time;

pub use detail::DetailExtractor;
pub use listing::ListingExtractor;
pub use time::parse_posted_at;
