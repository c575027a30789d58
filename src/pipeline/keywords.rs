// src/pipeline/keywords.rs
use chrono::{DateTime, Timelike, Utc};

/// Deterministic keyword choice from the hour of day, so coverage rotates
/// without any stored state.
#[derive(Debug, Clone)]
pub struct KeywordRotation {
    keywords: Vec<String>,
}

impl KeywordRotation {
    /// `None` for an empty list.
    pub fn new(keywords: Vec<String>) -> Option<Self> {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        (!keywords.is_empty()).then_some(Self { keywords })
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn current_at(&self, now: DateTime<Utc>) -> &str {
        self.at_hour(now.hour() as usize)
    }

    pub fn next_at(&self, now: DateTime<Utc>) -> &str {
        self.at_hour(now.hour() as usize + 1)
    }

    pub fn current(&self) -> &str {
        self.current_at(Utc::now())
    }

    pub fn next(&self) -> &str {
        self.next_at(Utc::now())
    }

    fn at_hour(&self, hour: usize) -> &str {
        &self.keywords[hour % self.keywords.len()]
    }
}
