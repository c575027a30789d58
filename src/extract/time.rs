// src/extract/time.rs
//! Posted-time normalization: "3 hours ago", "2 weeks ago" and absolute dates
//! become UTC timestamps. Anything unreadable falls back to `now`.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

static RE_RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+|an?)\+?\s*(second|sec|minute|min|hour|hr|day|week|wk|month|mo|year|yr)s?\b")
        .expect("valid relative time regex")
});

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%m/%d/%Y", "%d %B %Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Resolve a posted-time label against `now`.
pub fn parse_posted_at(text: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return now;
    };

    let lowered = text.to_lowercase();
    if lowered.contains("just now") || lowered == "today" || lowered.contains("moments ago") {
        return now;
    }
    if lowered == "yesterday" {
        return now - Duration::days(1);
    }

    parse_relative(&lowered, now)
        .or_else(|| parse_absolute(text))
        .unwrap_or(now)
}

fn parse_relative(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let captures = RE_RELATIVE.captures(text)?;
    let magnitude: i64 = match &captures[1] {
        "a" | "an" => 1,
        digits => digits.parse().ok()?,
    };

    let offset = match &captures[2] {
        "second" | "sec" => Duration::try_seconds(magnitude)?,
        "minute" | "min" => Duration::try_minutes(magnitude)?,
        "hour" | "hr" => Duration::try_hours(magnitude)?,
        "day" => Duration::try_days(magnitude)?,
        "week" | "wk" => Duration::try_weeks(magnitude)?,
        "month" | "mo" => Duration::try_days(magnitude.checked_mul(30)?)?,
        "year" | "yr" => Duration::try_days(magnitude.checked_mul(365)?)?,
        _ => return None,
    };

    now.checked_sub_signed(offset)
}

fn parse_absolute(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn relative_hours_and_days() {
        assert_eq!(
            parse_posted_at(Some("3 hours ago"), now()),
            now() - Duration::hours(3)
        );
        assert_eq!(
            parse_posted_at(Some("2 days ago"), now()),
            now() - Duration::hours(48)
        );
        assert_eq!(
            parse_posted_at(Some("45 minutes ago"), now()),
            now() - Duration::minutes(45)
        );
    }

    #[test]
    fn relative_weeks_months_and_articles() {
        assert_eq!(
            parse_posted_at(Some("Reposted 2 weeks ago"), now()),
            now() - Duration::days(14)
        );
        assert_eq!(
            parse_posted_at(Some("1 month ago"), now()),
            now() - Duration::days(30)
        );
        assert_eq!(
            parse_posted_at(Some("an hour ago"), now()),
            now() - Duration::hours(1)
        );
        assert_eq!(
            parse_posted_at(Some("30+ days ago"), now()),
            now() - Duration::days(30)
        );
    }

    #[test]
    fn absolute_dates() {
        let midnight = Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap();
        assert_eq!(parse_posted_at(Some("2024-03-14"), now()), midnight);
        assert_eq!(parse_posted_at(Some("March 14, 2024"), now()), midnight);
        assert_eq!(parse_posted_at(Some("Mar 14, 2024"), now()), midnight);
        assert_eq!(
            parse_posted_at(Some("2024-03-14T09:30:00Z"), now()),
            Utc.with_ymd_and_hms(2024, 3, 14, 9, 30, 0).unwrap()
        );
    }

    #[test]
    fn unreadable_or_missing_falls_back_to_now() {
        assert_eq!(parse_posted_at(None, now()), now());
        assert_eq!(parse_posted_at(Some("   "), now()), now());
        assert_eq!(parse_posted_at(Some("sometime soon"), now()), now());
        assert_eq!(parse_posted_at(Some("Just now"), now()), now());
    }
}
