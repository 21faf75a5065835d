//! Best-effort publication dates from free text.
//!
//! Patterns are tried in a fixed order and the first valid date wins:
//! 1. `YYYY-MM-DD` or `YYYY/MM/DD` anywhere in the text
//! 2. `Month D, YYYY` with a full month name (case-insensitive)
//! 3. RFC 2822 (the RSS `pubDate` format)
//! 4. RFC 3339 / ISO 8601 timestamp, naive timestamps read as UTC

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

static NUMERIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(20\d{2})[-/](\d{1,2})[-/](\d{1,2})").expect("numeric date regex")
});

static MONTH_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{1,2}),\s*(20\d{2})",
    )
    .expect("month name regex")
});

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Resolve a publication date from `text`, normalized to UTC.
///
/// Returns `None` when no pattern yields a valid date; the caller treats
/// that as "undated".
pub fn resolve_date(text: &str) -> Option<DateTime<Utc>> {
    numeric_date(text)
        .or_else(|| month_name_date(text))
        .map(midnight_utc)
        .or_else(|| rfc2822(text))
        .or_else(|| iso_timestamp(text))
}

fn numeric_date(text: &str) -> Option<NaiveDate> {
    NUMERIC_RE.captures_iter(text).find_map(|caps| {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

fn month_name_date(text: &str) -> Option<NaiveDate> {
    MONTH_NAME_RE.captures_iter(text).find_map(|caps| {
        let name = caps[1].to_lowercase();
        let month = MONTHS.iter().position(|m| *m == name)? as u32 + 1;
        let day = caps[2].parse().ok()?;
        let year = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

fn rfc2822(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(text.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn iso_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}
