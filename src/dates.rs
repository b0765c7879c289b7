use chrono::{NaiveDate, NaiveDateTime};

use crate::manifest::MediaRecord;

/// Datetime formats tried in order. The exports also emit a trailing zone
/// name (`"2023-05-01 10:00:00 UTC"`); that suffix is stripped before
/// parsing, so no format needs to match it.
const FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%SZ"];

/// Best-effort timestamp extraction from a media record.
///
/// Only the first candidate field carrying a non-empty value is consulted; if
/// that value parses in none of the known formats the result is `None`, even
/// when a later field would have parsed. Unparseable input never panics or
/// surfaces an error.
pub fn resolve(record: &MediaRecord) -> Option<NaiveDateTime> {
    let raw = record
        .date_candidates()
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())?;
    parse_value(raw)
}

fn parse_value(raw: &str) -> Option<NaiveDateTime> {
    let cleaned = raw.split(" UTC").next().unwrap_or(raw).trim();

    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(cleaned, format) {
            return Some(dt);
        }
    }
    // Date-only values land at midnight.
    NaiveDate::parse_from_str(cleaned, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
