//! Parsing of front matter dates.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a front matter date. Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS`,
/// `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DD`. Forms without an offset are taken
/// as local time.
pub fn parse(input: &str) -> Option<DateTime<FixedOffset>> {
    let input = input.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(input) {
        return Some(date);
    }
    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, DATE_FORMAT)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;
    Some(local(&naive))
}

fn local(naive: &NaiveDateTime) -> DateTime<FixedOffset> {
    match Local.from_local_datetime(naive).earliest() {
        Some(date) => date.fixed_offset(),
        // Wall-clock times skipped by a DST transition.
        None => Utc.from_utc_datetime(naive).fixed_offset(),
    }
}

/// The date used for documents without a usable one.
pub fn epoch() -> DateTime<FixedOffset> {
    DateTime::<Utc>::UNIX_EPOCH.fixed_offset()
}
