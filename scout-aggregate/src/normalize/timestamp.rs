//! Timestamp parsing into the provider's civil timezone.
//!
//! Providers disagree on date shapes. Everything parsed here lands on one
//! fixed offset (UTC+09:00) so comparisons across sources are meaningful.
//! Unparsable input yields `None`, never an error.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};

/// Civil timezone offset of the procurement providers, in seconds.
pub const CIVIL_OFFSET_SECS: i32 = 9 * 3600;

/// Representation used when canonical records are rendered back to text.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The fixed civil offset all timestamps are normalised to.
pub fn civil_offset() -> FixedOffset {
    FixedOffset::east_opt(CIVIL_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Current time in the civil timezone.
pub fn civil_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&civil_offset())
}

/// Parse a provider timestamp.
///
/// Accepted shapes:
/// - `YYYY-MM-DD`
/// - `YYYYMMDD`, `YYYYMMDDHHMM`, `YYYYMMDDHHMMSS`
/// - `YYYY-MM-DD HH:MM` and `YYYY-MM-DD HH:MM:SS` (also with `T`)
/// - RFC 3339 / RFC 2822 with an explicit offset, converted to civil time
pub fn parse_timestamp(input: &str) -> Option<DateTime<FixedOffset>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(naive) = parse_compact(s) {
        return localize(naive);
    }

    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return localize(naive);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return localize(date.and_time(NaiveTime::MIN));
    }

    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_rfc2822(s))
        .ok()
        .map(|t| t.with_timezone(&civil_offset()))
}

/// All-digit shapes: 8, 12 or 14 characters.
fn parse_compact(s: &str) -> Option<NaiveDateTime> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let num = |range: std::ops::Range<usize>| s.get(range)?.parse::<u32>().ok();

    let (hour, minute, second) = match s.len() {
        8 => (0, 0, 0),
        12 => (num(8..10)?, num(10..12)?, 0),
        14 => (num(8..10)?, num(10..12)?, num(12..14)?),
        _ => return None,
    };
    let year = i32::try_from(num(0..4)?).ok()?;
    NaiveDate::from_ymd_opt(year, num(4..6)?, num(6..8)?)?.and_hms_opt(hour, minute, second)
}

fn localize(naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    civil_offset().from_local_datetime(&naive).single()
}

/// Render as the compact `YYYYMMDDHHMM` shape the procurement API expects.
pub fn to_compact_minutes(t: &DateTime<FixedOffset>) -> String {
    t.with_timezone(&civil_offset()).format("%Y%m%d%H%M").to_string()
}
