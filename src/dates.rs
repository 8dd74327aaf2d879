//! Date parsing and day-boundary helpers.
//!
//! All calendar math is done in UTC.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

/// Parse a record timestamp from RFC 3339 or a bare calendar date.
///
/// Bare dates (`YYYY-MM-DD`, `MM-DD-YYYY`, `MM/DD/YYYY`, `_` separators
/// allowed) resolve to midnight UTC. Returns `None` when parsing fails.
pub fn parse_record_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    parse_calendar_date(trimmed).map(start_of_day)
}

/// Parse a calendar date formatted as `YYYY-MM-DD`, `MM-DD-YYYY`, or `MM/DD/YYYY`.
pub fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    let normalized = value.replace(['_', '/'], "-");
    if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%m-%d-%Y") {
        return Some(date);
    }
    None
}

/// Midnight UTC at the start of `date`.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Last representable instant of `date` in UTC.
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    start_of_day(date) + Duration::days(1) - Duration::nanoseconds(1)
}

/// Whole days from `now` until `deadline`, rounded up (negative when past).
pub fn days_until(now: DateTime<Utc>, deadline: DateTime<Utc>) -> i64 {
    let seconds = (deadline - now).num_seconds();
    seconds.div_euclid(86_400) + i64::from(seconds.rem_euclid(86_400) != 0)
}
