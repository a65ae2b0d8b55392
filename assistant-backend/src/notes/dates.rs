//! Date filter parsing for note listings.
//!
//! Pure functions: the caller passes "now", so keyword resolution is
//! deterministic under test.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::db::timestamp;
use crate::error::{StoreError, StoreResult};

/// Resolve a date filter to a calendar day (UTC).
///
/// Accepts `YYYY-MM-DD`, RFC 3339 datetimes, `YYYY-MM-DDTHH:MM:SS`, or the
/// keywords `today`, `now`, `yesterday`, `this week`, `week`,
/// `this month`, `month` (case-insensitive).
pub fn parse_date_filter(input: &str, now: DateTime<Utc>) -> StoreResult<NaiveDate> {
    let trimmed = input.trim();
    let today = now.date_naive();

    match trimmed.to_lowercase().as_str() {
        "today" | "now" => return Ok(today),
        "yesterday" => return Ok(today - Duration::days(1)),
        "this week" | "week" => {
            let offset = today.weekday().num_days_from_monday() as i64;
            return Ok(today - Duration::days(offset));
        }
        "this month" | "month" => {
            return NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
                .ok_or_else(|| StoreError::validation("Could not resolve start of month"));
        }
        _ => {}
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt.date());
    }

    Err(StoreError::Validation(format!(
        "Unrecognized date '{}'. Use YYYY-MM-DD or one of: today, yesterday, this week, this month",
        input
    )))
}

/// Storage-format timestamp of midnight UTC at the start of `date`.
pub fn day_start(date: NaiveDate) -> String {
    timestamp(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

/// `[start, end)` storage-format bounds covering the whole of `date`.
pub fn day_bounds(date: NaiveDate) -> (String, String) {
    (day_start(date), day_start(date + Duration::days(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wednesday() -> DateTime<Utc> {
        // 2025-06-18 is a Wednesday
        Utc.with_ymd_and_hms(2025, 6, 18, 15, 30, 0).unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_keywords() {
        let now = wednesday();
        assert_eq!(parse_date_filter("today", now).unwrap(), ymd(2025, 6, 18));
        assert_eq!(parse_date_filter("NOW", now).unwrap(), ymd(2025, 6, 18));
        assert_eq!(parse_date_filter("yesterday", now).unwrap(), ymd(2025, 6, 17));
        assert_eq!(parse_date_filter("this week", now).unwrap(), ymd(2025, 6, 16));
        assert_eq!(parse_date_filter(" week ", now).unwrap(), ymd(2025, 6, 16));
        assert_eq!(parse_date_filter("This Month", now).unwrap(), ymd(2025, 6, 1));
        assert_eq!(parse_date_filter("month", now).unwrap(), ymd(2025, 6, 1));
    }

    #[test]
    fn test_yesterday_crosses_month_boundary() {
        let first = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 1).unwrap();
        assert_eq!(parse_date_filter("yesterday", first).unwrap(), ymd(2025, 2, 28));
    }

    #[test]
    fn test_week_on_monday_is_same_day() {
        let monday = Utc.with_ymd_and_hms(2025, 6, 16, 8, 0, 0).unwrap();
        assert_eq!(parse_date_filter("this week", monday).unwrap(), ymd(2025, 6, 16));
    }

    #[test]
    fn test_literal_dates() {
        let now = wednesday();
        assert_eq!(parse_date_filter("2000-01-01", now).unwrap(), ymd(2000, 1, 1));
        assert_eq!(
            parse_date_filter("2024-02-29T23:10:00+00:00", now).unwrap(),
            ymd(2024, 2, 29)
        );
        assert_eq!(
            parse_date_filter("2024-02-29T23:10:00.5", now).unwrap(),
            ymd(2024, 2, 29)
        );
    }

    #[test]
    fn test_days_are_utc_days() {
        // Late evening UTC is already tomorrow east of Greenwich; still today here
        let late = Utc.with_ymd_and_hms(2025, 6, 18, 23, 45, 0).unwrap();
        assert_eq!(parse_date_filter("today", late).unwrap(), ymd(2025, 6, 18));

        assert_eq!(
            parse_date_filter("2025-06-18T21:00:00-05:00", late).unwrap(),
            ymd(2025, 6, 19)
        );
        assert_eq!(
            parse_date_filter("2025-06-19T01:00:00+02:00", late).unwrap(),
            ymd(2025, 6, 18)
        );
    }

    #[test]
    fn test_unparseable_is_validation_error() {
        let now = wednesday();
        for bad in ["last tuesday", "2025-13-01", "", "01/02/2025"] {
            let err = parse_date_filter(bad, now).unwrap_err();
            assert!(matches!(err, StoreError::Validation(_)), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_day_bounds() {
        let (start, end) = day_bounds(ymd(2025, 12, 31));
        assert_eq!(start, "2025-12-31T00:00:00.000000Z");
        assert_eq!(end, "2026-01-01T00:00:00.000000Z");
    }
}
