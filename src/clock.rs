//! Operational-timezone time helpers.
//!
//! All daily boundaries are anchored to a fixed UTC+7 offset (Asia/Bangkok),
//! never the host timezone, so the round calendar is stable regardless of
//! where the worker runs.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Fixed operational offset from UTC, in seconds (UTC+7).
pub const OPERATIONAL_UTC_OFFSET_SECS: i64 = 7 * 3600;

const DATE_FMT: &str = "%Y-%m-%d";

/// Current unix timestamp in seconds.
pub fn now_ts() -> i64 {
    Utc::now().timestamp()
}

/// Calendar date at `ts` in the operational timezone, as `YYYY-MM-DD`.
pub fn operational_date(ts: i64) -> String {
    let shifted = DateTime::from_timestamp(ts + OPERATIONAL_UTC_OFFSET_SECS, 0).unwrap_or_default();
    shifted.date_naive().format(DATE_FMT).to_string()
}

/// Dates of the lookback window, oldest first, ending with the operational
/// date of `ts` itself.
pub fn lookback_dates(ts: i64, lookback_days: u32) -> Vec<String> {
    let today = DateTime::from_timestamp(ts + OPERATIONAL_UTC_OFFSET_SECS, 0)
        .map(|dt| dt.date_naive())
        .unwrap_or_default();

    (0..=lookback_days)
        .rev()
        .map(|back| (today - Duration::days(back as i64)).format(DATE_FMT).to_string())
        .collect()
}

/// Draw timestamp for round `seq` (1-based) of `date`: the daily base hour in
/// operational time plus `(seq - 1) * interval_hours`.
pub fn draw_ts(date: &str, seq: u32, base_hour: u32, interval_hours: u32) -> Result<i64> {
    let day = NaiveDate::parse_from_str(date, DATE_FMT)
        .with_context(|| format!("invalid date string: {date}"))?;
    let base = day
        .and_hms_opt(base_hour, 0, 0)
        .with_context(|| format!("invalid base draw hour: {base_hour}"))?;

    // Local wall-clock time re-based to UTC by subtracting the fixed offset.
    let base_utc = base.and_utc().timestamp() - OPERATIONAL_UTC_OFFSET_SECS;
    Ok(base_utc + (seq as i64 - 1) * interval_hours as i64 * 3600)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operational_date_crosses_midnight_before_utc() {
        // 2025-01-20 18:30 UTC == 2025-01-21 01:30 Bangkok
        let ts = NaiveDate::from_ymd_opt(2025, 1, 20)
            .unwrap()
            .and_hms_opt(18, 30, 0)
            .unwrap()
            .and_utc()
            .timestamp();
        assert_eq!(operational_date(ts), "2025-01-21");
    }

    #[test]
    fn test_draw_ts_spacing() {
        let r1 = draw_ts("2025-01-20", 1, 2, 2).unwrap();
        let r2 = draw_ts("2025-01-20", 2, 2, 2).unwrap();
        let r12 = draw_ts("2025-01-20", 12, 2, 2).unwrap();
        assert_eq!(r2 - r1, 2 * 3600);
        assert_eq!(r12 - r1, 11 * 2 * 3600);

        // First draw is 02:00 Bangkok == 19:00 UTC the previous day.
        let expected = NaiveDate::from_ymd_opt(2025, 1, 19)
            .unwrap()
            .and_hms_opt(19, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp();
        assert_eq!(r1, expected);
    }

    #[test]
    fn test_lookback_dates_oldest_first() {
        let ts = NaiveDate::from_ymd_opt(2025, 1, 20)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp();
        let dates = lookback_dates(ts, 2);
        assert_eq!(dates, vec!["2025-01-18", "2025-01-19", "2025-01-20"]);
    }

    #[test]
    fn test_draw_ts_rejects_garbage() {
        assert!(draw_ts("not-a-date", 1, 2, 2).is_err());
        assert!(draw_ts("2025-01-20", 1, 42, 2).is_err());
    }
}
