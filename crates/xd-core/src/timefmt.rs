//! Epoch-millisecond rendering.
//!
//! Zero or absent timestamps render as [`NOT_AVAILABLE`].

use chrono::{DateTime, Utc};

/// Sentinel for a missing timestamp.
pub const NOT_AVAILABLE: &str = "N/A";

fn to_datetime(epoch_ms: Option<i64>) -> Option<DateTime<Utc>> {
    match epoch_ms {
        Some(ms) if ms != 0 => DateTime::from_timestamp_millis(ms),
        _ => None,
    }
}

/// Renders `YYYY-MM-DD HH:MM:SS UTC`.
pub fn format_epoch_ms(epoch_ms: Option<i64>) -> String {
    to_datetime(epoch_ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Hour bucket key: the timestamp truncated to its UTC hour, `YYYY-MM-DD HH:00`.
pub fn hour_key(epoch_ms: Option<i64>) -> String {
    to_datetime(epoch_ms)
        .map(|dt| dt.format("%Y-%m-%d %H:00").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2023-11-14 22:13:20 UTC
    const TS: i64 = 1_700_000_000_000;

    #[test]
    fn test_format_epoch_ms() {
        assert_eq!(format_epoch_ms(Some(TS)), "2023-11-14 22:13:20 UTC");
        assert_eq!(format_epoch_ms(Some(0)), "N/A");
        assert_eq!(format_epoch_ms(None), "N/A");
    }

    #[test]
    fn test_hour_key_truncates_to_hour() {
        assert_eq!(hour_key(Some(TS)), "2023-11-14 22:00");
        assert_eq!(hour_key(Some(TS + 46 * 60 * 1000)), "2023-11-14 22:00");
        assert_eq!(hour_key(Some(TS + 47 * 60 * 1000)), "2023-11-14 23:00");
        assert_eq!(hour_key(None), "N/A");
    }
}
