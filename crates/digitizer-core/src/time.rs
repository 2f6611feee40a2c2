//! Wall-clock timestamps in UTC nanoseconds.

use chrono::{DateTime, TimeZone, Utc};

/// Current UTC time in nanoseconds since the Unix epoch.
#[must_use]
pub fn now_ns() -> u64 {
    Utc::now()
        .timestamp_nanos_opt()
        .map_or(0, |ns| u64::try_from(ns).unwrap_or(0))
}

/// Convert UTC nanoseconds back to a `DateTime`.
#[must_use]
pub fn to_datetime(timestamp_ns: u64) -> DateTime<Utc> {
    Utc.timestamp_nanos(i64::try_from(timestamp_ns).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_precision() {
        let ns = now_ns();
        assert!(ns > 1_600_000_000_000_000_000);
        let dt = to_datetime(ns);
        assert_eq!(dt.timestamp_nanos_opt(), Some(ns as i64));
    }
}
