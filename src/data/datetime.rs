use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Bare numbers in this range are read as Unix seconds.
pub const EPOCH_SECONDS_RANGE: std::ops::Range<f64> = 1e9..1e10;

/// Bare numbers at or above this are read as Unix milliseconds.
pub const EPOCH_MILLIS_MIN: f64 = 1e12;

/// Naive (timezone-less) ISO-8601 variants, interpreted as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a cell as a timestamp and return Unix milliseconds.
///
/// Accepts RFC 3339 / ISO-8601 strings (with or without an offset, or
/// date-only), and bare epoch numbers: `[1e9, 1e10)` is taken as seconds
/// and rescaled, `>= 1e12` as milliseconds.
pub fn parse_timestamp(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(n) = value.parse::<f64>() {
        return epoch_to_millis(n);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_millis() as f64);
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.and_utc().timestamp_millis() as f64);
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
            return Some(d.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis() as f64);
        }
    }

    None
}

/// Classify a bare number as an epoch timestamp, returning milliseconds.
pub fn epoch_to_millis(n: f64) -> Option<f64> {
    if !n.is_finite() {
        None
    } else if EPOCH_SECONDS_RANGE.contains(&n) {
        Some(n * 1000.0)
    } else if n >= EPOCH_MILLIS_MIN {
        Some(n)
    } else {
        None
    }
}

/// Whether an axis whose values span `[min, max]` looks like epoch milliseconds.
pub fn looks_like_epoch_millis(min: f64, max: f64) -> bool {
    min.is_finite() && max.is_finite() && min >= EPOCH_MILLIS_MIN && max >= EPOCH_MILLIS_MIN
}

/// Format Unix milliseconds as a human-readable UTC datetime string.
/// Shows milliseconds only when the timestamp has a sub-second component.
pub fn format_timestamp_ms(ms: f64) -> String {
    if !ms.is_finite() {
        return format!("{ms}");
    }
    let whole = ms.floor() as i64;
    match DateTime::<Utc>::from_timestamp_millis(whole) {
        Some(dt) => {
            if whole % 1000 == 0 {
                dt.format("%Y-%m-%d %H:%M:%S").to_string()
            } else {
                dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
            }
        }
        None => format!("{ms:.0}"),
    }
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_with_offset() {
        let ms = parse_timestamp("2024-01-01T00:00:01.500Z").unwrap();
        assert_eq!(ms, 1_704_067_201_500.0);
    }

    #[test]
    fn parses_naive_iso_as_utc() {
        assert_eq!(parse_timestamp("2024-01-01T00:00:00"), Some(1_704_067_200_000.0));
        assert_eq!(parse_timestamp("2024-01-01 00:00:00"), Some(1_704_067_200_000.0));
        assert_eq!(parse_timestamp("2024-01-01"), Some(1_704_067_200_000.0));
    }

    #[test]
    fn classifies_epoch_numbers() {
        assert_eq!(parse_timestamp("1700000000"), Some(1_700_000_000_000.0));
        assert_eq!(parse_timestamp("1700000000000"), Some(1_700_000_000_000.0));
        // Between the two ranges: neither seconds nor milliseconds.
        assert_eq!(parse_timestamp("50000000000"), None);
        assert_eq!(parse_timestamp("42"), None);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("temperature"), None);
        assert_eq!(parse_timestamp("12:30"), None);
    }

    #[test]
    fn formats_with_and_without_millis() {
        assert_eq!(format_timestamp_ms(1_704_067_200_000.0), "2024-01-01 00:00:00");
        assert_eq!(format_timestamp_ms(1_704_067_200_250.0), "2024-01-01 00:00:00.250");
    }
}
