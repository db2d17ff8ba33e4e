//! Field parsers for raw CSV values.
//!
//! Every converter trims surrounding whitespace and reports the field it was
//! reading on failure. Nothing here substitutes a default value.

use chrono::{NaiveDateTime, NaiveTime};

use crate::error::{DurationError, RowError};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses an `MM:SS` or `HH:MM:SS` duration into whole seconds.
///
/// `"41:51"` is 41 minutes 51 seconds (2511), not hours and minutes.
///
/// # Errors
///
/// Returns [`DurationError::Negative`] if any component is negative and
/// [`DurationError::Malformed`] for any other shape, non-numeric component or
/// overflow.
pub fn parse_duration(raw: &str) -> Result<u32, DurationError> {
    let malformed = || DurationError::Malformed {
        raw: raw.to_string(),
    };

    let parts: Vec<&str> = raw.trim().split(':').collect();
    if parts.iter().any(|p| p.trim_start().starts_with('-')) {
        return Err(DurationError::Negative {
            raw: raw.to_string(),
        });
    }

    let mut components = Vec::with_capacity(parts.len());
    for part in &parts {
        components.push(part.parse::<u32>().map_err(|_| malformed())?);
    }

    let seconds = match components.as_slice() {
        [m, s] => m.checked_mul(60).and_then(|v| v.checked_add(*s)),
        [h, m, s] => h
            .checked_mul(3600)
            .and_then(|v| v.checked_add(m.checked_mul(60)?))
            .and_then(|v| v.checked_add(*s)),
        _ => None,
    };

    seconds.ok_or_else(malformed)
}

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, RowError> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT).map_err(|_| field("timestamp", raw))
}

/// Parses an `HH:MM:SS` wall clock time such as an in/out time.
pub fn parse_clock(name: &'static str, raw: &str) -> Result<NaiveTime, RowError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S").map_err(|_| field(name, raw))
}

pub fn parse_int(name: &'static str, raw: &str) -> Result<i64, RowError> {
    raw.trim().parse().map_err(|_| field(name, raw))
}

/// Parses a non-negative count such as an object count or id.
pub fn parse_count<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, RowError> {
    raw.trim().parse().map_err(|_| field(name, raw))
}

/// Parses a prediction in seconds. Must be finite and non-negative.
pub fn parse_estimate(name: &'static str, raw: &str) -> Result<f64, RowError> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(field(name, raw)),
    }
}

fn field(name: &'static str, raw: &str) -> RowError {
    RowError::Field {
        field: name,
        raw: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_minutes_seconds() {
        assert_eq!(parse_duration("00:06"), Ok(6));
        assert_eq!(parse_duration("01:18"), Ok(78));
        assert_eq!(parse_duration("41:51"), Ok(2511));
        assert_eq!(parse_duration("1:30"), Ok(90));
    }

    #[test]
    fn test_parse_duration_hours() {
        assert_eq!(parse_duration("01:23:45"), Ok(5025));
        assert_eq!(parse_duration("00:00:00"), Ok(0));
    }

    #[test]
    fn test_parse_duration_trims_whitespace() {
        assert_eq!(parse_duration("  02:05 \t"), Ok(125));
    }

    #[test]
    fn test_parse_duration_rejects_other_shapes() {
        for raw in ["", "42", "1:2:3:4", "aa:10", "01:", ":30", "1.5:00"] {
            assert_eq!(
                parse_duration(raw),
                Err(DurationError::Malformed {
                    raw: raw.to_string()
                }),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn test_parse_duration_rejects_negative() {
        assert_eq!(
            parse_duration("-01:10"),
            Err(DurationError::Negative {
                raw: "-01:10".to_string()
            })
        );
        assert!(matches!(
            parse_duration("01:-10"),
            Err(DurationError::Negative { .. })
        ));
    }

    #[test]
    fn test_parse_duration_overflow_is_malformed() {
        assert!(matches!(
            parse_duration("4294967295:00:00"),
            Err(DurationError::Malformed { .. })
        ));
    }

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp("2025-12-21 00:09:09").unwrap();
        assert_eq!(ts.to_string(), "2025-12-21 00:09:09");
        assert_eq!(parse_timestamp("21/12/2025").unwrap_err().kind(), "timestamp");
    }

    #[test]
    fn test_parse_estimate_rejects_negative_and_nan() {
        assert_eq!(parse_estimate("lidar_est_time", " 12.5 ").unwrap(), 12.5);
        assert!(parse_estimate("lidar_est_time", "-1").is_err());
        assert!(parse_estimate("lidar_est_time", "NaN").is_err());
        assert!(parse_estimate("lidar_est_time", "").is_err());
    }

    #[test]
    fn test_parse_count_rejects_negative() {
        assert_eq!(parse_count::<u32>("object_count", "12").unwrap(), 12);
        let err = parse_count::<u32>("object_count", "-3").unwrap_err();
        assert_eq!(err.kind(), "object_count");
    }

    #[test]
    fn test_parse_clock() {
        let t = parse_clock("in_time", "00:09:03").unwrap();
        assert_eq!(t, NaiveTime::from_hms_opt(0, 9, 3).unwrap());
        assert!(parse_clock("in_time", "25:00:00").is_err());
    }
}
