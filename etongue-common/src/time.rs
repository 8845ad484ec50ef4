//! Timestamp parsing for backend records
//!
//! Backend records may carry a timestamp in one of three shapes:
//! 1. an ISO-8601 string (`2024-03-01T10:15:00Z`, with or without offset)
//! 2. a numeric string (`"1709288100"`)
//! 3. a JSON number epoch (`1709288100` or `1709288100000`)
//!
//! Epoch values with magnitude below 1e11 are taken as seconds, larger
//! values as milliseconds. 1e11 seconds is past the year 5000 while 1e11
//! milliseconds is in 1973, so the two ranges do not collide for real data.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// Result of attempting to read a record's timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedTimestamp {
    /// No timestamp field present (or null/empty)
    Absent,
    /// A timestamp field was present but matched none of the three formats
    Unparseable,
    /// Successfully parsed instant
    At(DateTime<Utc>),
}

impl ParsedTimestamp {
    /// Keep-on-ambiguity: records without a usable timestamp always pass
    pub fn is_at_or_after(&self, start: DateTime<Utc>) -> bool {
        match self {
            ParsedTimestamp::At(instant) => *instant >= start,
            ParsedTimestamp::Absent | ParsedTimestamp::Unparseable => true,
        }
    }
}

/// Classify a raw JSON timestamp value
pub fn parse_timestamp_value(value: &Value) -> ParsedTimestamp {
    match value {
        Value::Null => ParsedTimestamp::Absent,
        Value::String(s) if s.trim().is_empty() => ParsedTimestamp::Absent,
        Value::String(s) => parse_iso8601(s)
            .or_else(|| parse_numeric_string(s))
            .map_or(ParsedTimestamp::Unparseable, ParsedTimestamp::At),
        Value::Number(n) => n
            .as_f64()
            .and_then(epoch_to_datetime)
            .map_or(ParsedTimestamp::Unparseable, ParsedTimestamp::At),
        _ => ParsedTimestamp::Unparseable,
    }
}

/// Parse an ISO-8601 timestamp. Values without an offset are taken as UTC.
pub fn parse_iso8601(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_numeric_string(s: &str) -> Option<DateTime<Utc>> {
    s.trim().parse::<f64>().ok().and_then(epoch_to_datetime)
}

/// Convert an epoch in seconds or milliseconds to a UTC instant
pub fn epoch_to_datetime(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() {
        return None;
    }

    let millis = if epoch.abs() >= EPOCH_MILLIS_THRESHOLD {
        epoch
    } else {
        epoch * 1000.0
    };

    if millis.abs() > i64::MAX as f64 {
        return None;
    }

    DateTime::from_timestamp_millis(millis.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap()
    }

    #[test]
    fn test_iso_with_offset() {
        assert_eq!(
            parse_timestamp_value(&json!("2024-03-01T12:15:00+02:00")),
            ParsedTimestamp::At(instant())
        );
    }

    #[test]
    fn test_iso_without_offset_is_utc() {
        assert_eq!(
            parse_timestamp_value(&json!("2024-03-01T10:15:00.000")),
            ParsedTimestamp::At(instant())
        );
        assert_eq!(
            parse_timestamp_value(&json!("2024-03-01 10:15:00")),
            ParsedTimestamp::At(instant())
        );
    }

    #[test]
    fn test_numeric_string_epoch_seconds() {
        let secs = instant().timestamp().to_string();
        assert_eq!(parse_timestamp_value(&json!(secs)), ParsedTimestamp::At(instant()));
    }

    #[test]
    fn test_number_epoch_seconds_and_millis() {
        let secs = instant().timestamp();
        assert_eq!(parse_timestamp_value(&json!(secs)), ParsedTimestamp::At(instant()));
        assert_eq!(
            parse_timestamp_value(&json!(secs * 1000)),
            ParsedTimestamp::At(instant())
        );
        assert_eq!(
            parse_timestamp_value(&json!(secs as f64 + 0.25)),
            ParsedTimestamp::At(instant() + chrono::Duration::milliseconds(250))
        );
    }

    #[test]
    fn test_absent_and_unparseable() {
        assert_eq!(parse_timestamp_value(&Value::Null), ParsedTimestamp::Absent);
        assert_eq!(parse_timestamp_value(&json!("  ")), ParsedTimestamp::Absent);
        assert_eq!(parse_timestamp_value(&json!("yesterday")), ParsedTimestamp::Unparseable);
        assert_eq!(parse_timestamp_value(&json!(true)), ParsedTimestamp::Unparseable);
        assert_eq!(parse_timestamp_value(&json!({"a": 1})), ParsedTimestamp::Unparseable);
    }

    #[test]
    fn test_keep_on_ambiguity() {
        let start = instant();
        assert!(ParsedTimestamp::Absent.is_at_or_after(start));
        assert!(ParsedTimestamp::Unparseable.is_at_or_after(start));
        assert!(ParsedTimestamp::At(start).is_at_or_after(start));
        assert!(!ParsedTimestamp::At(start - chrono::Duration::seconds(1)).is_at_or_after(start));
    }
}
