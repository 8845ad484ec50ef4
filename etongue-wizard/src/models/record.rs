//! Backend records
//!
//! Entries and predictions are opaque JSON records. The only field the
//! wizard reads is an optional timestamp, used to drop records produced
//! before the current session started.

use chrono::{DateTime, Utc};
use etongue_common::time::{parse_timestamp_value, ParsedTimestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field names checked for a record timestamp, in order
pub const TIMESTAMP_ALIASES: [&str; 5] = ["timestamp", "created_at", "time", "ts", "datetime"];

/// One backend record (collected entry or prediction)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Value);

impl Record {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Timestamp under the first alias holding a non-empty value
    pub fn timestamp(&self) -> ParsedTimestamp {
        TIMESTAMP_ALIASES
            .iter()
            .filter_map(|alias| self.0.get(alias))
            .map(parse_timestamp_value)
            .find(|parsed| *parsed != ParsedTimestamp::Absent)
            .unwrap_or(ParsedTimestamp::Absent)
    }

    /// Whether the record belongs to a session that started at `start`
    pub fn is_in_session(&self, start: DateTime<Utc>) -> bool {
        self.timestamp().is_at_or_after(start)
    }

    pub fn into_inner(self) -> Value {
        self.0
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Record(value)
    }
}

/// Normalize a response body that may be a single record or a sequence
pub fn records_from_response(body: Value) -> Vec<Record> {
    match body {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().map(Record).collect(),
        other => vec![Record(other)],
    }
}

/// Keep records with no usable timestamp or one at/after `start`
pub fn filter_session_records(records: Vec<Record>, start: DateTime<Utc>) -> Vec<Record> {
    records
        .into_iter()
        .filter(|record| record.is_in_session(start))
        .collect()
}
