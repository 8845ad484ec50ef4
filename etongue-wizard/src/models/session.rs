//! Collection and prediction sessions
//!
//! Collection state machine:
//! IDLE → SUBMITTING → POLLING → DONE
//!
//! A failed submit returns to IDLE. A new submit from any state starts a
//! fresh session with an empty entry list.

use super::record::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// `status` sentinel values exchanged on `/picron/{id}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PicronStatus {
    /// Collection finished (reported by the backend)
    Done = 0,
    /// Collection active (sent on submit)
    Collecting = 1,
    /// Predict mode (sent on prediction request)
    Predict = 2,
}

impl PicronStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Numeric value of `status`, falling back to `status_code` when absent
///
/// Accepts JSON numbers and numeric strings.
pub fn status_code(body: &Value) -> Option<f64> {
    let field = body
        .get("status")
        .filter(|v| !v.is_null())
        .or_else(|| body.get("status_code"))?;

    match field {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// True when a status poll reports collection finished
pub fn is_collection_done(body: &Value) -> bool {
    status_code(body) == Some(f64::from(PicronStatus::Done.code()))
}

/// Data-collection phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CollectionPhase {
    #[default]
    Idle,
    Submitting,
    Polling,
    Done,
}

/// One collection run, from submit until done or teardown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSession {
    pub session_id: Uuid,
    /// Taken before the submit request is sent
    pub started_at: DateTime<Utc>,
    /// Accumulated entries, in arrival order
    pub entries: Vec<Record>,
    pub active: bool,
    /// Poll cycles completed so far
    pub cycles: u64,
}

impl CollectionSession {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            entries: Vec::new(),
            active: false,
            cycles: 0,
        }
    }

    /// Append filtered records; returns the new total
    pub fn append(&mut self, records: Vec<Record>) -> usize {
        self.entries.extend(records);
        self.entries.len()
    }
}

impl Default for CollectionSession {
    fn default() -> Self {
        Self::new()
    }
}

/// One prediction request and its single delayed result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSession {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub predictions: Vec<Record>,
    pub message: String,
    /// Set once predictions (or an error message) have been stored
    pub completed: bool,
}

impl PredictionSession {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            predictions: Vec::new(),
            message: String::new(),
            completed: false,
        }
    }
}

impl Default for PredictionSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_sentinels() {
        assert_eq!(PicronStatus::Done.code(), 0);
        assert_eq!(PicronStatus::Collecting.code(), 1);
        assert_eq!(PicronStatus::Predict.code(), 2);
    }

    #[test]
    fn test_done_detection() {
        assert!(is_collection_done(&json!({"status": 0})));
        assert!(is_collection_done(&json!({"status": 0.0})));
        assert!(is_collection_done(&json!({"status": "0"})));
        assert!(is_collection_done(&json!({"status_code": 0})));
        assert!(is_collection_done(&json!({"status": null, "status_code": 0})));

        assert!(!is_collection_done(&json!({"status": 1})));
        assert!(!is_collection_done(&json!({"status": "running"})));
        assert!(!is_collection_done(&json!({"status": 1, "status_code": 0})));
        assert!(!is_collection_done(&json!({})));
        assert!(!is_collection_done(&json!([{"status": 0}])));
        assert!(!is_collection_done(&Value::Null));
    }

    #[test]
    fn test_append_preserves_order() {
        let mut session = CollectionSession::new();
        assert_eq!(session.append(vec![Record(json!(1)), Record(json!(2))]), 2);
        assert_eq!(session.append(vec![Record(json!(3))]), 3);
        assert_eq!(
            session.entries,
            vec![Record(json!(1)), Record(json!(2)), Record(json!(3))]
        );
    }

    #[test]
    fn test_phase_serializes_uppercase() {
        assert_eq!(serde_json::to_value(CollectionPhase::Polling).unwrap(), "POLLING");
    }
}
