//! Test Helper Utilities
//!
//! Shared utilities for testing etongue-wizard against a local mock backend

#![allow(dead_code)]

pub mod mock_backend;

pub use mock_backend::{MockBackend, MockResponse, RecordedRequest, StalledBackend};

use chrono::{Duration as ChronoDuration, Utc};
use etongue_common::EventBus;
use etongue_wizard::models::SessionIdentity;
use etongue_wizard::{BackendClient, TimingSettings, WorkflowOrchestrator};
use serde_json::{json, Value};
use std::time::Duration;

/// Short timers so tests finish in well under a second
pub fn fast_timing() -> TimingSettings {
    TimingSettings {
        poll_interval: Duration::from_millis(50),
        prediction_delay: Duration::from_millis(200),
        prediction_attempts: 1,
        request_timeout: Duration::from_secs(2),
    }
}

/// Orchestrator wired to `base_url` with the given identity
pub fn create_test_orchestrator(
    base_url: &str,
    timing: TimingSettings,
    factory_name: &str,
    medicine_name: &str,
) -> WorkflowOrchestrator {
    let client = BackendClient::new(base_url, timing.request_timeout).unwrap();
    WorkflowOrchestrator::new(
        client,
        timing,
        EventBus::new(100),
        SessionIdentity::new(factory_name, medicine_name),
    )
}

/// Record stamped with the current time (ISO 8601)
pub fn fresh_record(label: &str) -> Value {
    json!({ "timestamp": Utc::now().to_rfc3339(), "label": label })
}

/// Record stamped well before any session in the test started
pub fn stale_record(label: &str) -> Value {
    let old = Utc::now() - ChronoDuration::seconds(600);
    json!({ "timestamp": old.to_rfc3339(), "label": label })
}
