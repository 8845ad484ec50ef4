//! Event types for the wizard event system
//!
//! The orchestrator broadcasts every phase change through an [`EventBus`] so
//! a presentation layer (CLI, web UI) can follow progress without polling
//! orchestrator state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Wizard event types
///
/// Events are broadcast via EventBus and can be serialized for transmission
/// to a UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WizardEvent {
    /// Factory or medicine name changed
    IdentityChanged {
        /// Derived `factory_medicine` id, None while either name is empty
        factory_medicine_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Init script retrieval finished (successfully or with placeholder text)
    ScriptFetched {
        factory_medicine_id: String,
        /// False when the script text is an error placeholder
        success: bool,
        timestamp: DateTime<Utc>,
    },

    /// Collection form accepted by the backend, polling started
    CollectionStarted {
        session_id: Uuid,
        factory_medicine_id: String,
        started_at: DateTime<Utc>,
    },

    /// A poll cycle appended entries to the collection session
    EntriesAppended {
        session_id: Uuid,
        /// Entries added by this cycle
        added: usize,
        /// Entries accumulated so far
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// One fetch inside a poll cycle failed; polling continues
    PollCycleFailed {
        session_id: Uuid,
        endpoint: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Backend reported collection finished (`status == 0`)
    CollectionDone {
        session_id: Uuid,
        total_entries: usize,
        timestamp: DateTime<Utc>,
    },

    /// Polling stopped by teardown or by a newer submission
    CollectionCancelled {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Collection submit was rejected; no polling started
    CollectionFailed {
        factory_medicine_id: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Training request finished
    TrainingFinished {
        target: String,
        success: bool,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Predict mode accepted by the backend, delayed fetch scheduled
    PredictionRequested {
        session_id: Uuid,
        started_at: DateTime<Utc>,
    },

    /// Predictions fetched and filtered
    PredictionReady {
        session_id: Uuid,
        count: usize,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Prediction request or fetch failed
    PredictionFailed {
        /// Prediction session the failure belongs to, if one was created
        session_id: Option<Uuid>,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for [`WizardEvent`]s
///
/// Cloning the bus yields another handle to the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WizardEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<WizardEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: WizardEvent,
    ) -> Result<usize, broadcast::error::SendError<WizardEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: WizardEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
