//! Analysis wizard workflow orchestrator
//!
//! Drives the backend through four phases for one `factory_medicine` id:
//!
//! - **INIT** (`phase_init`): fetch the device init script, save it as `{id}.sh`
//! - **COLLECT** (`phase_collection`): submit readings, then poll entries and
//!   status until the backend reports done
//! - **TRAIN** (`phase_training`): trigger model training
//! - **PREDICT** (`phase_prediction`): enter predict mode, fetch predictions
//!   once after a fixed delay
//!
//! # Architecture
//! The orchestrator is a cheap-to-clone handle. Phase state lives in a shared
//! [`WizardState`] that the presentation layer reads through [`snapshot`];
//! progress is also broadcast as [`WizardEvent`]s. Background work (collection
//! polling, delayed prediction fetch) runs on spawned tasks whose tokens are
//! children of one root token, so [`teardown`] stops everything at once.
//!
//! Session start timestamps are captured by value into each background task,
//! and every state write from a task checks that its session is still the
//! current one.
//!
//! [`snapshot`]: WorkflowOrchestrator::snapshot
//! [`teardown`]: WorkflowOrchestrator::teardown

use crate::client::BackendClient;
use crate::config::TimingSettings;
use crate::error::WizardResult;
use crate::models::{
    CollectionForm, CollectionPhase, CollectionSession, FormField, PredictionSession,
    SessionIdentity,
};
use crate::services::polling::PollOutcome;
use chrono::Utc;
use etongue_common::events::{EventBus, WizardEvent};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// Phase modules (internal implementation)
mod phase_collection;
mod phase_init;
mod phase_prediction;
mod phase_training;

pub use phase_init::{download_script, EMPTY_SCRIPT_PLACEHOLDER};
pub use phase_prediction::PredictionHandle;
pub use phase_training::TRAINING_SUCCESS_MESSAGE;

/// Everything the presentation layer can display
#[derive(Debug, Clone, Default, Serialize)]
pub struct WizardState {
    pub identity: SessionIdentity,
    pub form: CollectionForm,

    /// Init script text, or a placeholder describing why there is none
    pub script: String,
    pub fetching_script: bool,

    pub collection_phase: CollectionPhase,
    pub collection: Option<CollectionSession>,
    /// Last submit failure, cleared on the next submit
    pub collection_error: Option<String>,

    pub training: bool,
    pub training_message: Option<String>,

    pub predicting: bool,
    pub prediction: Option<PredictionSession>,
}

/// Running collection poll task
struct CollectionTask {
    session_id: Uuid,
    cancel: CancellationToken,
    handle: Option<JoinHandle<PollOutcome>>,
}

/// Clears an in-flight flag if the owning call is dropped before it finishes
///
/// The normal exit path clears the flag itself and calls [`disarm`].
///
/// [`disarm`]: FlagGuard::disarm
struct FlagGuard {
    state: Arc<RwLock<WizardState>>,
    clear: fn(&mut WizardState),
    armed: bool,
}

impl FlagGuard {
    fn new(state: &Arc<RwLock<WizardState>>, clear: fn(&mut WizardState)) -> Self {
        Self {
            state: state.clone(),
            clear,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for FlagGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut state) = self.state.try_write() {
            (self.clear)(&mut state);
            return;
        }
        // Lock busy: clear from a task once it is released
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let state = self.state.clone();
            let clear = self.clear;
            runtime.spawn(async move {
                clear(&mut *state.write().await);
            });
        }
    }
}

/// Workflow orchestrator service
#[derive(Clone)]
pub struct WorkflowOrchestrator {
    client: Arc<BackendClient>,
    timing: TimingSettings,
    event_bus: EventBus,
    state: Arc<RwLock<WizardState>>,
    collection_task: Arc<Mutex<Option<CollectionTask>>>,
    shutdown: CancellationToken,
}

impl WorkflowOrchestrator {
    /// Create new workflow orchestrator
    ///
    /// # Arguments
    /// * `client` - Backend client
    /// * `timing` - Poll interval, prediction delay and attempt count
    /// * `event_bus` - Event bus for progress updates
    /// * `identity` - Factory/medicine names read from the persisted profile
    pub fn new(
        client: BackendClient,
        timing: TimingSettings,
        event_bus: EventBus,
        identity: SessionIdentity,
    ) -> Self {
        tracing::info!(
            base_url = %client.base_url(),
            factory_medicine_id = ?identity.factory_medicine_id(),
            poll_interval = ?timing.poll_interval,
            prediction_delay = ?timing.prediction_delay,
            "Workflow orchestrator initialized"
        );

        Self {
            client: Arc::new(client),
            timing,
            event_bus,
            state: Arc::new(RwLock::new(WizardState {
                identity,
                ..WizardState::default()
            })),
            collection_task: Arc::new(Mutex::new(None)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> WizardState {
        self.state.read().await.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<WizardEvent> {
        self.event_bus.subscribe()
    }

    pub fn timing(&self) -> &TimingSettings {
        &self.timing
    }

    pub async fn factory_medicine_id(&self) -> Option<String> {
        self.state
            .read()
            .await
            .identity
            .factory_medicine_id()
            .map(str::to_string)
    }

    pub async fn set_factory_name(&self, factory_name: &str) {
        let mut state = self.state.write().await;
        state.identity.set_factory_name(factory_name);
        self.emit_identity(&state.identity);
    }

    pub async fn set_medicine_name(&self, medicine_name: &str) {
        let mut state = self.state.write().await;
        state.identity.set_medicine_name(medicine_name);
        self.emit_identity(&state.identity);
    }

    pub async fn set_identity(&self, factory_name: &str, medicine_name: &str) {
        let mut state = self.state.write().await;
        state.identity = SessionIdentity::new(factory_name, medicine_name);
        self.emit_identity(&state.identity);
    }

    fn emit_identity(&self, identity: &SessionIdentity) {
        self.event_bus.emit_lossy(WizardEvent::IdentityChanged {
            factory_medicine_id: identity.factory_medicine_id().map(str::to_string),
            timestamp: Utc::now(),
        });
    }

    /// Set one form field from raw operator input
    pub async fn set_form_field(&self, field: FormField, input: &str) -> WizardResult<f64> {
        self.state.write().await.form.set_from_input(field, input)
    }

    pub async fn set_form(&self, form: CollectionForm) {
        self.state.write().await.form = form;
    }

    /// Stop all background work (collection polling, pending prediction fetch)
    ///
    /// Call when the hosting view goes away. Background tasks started after
    /// teardown are cancelled immediately.
    pub async fn teardown(&self) {
        tracing::info!("Tearing down workflow orchestrator");
        self.shutdown.cancel();
        if let Some(task) = self.collection_task.lock().await.as_ref() {
            task.cancel.cancel();
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
