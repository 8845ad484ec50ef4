//! Wizard services

pub mod polling;
pub mod workflow_orchestrator;

pub use polling::{PollControl, PollOutcome, PollingTask};
pub use workflow_orchestrator::{PredictionHandle, WizardState, WorkflowOrchestrator};
