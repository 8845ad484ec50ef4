//! etongue-wizard library interface
//!
//! Client-side orchestration of the e-tongue analysis wizard: init script
//! retrieval, data collection polling, training trigger and delayed
//! prediction fetch against the analysis backend.

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::client::{BackendClient, BackendError};
pub use crate::config::{TimingSettings, WizardSettings};
pub use crate::error::{WizardError, WizardResult};
pub use crate::services::WorkflowOrchestrator;
