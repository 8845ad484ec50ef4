//! Phase 3: TRAIN
//!
//! Trigger model training for the current factory/medicine.
//!
//! The operator must pick a data file before training is allowed, but the
//! backend trains on data it already collected: the request carries no body
//! and the file is not uploaded.

use super::{FlagGuard, WorkflowOrchestrator};
use crate::error::{WizardError, WizardResult};
use chrono::Utc;
use etongue_common::events::WizardEvent;
use std::path::Path;

/// Message stored after the backend accepted a training request
pub const TRAINING_SUCCESS_MESSAGE: &str = "Training started successfully";

impl WorkflowOrchestrator {
    /// Start training
    ///
    /// Requires a selected file and either the session id or, failing that,
    /// the factory name as path segment. The outcome message is stored in
    /// the state on every path, and the training flag is cleared.
    pub async fn start_training(&self, file: Option<&Path>) -> WizardResult<String> {
        let file = file.ok_or(WizardError::MissingFile)?;
        if !file.is_file() {
            return Err(WizardError::FileNotFound(file.to_path_buf()));
        }

        let target = {
            let mut state = self.state.write().await;
            let target = match state.identity.factory_medicine_id() {
                Some(id) => id.to_string(),
                None if !state.identity.factory_name().is_empty() => {
                    state.identity.factory_name().to_string()
                }
                None => return Err(WizardError::MissingIdentity),
            };
            state.training = true;
            state.training_message = None;
            target
        };
        let guard = FlagGuard::new(&self.state, |state| state.training = false);

        tracing::info!(
            train_target = %target,
            file = %file.display(),
            "Phase TRAIN: requesting model training"
        );

        let result = self.client.train(&target).await;

        let (message, outcome) = match result {
            Ok(body) => {
                tracing::info!(train_target = %target, response = ?body, "Training request accepted");
                (TRAINING_SUCCESS_MESSAGE.to_string(), Ok(()))
            }
            Err(e) => {
                tracing::error!(train_target = %target, error = %e, "Training request failed");
                (format!("Training failed: {}", e), Err(e))
            }
        };

        {
            let mut state = self.state.write().await;
            state.training = false;
            state.training_message = Some(message.clone());
        }
        guard.disarm();

        self.event_bus.emit_lossy(WizardEvent::TrainingFinished {
            target,
            success: outcome.is_ok(),
            message: message.clone(),
            timestamp: Utc::now(),
        });

        outcome?;
        Ok(message)
    }
}
