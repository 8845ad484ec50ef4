//! Phase 4: PREDICT
//!
//! Put the device in predict mode, wait the prediction delay, then fetch
//! predictions. With the default of one attempt the fetch happens exactly
//! once; more attempts reuse the collection polling contract and stop at the
//! first non-empty result.

use super::WorkflowOrchestrator;
use crate::client::PicronPayload;
use crate::error::{WizardError, WizardResult};
use crate::models::{filter_session_records, PredictionSession, Record};
use crate::services::polling::{PollControl, PollOutcome, PollingTask};
use chrono::{DateTime, Utc};
use etongue_common::events::WizardEvent;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Pending prediction fetch
pub struct PredictionHandle {
    pub session_id: Uuid,
    handle: JoinHandle<PredictionSession>,
}

impl PredictionHandle {
    /// Wait for the delayed fetch and return the final session
    pub async fn wait(self) -> WizardResult<PredictionSession> {
        self.handle
            .await
            .map_err(|e| WizardError::Internal(format!("prediction task failed: {}", e)))
    }
}

impl WorkflowOrchestrator {
    /// Request predictions for the current id
    ///
    /// Returns once the backend accepted predict mode; the fetch itself runs
    /// in the background after the prediction delay.
    pub async fn request_prediction(&self) -> WizardResult<PredictionHandle> {
        if self.is_torn_down() {
            return Err(WizardError::TornDown);
        }

        let session = PredictionSession::new();
        let session_id = session.session_id;
        let started_at = session.started_at;

        let (id, factory) = {
            let mut state = self.state.write().await;
            let id = state.identity.require_id()?;
            let factory = state.identity.factory_name().to_string();
            state.predicting = true;
            state.prediction = Some(session);
            (id, factory)
        };

        tracing::info!(
            session_id = %session_id,
            factory_medicine_id = %id,
            "Phase PREDICT: entering predict mode"
        );

        if let Err(e) = self
            .client
            .post_picron(&id, &PicronPayload::predict(&factory))
            .await
        {
            let message = format!("Failed to start prediction: {}", e);
            tracing::error!(session_id = %session_id, error = %e, "Predict-mode request failed");
            self.complete_prediction(session_id, Vec::new(), message.clone())
                .await;
            self.event_bus.emit_lossy(WizardEvent::PredictionFailed {
                session_id: Some(session_id),
                message,
                timestamp: Utc::now(),
            });
            return Err(e.into());
        }

        self.event_bus.emit_lossy(WizardEvent::PredictionRequested {
            session_id,
            started_at,
        });

        let orchestrator = self.clone();
        let handle = tokio::spawn(async move {
            orchestrator
                .run_prediction_fetch(id, session_id, started_at)
                .await
        });

        Ok(PredictionHandle { session_id, handle })
    }

    async fn run_prediction_fetch(
        &self,
        id: String,
        session_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> PredictionSession {
        let attempts = self.timing.prediction_attempts.max(1);
        let poll = PollingTask::delayed(self.timing.prediction_delay, self.shutdown.child_token())
            .max_cycles(u64::from(attempts));

        let outcome = poll
            .run(|attempt| {
                let orchestrator = self.clone();
                let id = id.clone();
                async move {
                    orchestrator
                        .prediction_attempt(&id, session_id, started_at, attempt, attempts)
                        .await
                }
            })
            .await;

        if let PollOutcome::Cancelled { .. } = outcome {
            tracing::info!(session_id = %session_id, "Prediction fetch cancelled");
            self.complete_prediction(session_id, Vec::new(), "Prediction cancelled".to_string())
                .await;
        }

        self.state
            .read()
            .await
            .prediction
            .clone()
            .filter(|p| p.session_id == session_id)
            .unwrap_or_else(|| PredictionSession {
                session_id,
                started_at,
                predictions: Vec::new(),
                message: "Superseded by a newer prediction request".to_string(),
                completed: true,
            })
    }

    async fn prediction_attempt(
        &self,
        id: &str,
        session_id: Uuid,
        started_at: DateTime<Utc>,
        attempt: u64,
        attempts: u32,
    ) -> PollControl {
        let last_attempt = attempt >= u64::from(attempts);
        tracing::debug!(session_id = %session_id, attempt, "Fetching predictions");

        match self.client.get_predictions(id).await {
            Ok(records) => {
                let received = records.len();
                let predictions = filter_session_records(records, started_at);
                if predictions.is_empty() && !last_attempt {
                    tracing::debug!(session_id = %session_id, attempt, received, "No predictions yet");
                    return PollControl::Continue;
                }

                let count = predictions.len();
                let message = format!("Received {} prediction(s)", count);
                tracing::info!(session_id = %session_id, received, count, "Phase PREDICT: done");
                self.complete_prediction(session_id, predictions, message.clone())
                    .await;
                self.event_bus.emit_lossy(WizardEvent::PredictionReady {
                    session_id,
                    count,
                    message,
                    timestamp: Utc::now(),
                });
                PollControl::Stop
            }
            Err(e) if !last_attempt => {
                tracing::warn!(session_id = %session_id, attempt, error = %e, "Prediction fetch failed, retrying");
                PollControl::Continue
            }
            Err(e) => {
                let message = format!("Failed to fetch predictions: {}", e);
                tracing::error!(session_id = %session_id, error = %e, "Prediction fetch failed");
                self.complete_prediction(session_id, Vec::new(), message.clone())
                    .await;
                self.event_bus.emit_lossy(WizardEvent::PredictionFailed {
                    session_id: Some(session_id),
                    message,
                    timestamp: Utc::now(),
                });
                PollControl::Stop
            }
        }
    }

    /// Store the final result if the session is still current
    async fn complete_prediction(&self, session_id: Uuid, predictions: Vec<Record>, message: String) {
        let mut state = self.state.write().await;
        let Some(session) = state
            .prediction
            .as_mut()
            .filter(|p| p.session_id == session_id)
        else {
            tracing::debug!(session_id = %session_id, "Dropping result of superseded prediction");
            return;
        };

        session.predictions = predictions;
        session.message = message;
        session.completed = true;
        state.predicting = false;
    }
}
