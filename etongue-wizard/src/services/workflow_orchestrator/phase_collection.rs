//! Phase 2: COLLECT
//!
//! Submit the collection form, then poll `/getdata` and `/picron` until the
//! backend reports `status == 0`.

use super::{CollectionTask, WorkflowOrchestrator};
use crate::client::PicronPayload;
use crate::error::{WizardError, WizardResult};
use crate::models::{
    filter_session_records, is_collection_done, CollectionPhase, CollectionSession, Record,
};
use crate::services::polling::{PollControl, PollOutcome, PollingTask};
use chrono::{DateTime, Utc};
use etongue_common::events::WizardEvent;
use uuid::Uuid;

impl WorkflowOrchestrator {
    /// Submit the current form and start polling
    ///
    /// Returns the new session id once the backend accepted the submit.
    /// Any previous collection task is cancelled first.
    pub async fn submit_collection(&self) -> WizardResult<Uuid> {
        if self.is_torn_down() {
            return Err(WizardError::TornDown);
        }

        let (id, factory, form) = {
            let state = self.state.read().await;
            (
                state.identity.require_id()?,
                state.identity.factory_name().to_string(),
                state.form,
            )
        };

        self.cancel_collection().await;

        // Start timestamp is taken before the request goes out
        let session = CollectionSession::new();
        let session_id = session.session_id;
        let started_at = session.started_at;
        {
            let mut state = self.state.write().await;
            state.collection_phase = CollectionPhase::Submitting;
            state.collection = Some(session);
            state.collection_error = None;
        }

        tracing::info!(
            session_id = %session_id,
            factory_medicine_id = %id,
            dilution = form.dilution,
            "Phase COLLECT: submitting collection form"
        );

        let payload = PicronPayload::collect(form, &factory);
        if let Err(e) = self.client.post_picron(&id, &payload).await {
            let message = format!("Failed to start data collection: {}", e);
            tracing::error!(session_id = %session_id, error = %e, "Collection submit failed");
            {
                let mut state = self.state.write().await;
                if is_current_collection(&state.collection, session_id) {
                    state.collection_phase = CollectionPhase::Idle;
                    if let Some(session) = state.collection.as_mut() {
                        session.active = false;
                    }
                    state.collection_error = Some(message.clone());
                }
            }
            self.event_bus.emit_lossy(WizardEvent::CollectionFailed {
                factory_medicine_id: id,
                message,
                timestamp: Utc::now(),
            });
            return Err(e.into());
        }

        {
            let mut state = self.state.write().await;
            if !is_current_collection(&state.collection, session_id) {
                // Superseded while the submit was in flight
                return Ok(session_id);
            }
            state.collection_phase = CollectionPhase::Polling;
            if let Some(session) = state.collection.as_mut() {
                session.active = true;
            }
        }

        self.event_bus.emit_lossy(WizardEvent::CollectionStarted {
            session_id,
            factory_medicine_id: id.clone(),
            started_at,
        });

        self.spawn_collection_polling(id, session_id, started_at).await;
        Ok(session_id)
    }

    /// Start polling for `session_id`, cancelling any task it replaces
    ///
    /// Does nothing when a newer submission already took over the session
    /// slot, so at most one poll task is ever reachable and running.
    async fn spawn_collection_polling(&self, id: String, session_id: Uuid, started_at: DateTime<Utc>) {
        let mut slot = self.collection_task.lock().await;
        if !is_current_collection(&self.state.read().await.collection, session_id) {
            tracing::debug!(session_id = %session_id, "Session superseded before polling started");
            return;
        }
        if let Some(previous) = slot.take() {
            tracing::debug!(
                session_id = %previous.session_id,
                "Cancelling replaced collection polling"
            );
            previous.cancel.cancel();
        }

        let cancel = self.shutdown.child_token();
        let poll = PollingTask::repeating(self.timing.poll_interval, cancel.clone());
        let orchestrator = self.clone();

        let handle = tokio::spawn(async move {
            let outcome = poll
                .run(|cycle| {
                    let orchestrator = orchestrator.clone();
                    let id = id.clone();
                    async move {
                        orchestrator
                            .collection_cycle(&id, session_id, started_at, cycle)
                            .await
                    }
                })
                .await;
            orchestrator.finish_collection(session_id, outcome).await;
            outcome
        });

        *slot = Some(CollectionTask {
            session_id,
            cancel,
            handle: Some(handle),
        });
    }

    /// One poll cycle: fetch entries, then check status
    ///
    /// Both requests are in flight together; the entries request is issued
    /// first. Failures are logged and never end the polling.
    async fn collection_cycle(
        &self,
        id: &str,
        session_id: Uuid,
        started_at: DateTime<Utc>,
        cycle: u64,
    ) -> PollControl {
        tracing::debug!(session_id = %session_id, cycle, "Collection poll cycle");

        let (data, status) = tokio::join!(self.client.get_data(id), self.client.get_picron_status(id));

        match data {
            Ok(records) => {
                let received = records.len();
                let kept = filter_session_records(records, started_at);
                tracing::debug!(
                    session_id = %session_id,
                    cycle,
                    received,
                    kept = kept.len(),
                    "Entries received"
                );
                self.append_entries(session_id, kept).await;
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, cycle, error = %e, "getdata poll failed");
                self.emit_poll_failure(session_id, "getdata", e.to_string());
            }
        }

        {
            let mut state = self.state.write().await;
            if let Some(session) = state.collection.as_mut().filter(|s| s.session_id == session_id) {
                session.cycles = cycle;
            }
        }

        match status {
            Ok(body) if is_collection_done(&body) => {
                tracing::info!(session_id = %session_id, cycle, "Backend reported collection done");
                PollControl::Stop
            }
            Ok(_) => PollControl::Continue,
            Err(e) => {
                tracing::warn!(session_id = %session_id, cycle, error = %e, "picron status poll failed");
                self.emit_poll_failure(session_id, "picron", e.to_string());
                PollControl::Continue
            }
        }
    }

    async fn append_entries(&self, session_id: Uuid, records: Vec<Record>) {
        if records.is_empty() {
            return;
        }
        let added = records.len();

        let total = {
            let mut state = self.state.write().await;
            match state.collection.as_mut().filter(|s| s.session_id == session_id) {
                Some(session) => session.append(records),
                None => {
                    tracing::debug!(session_id = %session_id, "Dropping entries from superseded session");
                    return;
                }
            }
        };

        self.event_bus.emit_lossy(WizardEvent::EntriesAppended {
            session_id,
            added,
            total,
            timestamp: Utc::now(),
        });
    }

    fn emit_poll_failure(&self, session_id: Uuid, endpoint: &str, error: String) {
        self.event_bus.emit_lossy(WizardEvent::PollCycleFailed {
            session_id,
            endpoint: endpoint.to_string(),
            error,
            timestamp: Utc::now(),
        });
    }

    async fn finish_collection(&self, session_id: Uuid, outcome: PollOutcome) {
        let total_entries = {
            let mut state = self.state.write().await;
            if !is_current_collection(&state.collection, session_id) {
                None
            } else {
                state.collection_phase = match outcome {
                    PollOutcome::Cancelled { .. } => CollectionPhase::Idle,
                    PollOutcome::Stopped { .. } | PollOutcome::Exhausted { .. } => {
                        CollectionPhase::Done
                    }
                };
                state.collection.as_mut().map(|session| {
                    session.active = false;
                    session.entries.len()
                })
            }
        };

        let timestamp = Utc::now();
        match outcome {
            PollOutcome::Cancelled { cycles } => {
                tracing::info!(session_id = %session_id, cycles, "Collection polling cancelled");
                self.event_bus
                    .emit_lossy(WizardEvent::CollectionCancelled { session_id, timestamp });
            }
            PollOutcome::Stopped { cycles } | PollOutcome::Exhausted { cycles } => {
                tracing::info!(
                    session_id = %session_id,
                    cycles,
                    total_entries = ?total_entries,
                    "Phase COLLECT: done"
                );
                self.event_bus.emit_lossy(WizardEvent::CollectionDone {
                    session_id,
                    total_entries: total_entries.unwrap_or(0),
                    timestamp,
                });
            }
        }
    }

    /// Cancel the running collection poll, if any, and wait for it to end
    pub async fn cancel_collection(&self) {
        let task = self.collection_task.lock().await.take();
        if let Some(mut task) = task {
            tracing::debug!(session_id = %task.session_id, "Cancelling collection polling");
            task.cancel.cancel();
            if let Some(handle) = task.handle.take() {
                let _ = handle.await;
            }
        }
    }

    /// Wait until the current collection polling ends
    ///
    /// Returns None when no polling task is running or another caller is
    /// already waiting on it.
    pub async fn wait_for_collection(&self) -> WizardResult<Option<PollOutcome>> {
        let handle = {
            let mut task = self.collection_task.lock().await;
            task.as_mut().and_then(|t| t.handle.take())
        };

        match handle {
            Some(handle) => handle
                .await
                .map(Some)
                .map_err(|e| WizardError::Internal(format!("collection task failed: {}", e))),
            None => Ok(None),
        }
    }
}

fn is_current_collection(collection: &Option<CollectionSession>, session_id: Uuid) -> bool {
    collection
        .as_ref()
        .is_some_and(|session| session.session_id == session_id)
}
