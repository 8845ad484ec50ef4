//! Phase 1: INIT
//!
//! Device init script retrieval and download

use super::{FlagGuard, WorkflowOrchestrator};
use crate::client::BackendError;
use crate::error::{WizardError, WizardResult};
use chrono::Utc;
use etongue_common::events::WizardEvent;
use std::path::{Path, PathBuf};

/// Script text shown when the backend returns an empty body
pub const EMPTY_SCRIPT_PLACEHOLDER: &str = "# No script content returned by the server";

fn http_error_placeholder(status: u16, body: &str) -> String {
    format!("# Error fetching init script: HTTP {}\n# {}", status, body.trim())
}

impl WorkflowOrchestrator {
    /// Fetch the init script for the current id
    ///
    /// HTTP failures produce placeholder text (returned as `Ok`) so the
    /// operator sees the status and body. Transport failures return `Err`;
    /// the script text is still replaced with a placeholder. The fetching
    /// flag is cleared on every path.
    pub async fn fetch_init_script(&self) -> WizardResult<String> {
        let id = {
            let mut state = self.state.write().await;
            let id = state.identity.require_id()?;
            state.fetching_script = true;
            id
        };
        let guard = FlagGuard::new(&self.state, |state| state.fetching_script = false);

        tracing::info!(factory_medicine_id = %id, "Phase INIT: fetching init script");
        let result = self.client.fetch_shell_script(&id).await;

        let (script, success, outcome) = match result {
            Ok(body) if body.trim().is_empty() => {
                tracing::warn!(factory_medicine_id = %id, "Init script body is empty");
                (EMPTY_SCRIPT_PLACEHOLDER.to_string(), true, Ok(()))
            }
            Ok(body) => (body, true, Ok(())),
            Err(BackendError::Http { status, body }) => {
                tracing::warn!(factory_medicine_id = %id, status, "Init script request failed");
                (http_error_placeholder(status, &body), false, Ok(()))
            }
            Err(e) => {
                tracing::error!(factory_medicine_id = %id, error = %e, "Init script request failed");
                (format!("# Error fetching init script: {}", e), false, Err(e))
            }
        };

        {
            let mut state = self.state.write().await;
            state.fetching_script = false;
            state.script = script.clone();
        }
        guard.disarm();

        self.event_bus.emit_lossy(WizardEvent::ScriptFetched {
            factory_medicine_id: id,
            success,
            timestamp: Utc::now(),
        });

        outcome?;
        Ok(script)
    }

    /// Save the current script text as `{dir}/{id}.sh`
    pub async fn save_script(&self, dir: &Path) -> WizardResult<PathBuf> {
        let (script, id) = {
            let state = self.state.read().await;
            (state.script.clone(), state.identity.require_id()?)
        };
        download_script(&script, &id, dir)
    }
}

/// Write `text` to `{dir}/{id}.sh`; no network
pub fn download_script(text: &str, id: &str, dir: &Path) -> WizardResult<PathBuf> {
    if text.trim().is_empty() {
        return Err(WizardError::EmptyScript);
    }
    if id.trim().is_empty() {
        return Err(WizardError::MissingIdentity);
    }
    if id.contains(['/', '\\']) || id == "." || id == ".." {
        return Err(WizardError::InvalidInput(format!(
            "Session id {:?} is not a valid file name",
            id
        )));
    }

    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.sh", id));
    std::fs::write(&path, text)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    }

    tracing::info!(path = %path.display(), bytes = text.len(), "Init script saved");
    Ok(path)
}
