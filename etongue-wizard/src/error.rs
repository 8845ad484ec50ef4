//! Error types for etongue-wizard
//!
//! Precondition failures are raised before any network call is issued.
//! Backend failures carry the HTTP status and body when one was received.

use crate::client::BackendError;
use std::path::PathBuf;
use thiserror::Error;

/// Wizard operation error
#[derive(Debug, Error)]
pub enum WizardError {
    /// Factory or medicine name is empty, so no session id exists
    #[error("Factory and medicine names are required")]
    MissingIdentity,

    /// Training needs a selected data file
    #[error("No training file selected")]
    MissingFile,

    /// Selected training file does not exist or is not a regular file
    #[error("Training file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Script download needs script text
    #[error("No script text to save")]
    EmptyScript,

    /// Background work was stopped for good by teardown
    #[error("Wizard has been torn down")]
    TornDown,

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Backend request failed
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// etongue-common error
    #[error("Common error: {0}")]
    Common(#[from] etongue_common::Error),

    /// Background task failed to complete
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WizardError {
    /// True for failures detected before any request was sent
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            WizardError::MissingIdentity
                | WizardError::MissingFile
                | WizardError::FileNotFound(_)
                | WizardError::EmptyScript
                | WizardError::TornDown
                | WizardError::InvalidInput(_)
        )
    }
}

/// Result type for wizard operations
pub type WizardResult<T> = Result<T, WizardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_http_error_message_embeds_status_and_body() {
        let err: WizardError = BackendError::Http {
            status: 500,
            body: "bad csv".to_string(),
        }
        .into();
        let message = err.to_string();
        assert!(message.contains("500"));
        assert!(message.contains("bad csv"));
        assert!(!err.is_precondition());
    }

    #[test]
    fn test_missing_file_message() {
        assert_eq!(WizardError::MissingFile.to_string(), "No training file selected");
        assert_eq!(
            WizardError::FileNotFound(PathBuf::from("/tmp/x.csv")).to_string(),
            "Training file not found: /tmp/x.csv"
        );
        assert!(WizardError::MissingIdentity.is_precondition());
    }
}
