//! Training Phase Tests

mod helpers;

use etongue_wizard::services::workflow_orchestrator::TRAINING_SUCCESS_MESSAGE;
use etongue_wizard::{BackendError, WizardError};
use helpers::{create_test_orchestrator, fast_timing, MockBackend, MockResponse, StalledBackend};
use serde_json::json;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn training_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "taste_sweet,taste_salty,quality").unwrap();
    writeln!(file, "1.0,2.0,80").unwrap();
    file
}

#[tokio::test]
async fn test_training_success() {
    // Given
    let backend = MockBackend::start().await;
    backend.set_fallback("POST /train", MockResponse::json(json!({ "status": "started" })));
    let orchestrator =
        create_test_orchestrator(&backend.base_url, fast_timing(), "ACME", "Tonic1");
    let file = training_file();

    // When
    let message = orchestrator.start_training(Some(file.path())).await.unwrap();

    // Then: bodiless POST to /train/{id}
    assert_eq!(message, TRAINING_SUCCESS_MESSAGE);
    let posts = backend.requests_to("POST", "/train/");
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].path, "/train/ACME_Tonic1");
    assert!(posts[0].body.is_empty());

    let state = orchestrator.snapshot().await;
    assert!(!state.training);
    assert_eq!(state.training_message.as_deref(), Some(TRAINING_SUCCESS_MESSAGE));
}

#[tokio::test]
async fn test_training_http_error_message() {
    // Given: backend rejects the data
    let backend = MockBackend::start().await;
    backend.set_fallback("POST /train", MockResponse::error(500, "bad csv"));
    let orchestrator =
        create_test_orchestrator(&backend.base_url, fast_timing(), "ACME", "Tonic1");
    let file = training_file();

    // When
    let result = orchestrator.start_training(Some(file.path())).await;

    // Then: status and body in the stored message, flag cleared
    assert!(matches!(
        result,
        Err(WizardError::Backend(BackendError::Http { status: 500, .. }))
    ));
    let state = orchestrator.snapshot().await;
    assert!(!state.training);
    let message = state.training_message.unwrap();
    assert!(message.contains("500"));
    assert!(message.contains("bad csv"));
}

#[tokio::test]
async fn test_training_requires_file() {
    let backend = MockBackend::start().await;
    let orchestrator =
        create_test_orchestrator(&backend.base_url, fast_timing(), "ACME", "Tonic1");

    // No file selected
    assert!(matches!(
        orchestrator.start_training(None).await,
        Err(WizardError::MissingFile)
    ));

    // File that does not exist
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("gone.csv");
    assert!(matches!(
        orchestrator.start_training(Some(&missing)).await,
        Err(WizardError::FileNotFound(_))
    ));

    assert!(backend.requests().is_empty());
    assert!(orchestrator.snapshot().await.training_message.is_none());
}

#[tokio::test]
async fn test_training_falls_back_to_factory_name() {
    // Given: medicine name not set yet
    let backend = MockBackend::start().await;
    let orchestrator = create_test_orchestrator(&backend.base_url, fast_timing(), "ACME", "");
    let file = training_file();

    // When
    orchestrator.start_training(Some(file.path())).await.unwrap();

    // Then
    let posts = backend.requests_to("POST", "/train/");
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].path, "/train/ACME");
}

#[tokio::test]
async fn test_training_without_any_name_fails() {
    let backend = MockBackend::start().await;
    let orchestrator = create_test_orchestrator(&backend.base_url, fast_timing(), "", "");
    let file = training_file();

    assert!(matches!(
        orchestrator.start_training(Some(file.path())).await,
        Err(WizardError::MissingIdentity)
    ));
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_abandoned_training_clears_flag() {
    // Given: a backend that never answers
    let backend = StalledBackend::start().await;
    let orchestrator =
        create_test_orchestrator(&backend.base_url, fast_timing(), "ACME", "Tonic1");
    let file = training_file();

    // When: the caller drops the training request before it completes
    let abandoned = tokio::time::timeout(
        Duration::from_millis(100),
        orchestrator.start_training(Some(file.path())),
    )
    .await;

    // Then: training is no longer reported as running
    assert!(abandoned.is_err());
    let state = orchestrator.snapshot().await;
    assert!(!state.training);
    assert!(state.training_message.is_none());
}
