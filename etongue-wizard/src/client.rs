//! Analysis backend HTTP client
//!
//! Typed wrappers over the backend endpoints the wizard consumes:
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | GET | `/` | health check |
//! | GET | `/shell/{id}` | device init script |
//! | POST | `/picron/{id}` | start collection / enter predict mode |
//! | GET | `/picron/{id}` | collection status |
//! | GET | `/getdata/{id}` | collected entries |
//! | POST | `/train/{id}` | start training |
//! | GET | `/predict/{id}` | predictions |

use crate::models::{records_from_response, CollectionForm, PicronStatus, Record};
use reqwest::{Response, Url};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("etongue-wizard/", env!("CARGO_PKG_VERSION"));

/// Backend client errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response; body captured best effort
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Body for `POST /picron/{id}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PicronPayload {
    #[serde(flatten)]
    pub readings: CollectionForm,
    pub status: u8,
    pub factory: String,
}

impl PicronPayload {
    /// Collection submit: current form readings, `status = 1`
    pub fn collect(readings: CollectionForm, factory: &str) -> Self {
        Self {
            readings,
            status: PicronStatus::Collecting.code(),
            factory: factory.to_string(),
        }
    }

    /// Predict mode: zeroed readings, `status = 2`
    pub fn predict(factory: &str) -> Self {
        Self {
            readings: CollectionForm::default(),
            status: PicronStatus::Predict.code(),
            factory: factory.to_string(),
        }
    }
}

/// Analysis backend client
#[derive(Debug, Clone)]
pub struct BackendClient {
    http_client: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BackendError::Network(format!("invalid base URL {:?}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::Network(format!(
                "base URL cannot carry a path: {}",
                base_url
            )));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL with percent-encoded path segments appended
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `GET /` - backend liveness
    pub async fn health(&self) -> Result<Value, BackendError> {
        let response = self.send(self.http_client.get(self.endpoint(&[]))).await?;
        let text = read_text(response).await?;
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    /// `GET /shell/{id}` - init script text, verbatim
    pub async fn fetch_shell_script(&self, id: &str) -> Result<String, BackendError> {
        let url = self.endpoint(&["shell", id]);
        tracing::debug!(url = %url, "Fetching init script");
        let response = self.send(self.http_client.get(url)).await?;
        read_text(response).await
    }

    /// `POST /picron/{id}` - only the status matters
    pub async fn post_picron(&self, id: &str, payload: &PicronPayload) -> Result<(), BackendError> {
        let url = self.endpoint(&["picron", id]);
        tracing::debug!(url = %url, status = payload.status, "Posting picron payload");
        self.send(self.http_client.post(url).json(payload)).await?;
        Ok(())
    }

    /// `GET /picron/{id}` - raw status body
    pub async fn get_picron_status(&self, id: &str) -> Result<Value, BackendError> {
        let response = self
            .send(self.http_client.get(self.endpoint(&["picron", id])))
            .await?;
        read_json(response).await
    }

    /// `GET /getdata/{id}` - collected entries (unfiltered)
    pub async fn get_data(&self, id: &str) -> Result<Vec<Record>, BackendError> {
        let response = self
            .send(self.http_client.get(self.endpoint(&["getdata", id])))
            .await?;
        Ok(records_from_response(read_json(response).await?))
    }

    /// `POST /train/{target}` - no request body
    ///
    /// The response is parsed best effort; None if it was not JSON.
    pub async fn train(&self, target: &str) -> Result<Option<Value>, BackendError> {
        let response = self
            .send(self.http_client.post(self.endpoint(&["train", target])))
            .await?;
        let text = read_text(response).await?;
        Ok(serde_json::from_str(&text).ok())
    }

    /// `GET /predict/{id}` - predictions (unfiltered)
    pub async fn get_predictions(&self, id: &str) -> Result<Vec<Record>, BackendError> {
        let response = self
            .send(self.http_client.get(self.endpoint(&["predict", id])))
            .await?;
        Ok(records_from_response(read_json(response).await?))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

async fn read_text(response: Response) -> Result<String, BackendError> {
    response
        .text()
        .await
        .map_err(|e| BackendError::Network(e.to_string()))
}

/// An empty body reads as JSON null
async fn read_json(response: Response) -> Result<Value, BackendError> {
    let text = read_text(response).await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| BackendError::Parse(e.to_string()))
}
