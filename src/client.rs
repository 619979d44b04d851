//! HTTP client for the recognition service.
//!
//! The service exposes three endpoints: `POST /predict` (multipart image
//! upload, JSON answer), `GET /health` (liveness report) and `POST
//! /clear_cache`. The important subtlety is in [`RecognitionClient::predict`]:
//! the server returns well-formed failure JSON with 4xx/5xx statuses, so we
//! parse the body regardless of status and only treat unreachable servers and
//! unparseable bodies as transport failures.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::{
    prelude::*,
    workflow::{RecognitionOutcome, SelectedFile},
};

/// Default service base URL, matching the server's development bind address.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

/// Wire format of a `POST /predict` answer.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictResponse {
    /// Did recognition succeed?
    pub success: bool,

    /// The recognized text, present on success.
    #[serde(default)]
    pub recognized_text: Option<String>,

    /// Did the service serve this from its prediction cache?
    #[serde(default)]
    pub cache_hit: Option<bool>,

    /// The service's error message, present on failure.
    #[serde(default)]
    pub error: Option<String>,
}

impl From<PredictResponse> for RecognitionOutcome {
    fn from(response: PredictResponse) -> Self {
        RecognitionOutcome {
            success: response.success,
            text: response.recognized_text,
            cache_hit: response.cache_hit.unwrap_or(false),
            error: response.error,
        }
    }
}

/// Wire format of a `GET /health` answer.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    /// The service's self-reported status, e.g. "healthy".
    pub status: String,

    /// Has the recognition model finished loading?
    #[serde(default)]
    pub model_loaded: bool,

    /// How many predictions the service currently has cached.
    #[serde(default)]
    pub cache_size: usize,
}

/// Wire format of a `POST /clear_cache` answer.
#[derive(Debug, Clone, Deserialize)]
pub struct ClearCacheResponse {
    /// Did the cache clear succeed?
    pub success: bool,

    /// A human-readable confirmation, e.g. "Cache cleared. Removed 3 entries."
    #[serde(default)]
    pub message: Option<String>,
}

/// A client for one recognition service.
pub struct RecognitionClient {
    /// The underlying HTTP client.
    client: reqwest::Client,

    /// Service base URL, without a trailing slash.
    base_url: String,
}

impl RecognitionClient {
    /// Create a client for the service at `base_url`.
    ///
    /// No timeout is applied unless one is passed in, so a stuck request
    /// waits as long as the operating system lets it.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build().context("failed to build HTTP client")?,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Build the full URL for an endpoint path.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Submit one image for recognition.
    ///
    /// Returns `Ok` for any answer that parses as [`PredictResponse`],
    /// including reported failures. An `Err` here always means a transport
    /// failure: connection problems, or a body that wasn't the expected JSON.
    #[instrument(level = "debug", skip_all, fields(name = %file.name))]
    pub async fn predict(&self, file: &SelectedFile) -> Result<PredictResponse> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)
            .with_context(|| format!("invalid MIME type {:?}", file.mime_type))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("/predict"))
            .multipart(form)
            .send()
            .await
            .context("could not reach the recognition service")?;
        let status = response.status();
        debug!(%status, "Recognition service answered");

        let body = response
            .text()
            .await
            .context("failed to read the recognition service's answer")?;
        serde_json::from_str(&body).with_context(|| {
            format!("recognition service returned {status} with an unreadable body")
        })
    }

    /// Probe the service's health endpoint.
    #[instrument(level = "debug", skip_all)]
    pub async fn health(&self) -> Result<HealthResponse> {
        self.client
            .get(self.url("/health"))
            .send()
            .await
            .context("could not reach the recognition service")?
            .json()
            .await
            .context("health endpoint returned an unreadable body")
    }

    /// Ask the service to drop its prediction cache.
    #[instrument(level = "debug", skip_all)]
    pub async fn clear_cache(&self) -> Result<ClearCacheResponse> {
        self.client
            .post(self.url("/clear_cache"))
            .send()
            .await
            .context("could not reach the recognition service")?
            .json()
            .await
            .context("clear_cache endpoint returned an unreadable body")
    }
}
