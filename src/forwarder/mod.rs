//! Upload forwarder: validates an image, relays it to the external prediction
//! service and normalizes the reply.
//!
//! Pipeline flow:
//! 1. Validate MIME type and size (no network on failure)
//! 2. Wrap bytes in a multipart `image` field
//! 3. Single POST, bounded by the configured timeout
//! 4. Classify transport failures and non-2xx statuses
//! 5. Parse JSON and run the field resolver

pub mod resolver;
pub mod validation;

use reqwest::multipart::{Form, Part};
use tracing::{debug, info, warn};

use crate::config::ForwarderConfig;
use crate::prediction::NormalizedPrediction;

pub use resolver::{normalize, ResolveError};
pub use validation::{effective_mime, validate, UploadRequest};

/// Longest upstream body excerpt written to logs.
const LOGGED_BODY_CHARS: usize = 512;

/// Largest prediction body read from the upstream.
pub const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("Invalid upload: {0}")]
    Validation(String),
    #[error("Prediction service timed out")]
    Timeout,
    #[error("Prediction service returned HTTP {status}")]
    Upstream { status: u16 },
    #[error("Prediction service unreachable: {0}")]
    ServiceUnavailable(String),
    #[error("Malformed prediction response: {0}")]
    MalformedResponse(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ResolveError> for ForwardError {
    fn from(err: ResolveError) -> Self {
        ForwardError::MalformedResponse(err.to_string())
    }
}

/// Map a reqwest failure onto the forwarder taxonomy.
///
/// Timeout is checked first: a request that times out while connecting is
/// still a timeout, not an unreachable service.
fn classify_transport(err: &reqwest::Error) -> ForwardError {
    if err.is_timeout() {
        ForwardError::Timeout
    } else if err.is_connect() || err.is_request() {
        ForwardError::ServiceUnavailable(err.to_string())
    } else {
        ForwardError::Internal(err.to_string())
    }
}

/// Map a failure while reading a 2xx body. The response already started, so
/// anything but a timeout is an upstream fault.
fn classify_body(err: &reqwest::Error) -> ForwardError {
    if err.is_timeout() {
        ForwardError::Timeout
    } else {
        ForwardError::MalformedResponse(format!("incomplete body: {err}"))
    }
}

/// Read the response body, refusing anything over `limit` bytes.
async fn read_capped(mut response: reqwest::Response, limit: usize) -> Result<Vec<u8>, ForwardError> {
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(ForwardError::MalformedResponse(format!(
                "response body of {len} bytes exceeds {limit}"
            )));
        }
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| classify_body(&e))? {
        if body.len() + chunk.len() > limit {
            return Err(ForwardError::MalformedResponse(format!(
                "response body exceeds {limit} bytes"
            )));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn excerpt(body: &str) -> String {
    body.chars().take(LOGGED_BODY_CHARS).collect()
}

/// Stateless relay to the prediction service. One instance serves all requests.
pub struct Forwarder {
    config: ForwarderConfig,
    client: reqwest::Client,
}

impl Forwarder {
    pub fn new(config: ForwarderConfig) -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ForwardError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ForwarderConfig {
        &self.config
    }

    /// Validate, forward and normalize one upload. Never retries.
    pub async fn submit(&self, upload: UploadRequest) -> Result<NormalizedPrediction, ForwardError> {
        validate(&upload, &self.config)?;

        let size = upload.len();
        let mime = validation::essence(&upload.mime_type);
        let file_name = upload
            .file_name
            .clone()
            .unwrap_or_else(|| "upload".to_string());

        let part = Part::bytes(upload.bytes)
            .file_name(file_name)
            .mime_str(&mime)
            .map_err(|e| ForwardError::Internal(format!("Multipart part: {e}")))?;
        let form = Form::new().part("image", part);

        debug!(
            url = %self.config.prediction_url,
            size,
            mime = %mime,
            "Forwarding image to prediction service"
        );

        let response = self
            .client
            .post(&self.config.prediction_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                let err = classify_transport(&e);
                warn!(error = %e, kind = ?err, "Prediction request failed");
                err
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                body = %excerpt(&body),
                "Prediction service returned an error status"
            );
            return Err(ForwardError::Upstream {
                status: status.as_u16(),
            });
        }

        let body = read_capped(response, MAX_RESPONSE_BYTES).await.map_err(|e| {
            warn!(error = %e, "Prediction response body could not be read");
            e
        })?;

        let doc: serde_json::Value = serde_json::from_slice(&body).map_err(|e| {
            warn!(
                error = %e,
                body = %excerpt(&String::from_utf8_lossy(&body)),
                "Prediction response is not JSON"
            );
            ForwardError::MalformedResponse(format!("invalid JSON: {e}"))
        })?;

        let prediction = normalize(&doc).map_err(|e| {
            warn!(error = %e, "Prediction response could not be normalized");
            ForwardError::from(e)
        })?;

        info!(
            age = prediction.age,
            confidence = prediction.confidence,
            faces = prediction.faces_count,
            "Prediction normalized"
        );

        Ok(prediction)
    }
}
