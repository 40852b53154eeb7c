//! HTTP client for `POST /api/detect-age`.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;

use crate::api::endpoints::detect::IMAGE_FIELD;
use crate::config::UPSTREAM_TIMEOUT;
use crate::normalizer::PreparedImage;
use crate::prediction::{DetectResponse, NormalizedPrediction};

/// Must stay above the server's upstream bound.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(UPSTREAM_TIMEOUT.as_secs() + 5);

const DETECT_PATH: &str = "/api/detect-age";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Server returned {status} {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("Request timed out")]
    Timeout,
    #[error("Cannot reach server: {0}")]
    Transport(String),
    #[error("Unexpected server response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Short text suitable for the error banner.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Api { message, .. } => message.clone(),
            ClientError::Timeout => "The request took too long. Please try again.".to_string(),
            ClientError::Transport(_) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            ClientError::InvalidResponse(_) => {
                "The server sent an unexpected response. Please try again.".to_string()
            }
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_connect() || err.is_request() {
            ClientError::Transport(err.to_string())
        } else {
            ClientError::InvalidResponse(err.to_string())
        }
    }
}

/// Posts prepared images to the forwarder and unwraps the result envelope.
#[derive(Debug, Clone)]
pub struct DetectClient {
    endpoint: String,
    origin: String,
    client: reqwest::Client,
}

impl DetectClient {
    /// `base_url` is the forwarder root; `origin` is sent as the `Origin` header.
    pub fn new(base_url: &str, origin: &str) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Transport(format!("HTTP client: {e}")))?;

        Ok(Self {
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), DETECT_PATH),
            origin: origin.to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn detect(&self, image: &PreparedImage) -> Result<NormalizedPrediction, ClientError> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name())
            .mime_str(&image.mime_type)
            .map_err(|e| ClientError::InvalidResponse(format!("multipart part: {e}")))?;
        let form = Form::new().part(IMAGE_FIELD, part);

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ORIGIN, &self.origin)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        parse_envelope(status, &body)
    }
}

fn parse_envelope(status: StatusCode, body: &[u8]) -> Result<NormalizedPrediction, ClientError> {
    let envelope: Option<DetectResponse> = serde_json::from_slice(body).ok();

    match envelope {
        Some(DetectResponse {
            success: true,
            result: Some(result),
            ..
        }) if status.is_success() => Ok(result),
        Some(DetectResponse {
            error: Some(detail), ..
        }) => Err(ClientError::Api {
            status: status.as_u16(),
            code: detail.code,
            message: detail.message,
        }),
        _ if !status.is_success() => Err(ClientError::Api {
            status: status.as_u16(),
            code: "HTTP_ERROR".to_string(),
            message: format!("Request failed with status {}", status.as_u16()),
        }),
        _ => Err(ClientError::InvalidResponse(
            "missing result in success envelope".to_string(),
        )),
    }
}
