//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::forwarder::ForwardError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Origin not allowed")]
    ForbiddenOrigin,
    #[error("Prediction service timed out")]
    Timeout,
    #[error("Prediction service returned HTTP {status}")]
    Upstream { status: u16 },
    #[error("Malformed prediction response: {0}")]
    MalformedResponse(String),
    #[error("Prediction service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ForbiddenOrigin => StatusCode::FORBIDDEN,
            ApiError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::Upstream { .. } | ApiError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "INVALID_UPLOAD",
            ApiError::ForbiddenOrigin => "FORBIDDEN_ORIGIN",
            ApiError::Timeout => "UPSTREAM_TIMEOUT",
            ApiError::Upstream { .. } => "UPSTREAM_ERROR",
            ApiError::MalformedResponse(_) => "MALFORMED_RESPONSE",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Upstream detail is logged here and never echoed to the client.
        let message = match &self {
            ApiError::BadRequest(detail) => detail.clone(),
            ApiError::ForbiddenOrigin => "Forbidden".to_string(),
            ApiError::Timeout => {
                "The age estimation service took too long to respond. Please try again.".to_string()
            }
            ApiError::Upstream { status } => {
                tracing::warn!(upstream_status = status, "Prediction service error surfaced");
                "The age estimation service returned an error. Please try again later.".to_string()
            }
            ApiError::MalformedResponse(detail) => {
                tracing::warn!(detail, "Malformed prediction response surfaced");
                "The age estimation service returned an unexpected response.".to_string()
            }
            ApiError::ServiceUnavailable(detail) => {
                tracing::warn!(detail, "Prediction service unavailable");
                "The age estimation service is unavailable. Please try again later.".to_string()
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                "An internal error occurred".to_string()
            }
        };

        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                code: self.code(),
                message,
            },
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<ForwardError> for ApiError {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::Validation(msg) => ApiError::BadRequest(msg),
            ForwardError::Timeout => ApiError::Timeout,
            ForwardError::Upstream { status } => ApiError::Upstream { status },
            ForwardError::ServiceUnavailable(detail) => ApiError::ServiceUnavailable(detail),
            ForwardError::MalformedResponse(detail) => ApiError::MalformedResponse(detail),
            ForwardError::Internal(detail) => ApiError::Internal(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn bad_request_returns_400_with_message() {
        let response = ApiError::BadRequest("File too large. Maximum 10MB.".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "INVALID_UPLOAD");
        assert_eq!(json["error"]["message"], "File too large. Maximum 10MB.");
    }

    #[tokio::test]
    async fn forbidden_origin_returns_fixed_403() {
        let response = ApiError::ForbiddenOrigin.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "FORBIDDEN_ORIGIN");
        assert_eq!(json["error"]["message"], "Forbidden");
    }

    #[tokio::test]
    async fn timeout_returns_408() {
        let response = ApiError::Timeout.into_response();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        let json = body_json(response).await;
        assert!(json["error"]["message"].as_str().unwrap().contains("try again"));
    }

    #[tokio::test]
    async fn upstream_returns_502_without_detail() {
        let response = ApiError::Upstream { status: 500 }.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "UPSTREAM_ERROR");
        assert!(!json["error"]["message"].as_str().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn malformed_returns_502() {
        let response = ApiError::MalformedResponse("age: \"abc\"".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "MALFORMED_RESPONSE");
        assert!(!json["error"]["message"].as_str().unwrap().contains("abc"));
    }

    #[tokio::test]
    async fn unavailable_returns_503() {
        let response = ApiError::ServiceUnavailable("connection refused".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn internal_hides_detail() {
        let response = ApiError::Internal("something broke".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }

    #[test]
    fn forward_errors_map_onto_api_errors() {
        assert!(matches!(
            ApiError::from(ForwardError::Validation("x".into())),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(ApiError::from(ForwardError::Timeout), ApiError::Timeout));
        assert!(matches!(
            ApiError::from(ForwardError::Upstream { status: 503 }),
            ApiError::Upstream { status: 503 }
        ));
        assert!(matches!(
            ApiError::from(ForwardError::ServiceUnavailable("dns".into())),
            ApiError::ServiceUnavailable(_)
        ));
        assert!(matches!(
            ApiError::from(ForwardError::MalformedResponse("x".into())),
            ApiError::MalformedResponse(_)
        ));
    }
}
