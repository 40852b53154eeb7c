//! Same-origin guard for the detect endpoint.
//!
//! Reads `Origin`, falling back to `Referer`. A missing or foreign origin
//! gets a fixed 403 before the body is touched.

use axum::extract::State;
use axum::http::{header, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

/// Decides whether a caller origin may use the API.
pub trait OriginPolicy: Send + Sync {
    fn is_allowed(&self, origin: &str) -> bool;
}

/// Equality / prefix test against a fixed list of origins.
///
/// `https://agelens.app` admits `https://agelens.app` and
/// `https://agelens.app/upload` but not `https://agelens.app.evil.com`.
#[derive(Debug, Clone)]
pub struct AllowListPolicy {
    allowed: Vec<String>,
}

impl AllowListPolicy {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(|o| o.into().trim_end_matches('/').to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        }
    }
}

impl OriginPolicy for AllowListPolicy {
    fn is_allowed(&self, origin: &str) -> bool {
        let origin = origin.trim();
        self.allowed.iter().any(|allowed| {
            origin == allowed
                || origin
                    .strip_prefix(allowed.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

/// `Origin` header value, or `Referer` when no origin is sent.
pub fn request_origin(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::ORIGIN)
        .or_else(|| headers.get(header::REFERER))
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
}

/// Reject requests whose origin the policy does not admit.
pub async fn require_allowed_origin(
    State(ctx): State<ApiContext>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let allowed = request_origin(req.headers())
        .map(|origin| ctx.origin_policy.is_allowed(origin))
        .unwrap_or(false);

    if !allowed {
        tracing::warn!(
            origin = ?request_origin(req.headers()),
            path = %req.uri().path(),
            "Rejected request from disallowed origin"
        );
        return ApiError::ForbiddenOrigin.into_response();
    }

    next.run(req).await
}
