//! Shared types for the API layer.

use std::sync::Arc;

use crate::api::middleware::origin::{AllowListPolicy, OriginPolicy};
use crate::config::ServerConfig;
use crate::forwarder::Forwarder;

/// Shared context for all API routes and middleware.
///
/// Holds no per-request state; every field is read-only after construction.
#[derive(Clone)]
pub struct ApiContext {
    pub forwarder: Arc<Forwarder>,
    pub origin_policy: Arc<dyn OriginPolicy>,
}

impl ApiContext {
    pub fn new(forwarder: Arc<Forwarder>, origin_policy: Arc<dyn OriginPolicy>) -> Self {
        Self {
            forwarder,
            origin_policy,
        }
    }

    /// Context using the allow-list from the server configuration.
    pub fn from_config(forwarder: Forwarder, server: &ServerConfig) -> Self {
        Self::new(
            Arc::new(forwarder),
            Arc::new(AllowListPolicy::new(server.allowed_origins.iter().cloned())),
        )
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}
