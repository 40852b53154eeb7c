use std::net::SocketAddr;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Agelens";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Upstream base URL when `AGELENS_PREDICTION_URL` is not set.
pub const DEFAULT_PREDICTION_BASE_URL: &str = "http://localhost:8000";

/// Path appended to the upstream base URL for predictions.
pub const PREDICT_PATH: &str = "/predict";

/// Default listen address for the HTTP server.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3001";

/// Maximum accepted upload size (10 MiB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Upstream request bound. Single attempt, no retry.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// MIME types accepted by the forwarder.
pub const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// Origins allowed to call `/api/detect-age`.
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "https://agelens.app",
];

/// Environment variable names.
pub const ENV_PREDICTION_URL: &str = "AGELENS_PREDICTION_URL";
pub const ENV_BIND_ADDR: &str = "AGELENS_BIND_ADDR";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "agelens_lib=info,agelens=info,tower_http=warn"
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Immutable settings for the upload forwarder.
///
/// Passed into `Forwarder::new` so tests can point it at a loopback upstream.
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    pub prediction_url: String,
    pub allowed_mime_types: Vec<String>,
    pub max_upload_bytes: usize,
    pub timeout: Duration,
}

impl ForwarderConfig {
    /// Build a config for an upstream base URL; the predict path is appended.
    pub fn new(base_url: &str) -> Self {
        Self {
            prediction_url: format!("{}{}", base_url.trim_end_matches('/'), PREDICT_PATH),
            allowed_mime_types: ALLOWED_MIME_TYPES.iter().map(|m| m.to_string()).collect(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            timeout: UPSTREAM_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_allowed_mime(&self, mime: &str) -> bool {
        self.allowed_mime_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(mime))
    }
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREDICTION_BASE_URL)
    }
}

/// Settings for the HTTP surface.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub forwarder: ForwarderConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(ENV_PREDICTION_URL)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_PREDICTION_BASE_URL.to_string());

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: ENV_PREDICTION_URL,
                reason: format!("expected an http(s) URL, got '{base_url}'"),
            });
        }

        let bind_raw = lookup(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_raw.trim().parse().map_err(|e| ConfigError::Invalid {
            name: ENV_BIND_ADDR,
            reason: format!("{e}"),
        })?;

        Ok(Self {
            forwarder: ForwarderConfig::new(&base_url),
            server: ServerConfig {
                bind_addr,
                ..ServerConfig::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_env_empty() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.forwarder.prediction_url, "http://localhost:8000/predict");
        assert_eq!(config.forwarder.timeout, Duration::from_secs(30));
        assert_eq!(config.forwarder.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.server.bind_addr.port(), 3001);
    }

    #[test]
    fn prediction_url_trailing_slash_trimmed() {
        let config =
            AppConfig::from_lookup(lookup_from(&[(ENV_PREDICTION_URL, "https://ai.example.com/")]))
                .unwrap();
        assert_eq!(config.forwarder.prediction_url, "https://ai.example.com/predict");
    }

    #[test]
    fn non_http_url_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[(ENV_PREDICTION_URL, "ftp://nope")]));
        assert!(matches!(result, Err(ConfigError::Invalid { name, .. }) if name == ENV_PREDICTION_URL));
    }

    #[test]
    fn bad_bind_addr_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[(ENV_BIND_ADDR, "not-an-addr")]));
        assert!(result.is_err());
    }

    #[test]
    fn mime_check_is_case_insensitive() {
        let config = ForwarderConfig::default();
        assert!(config.is_allowed_mime("image/JPEG"));
        assert!(config.is_allowed_mime("image/jpg"));
        assert!(config.is_allowed_mime("image/webp"));
        assert!(!config.is_allowed_mime("image/gif"));
        assert!(!config.is_allowed_mime("application/pdf"));
    }

    #[test]
    fn app_name_is_agelens() {
        assert_eq!(APP_NAME, "Agelens");
    }
}
