//! Client configuration.

use std::path::PathBuf;

/// Environment variable holding the API base URL.
pub const BASE_URL_ENV: &str = "STUDIO_API_BASE_URL";

/// Environment variable holding the request timeout in milliseconds.
pub const TIMEOUT_ENV: &str = "STUDIO_API_TIMEOUT_MS";

/// Base URL used when [`BASE_URL_ENV`] is unset.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Configuration for an [`HttpClient`](crate::client::HttpClient).
///
/// # Examples
///
/// ```
/// use studio_http::client::ClientConfig;
///
/// let config = ClientConfig {
///     base_url: "https://studio.example.com/api".to_string(),
///     request_timeout_ms: 60_000,
///     ..Default::default()
/// };
/// assert_eq!(config.resolve_url("/voice/list"), "https://studio.example.com/api/voice/list");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Prefix for relative request URLs
    pub base_url: String,

    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Value of the `API-Version` header
    pub api_version: String,

    /// Headers sent with every request unless overridden per request
    pub default_headers: Vec<(String, String)>,

    /// First retry delay in milliseconds
    pub retry_delay_ms: u64,

    /// Upper bound for any retry delay in milliseconds
    pub max_retry_delay_ms: u64,

    /// Endpoint used to exchange a refresh token for a new access token
    pub refresh_path: String,

    /// Login entry point the presenter redirects to when the session is lost
    pub login_path: String,

    /// Key the session is persisted under
    pub session_key: String,

    /// Directory downloads are written to
    pub download_dir: PathBuf,

    /// Emit per-attempt debug logs
    pub enable_logging: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: 30_000,
            api_version: "v1".to_string(),
            default_headers: crate::protocol::headers::DEFAULT_HEADERS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            retry_delay_ms: 1_000,
            max_retry_delay_ms: 10_000,
            refresh_path: "/auth/refresh".to_string(),
            login_path: "/login".to_string(),
            session_key: "auth-storage".to_string(),
            download_dir: std::env::temp_dir().join("studio-downloads"),
            enable_logging: true,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by [`BASE_URL_ENV`] and [`TIMEOUT_ENV`] when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                config.base_url = base_url.trim().to_string();
            }
        }
        if let Some(timeout) = std::env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            config.request_timeout_ms = timeout;
        }
        config
    }

    /// Use a different base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Use different retry delays.
    pub fn with_retry_delays(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.retry_delay_ms = base_ms;
        self.max_retry_delay_ms = max_ms;
        self
    }

    /// Write downloads to `dir`.
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    /// Resolve a request URL against the base URL.
    ///
    /// Absolute `http(s)://` URLs are returned unchanged.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        let path = url.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }
}
