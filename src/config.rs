//! qrgate configuration.

use crate::GateError;
use std::path::PathBuf;
use std::time::Duration;

/// Default pause between page requests.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(10);

/// Default number of trailing pages fetched on a cache miss.
pub const DEFAULT_TAIL_PAGES: u64 = 2;

/// Default time the gate output stays on for one passage.
pub const DEFAULT_OPEN_DURATION: Duration = Duration::from_secs(2);

/// Default per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Runtime configuration for one gate.
///
/// Everything the control loop needs except the actuator, which is
/// handed over separately so that hardware acquisition fails before any
/// network traffic happens.
#[derive(Clone)]
pub struct GateConfig {
    /// Paged check-in endpoint (e.g. `https://api.example.com/checkins`).
    /// The page index is appended as `?pageIndex=<n>`.
    pub api_base_url: String,

    /// Initial bearer token.
    pub access_token: String,

    /// Endpoint that exchanges the refresh token for a new access token.
    pub refresh_url: String,

    /// Long-lived refresh token.
    pub refresh_token: String,

    /// Pause between consecutive page requests.
    pub page_delay: Duration,

    /// Number of trailing pages fetched when a code is not in the cache.
    pub tail_pages: u64,

    /// How long the gate output stays on for one passage.
    pub open_duration: Duration,

    /// Per-request HTTP timeout.
    pub request_timeout: Duration,

    /// Where the result of each full sync is written. `None` disables it.
    pub snapshot_path: Option<PathBuf>,

    /// How long a code that was still unknown after a resync is denied
    /// without another resync. Zero disables the miss cache.
    pub miss_ttl: Duration,

    /// User-Agent sent with every request.
    pub user_agent: String,
}

impl GateConfig {
    /// Create a configuration with default tuning for the given endpoints.
    pub fn new(
        api_base_url: impl Into<String>,
        access_token: impl Into<String>,
        refresh_url: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            access_token: access_token.into(),
            refresh_url: refresh_url.into(),
            refresh_token: refresh_token.into(),
            page_delay: DEFAULT_PAGE_DELAY,
            tail_pages: DEFAULT_TAIL_PAGES,
            open_duration: DEFAULT_OPEN_DURATION,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            snapshot_path: None,
            miss_ttl: Duration::ZERO,
            user_agent: build_user_agent(),
        }
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), GateError> {
        check_url("api_base_url", &self.api_base_url)?;
        check_url("refresh_url", &self.refresh_url)?;
        if self.access_token.trim().is_empty() {
            return Err(GateError::ConfigError(
                "access_token cannot be empty".to_string(),
            ));
        }
        if self.refresh_token.trim().is_empty() {
            return Err(GateError::ConfigError(
                "refresh_token cannot be empty".to_string(),
            ));
        }
        if self.tail_pages == 0 {
            return Err(GateError::ConfigError(
                "tail_pages must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateConfig")
            .field("api_base_url", &self.api_base_url)
            .field("access_token", &"<redacted>")
            .field("refresh_url", &self.refresh_url)
            .field("refresh_token", &"<redacted>")
            .field("page_delay", &self.page_delay)
            .field("tail_pages", &self.tail_pages)
            .field("open_duration", &self.open_duration)
            .field("request_timeout", &self.request_timeout)
            .field("snapshot_path", &self.snapshot_path)
            .field("miss_ttl", &self.miss_ttl)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

fn check_url(field: &str, url: &str) -> Result<(), GateError> {
    if url.is_empty() {
        return Err(GateError::ConfigError(format!("{} cannot be empty", field)));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(GateError::ConfigError(format!(
            "{} must be an http(s) URL, got {}",
            field, url
        )));
    }
    Ok(())
}

/// Build the default User-Agent string.
///
/// Format: `qrgate/<version>`
pub fn build_user_agent() -> String {
    format!("qrgate/{}", env!("CARGO_PKG_VERSION"))
}
