//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::govinfo::{ExecutorOptions, RetryPolicy};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "GOVINFO_API_KEY";

/// Environment variable overriding the base URL.
pub const BASE_URL_ENV: &str = "GOVINFO_BASE_URL";

/// Upper bound for `retry.max_attempts`.
const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Upstream API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Request budget settings.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Retry settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Timeout settings.
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Date-range partitioning.
    #[serde(default)]
    pub date_range: DateRangeConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Overlays environment variables onto the file settings.
    ///
    /// `lookup` is normally `std::env::var(..).ok()`; tests pass a closure.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.api.api_key = Some(key);
        }
        if let Some(url) = lookup(BASE_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.api.base_url = url;
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |message: String| Err(ConfigError::ValidationError { message });

        if self.api_key().is_none() {
            return fail(format!(
                "no API key configured; set {API_KEY_ENV} or api.api_key"
            ));
        }
        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://"))
        {
            return fail("api.base_url must start with http:// or https://".to_string());
        }
        if self.rate_limit.requests_per_window == 0 {
            return fail("rate_limit.requests_per_window must be greater than 0".to_string());
        }
        if self.rate_limit.window_secs == 0 {
            return fail("rate_limit.window_secs must be greater than 0".to_string());
        }
        if self.retry.max_attempts == 0 || self.retry.max_attempts > MAX_RETRY_ATTEMPTS {
            return fail(format!(
                "retry.max_attempts must be between 1 and {MAX_RETRY_ATTEMPTS}"
            ));
        }
        if self.timeouts.request_secs == 0 || self.timeouts.download_secs == 0 {
            return fail("timeouts must be greater than 0".to_string());
        }
        if self.date_range.max_days == 0 {
            return fail("date_range.max_days must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Returns the API key if one is set and non-blank.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Length of one rate-limit window.
    #[must_use]
    pub const fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit.window_secs)
    }

    /// Builds the executor settings.
    #[must_use]
    pub fn executor_options(&self) -> ExecutorOptions {
        ExecutorOptions {
            base_url: self.api.base_url.clone(),
            request_timeout: Duration::from_secs(self.timeouts.request_secs),
            download_timeout: Duration::from_secs(self.timeouts.download_secs),
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                backoff_base: Duration::from_millis(self.retry.backoff_base_ms),
                jitter: self.retry.jitter,
            },
        }
    }
}

/// Upstream API configuration.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL of the GovInfo API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key. Usually supplied through `GOVINFO_API_KEY` instead.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
        }
    }
}

fn default_base_url() -> String {
    "https://api.govinfo.gov".to_string()
}

/// Rate-limit configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Requests admitted per window.
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: u32,

    /// Window length in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: default_requests_per_window(),
            window_secs: default_window_secs(),
        }
    }
}

const fn default_requests_per_window() -> u32 {
    1000
}

const fn default_window_secs() -> u64 {
    3600
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Physical attempts per logical request.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff delay in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Randomise backoff delays.
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            jitter: default_true(),
        }
    }
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_backoff_base_ms() -> u64 {
    500
}

const fn default_true() -> bool {
    true
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Timeout for JSON requests in seconds.
    #[serde(default = "default_request_secs")]
    pub request_secs: u64,

    /// Timeout for content downloads in seconds.
    #[serde(default = "default_download_secs")]
    pub download_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: default_request_secs(),
            download_secs: default_download_secs(),
        }
    }
}

const fn default_request_secs() -> u64 {
    30
}

const fn default_download_secs() -> u64 {
    60
}

/// Date-range configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DateRangeConfig {
    /// Longest span, in days, requested from upstream in one call.
    #[serde(default = "default_max_days")]
    pub max_days: u32,
}

impl Default for DateRangeConfig {
    fn default() -> Self {
        Self {
            max_days: default_max_days(),
        }
    }
}

const fn default_max_days() -> u32 {
    365
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
