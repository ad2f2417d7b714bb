//! HTTP request executor.
//!
//! Turns one [`RequestSpec`] into at most `max_attempts` physical HTTP calls.
//! Every attempt, retries included, first takes a slot from the shared
//! [`RateLimiter`]. All suspension points race against the caller's
//! [`CancellationToken`]; a cancelled call drops the in-flight request.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::govinfo::error::{ApiError, ApiResult, ErrorKind};
use crate::govinfo::rate_limit::RateLimiter;
use crate::govinfo::request::{Method, RequestSpec};
use crate::govinfo::retry::RetryPolicy;

/// Header carrying the GovInfo API key.
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Connection settings for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Base URL without trailing slash, e.g. `https://api.govinfo.gov`.
    pub base_url: String,
    /// Timeout for JSON requests.
    pub request_timeout: Duration,
    /// Timeout for content downloads.
    pub download_timeout: Duration,
    /// Retry settings.
    pub retry: RetryPolicy,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            base_url: "https://api.govinfo.gov".to_string(),
            request_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

/// A successful upstream response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status (always 2xx).
    pub status: u16,
    /// Value of the `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// Raw body bytes.
    pub body: Vec<u8>,
    /// Physical attempts made, including the successful one.
    pub attempts: u32,
}

/// Executes requests against the GovInfo API.
pub struct HttpExecutor {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    limiter: Arc<RateLimiter>,
    options: ExecutorOptions,
}

impl fmt::Debug for HttpExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpExecutor")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl HttpExecutor {
    /// Creates an executor sharing `limiter` with any other executors.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client (TLS backend included) cannot be
    /// initialised.
    pub fn new(
        options: ExecutorOptions,
        api_key: impl Into<String>,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            limiter,
            options,
        })
    }

    /// Returns the shared rate limiter.
    #[must_use]
    pub const fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Returns the base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Performs one logical request with rate admission and retries.
    ///
    /// # Errors
    ///
    /// Returns the first non-retriable error, the last retriable error once
    /// attempts are exhausted, or `Cancelled` if `cancel` fires while the
    /// call is suspended.
    pub async fn execute(
        &self,
        spec: &RequestSpec,
        cancel: &CancellationToken,
    ) -> ApiResult<RawResponse> {
        let mut retry = self.options.retry.start();

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ApiError::cancelled()),
                () = self.limiter.acquire() => {}
            }

            debug!(request = %spec, attempt = retry.attempt() + 1, "Sending request");

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ApiError::cancelled()),
                outcome = self.attempt(spec) => outcome,
            };

            let error = match outcome {
                Ok(mut response) => {
                    response.attempts = retry.attempt() + 1;
                    return Ok(response);
                }
                Err(error) => error,
            };

            if !error.retriable {
                debug!(request = %spec, error = %error, "Request failed");
                return Err(error);
            }

            let Some(delay) = retry.record_failure() else {
                warn!(
                    request = %spec,
                    attempts = retry.attempt(),
                    error = %error,
                    "Retries exhausted"
                );
                return Err(error);
            };

            warn!(
                request = %spec,
                attempt = retry.attempt(),
                delay_ms = delay.as_millis(),
                error = %error,
                "Request failed, retrying"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ApiError::cancelled()),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Makes a single physical HTTP call.
    async fn attempt(&self, spec: &RequestSpec) -> ApiResult<RawResponse> {
        let url = format!("{}{}", self.base_url, spec.path);
        let timeout = if spec.download {
            self.options.download_timeout
        } else {
            self.options.request_timeout
        };

        let mut builder = match spec.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        }
        .timeout(timeout)
        .header(API_KEY_HEADER, &self.api_key);

        if !spec.query.is_empty() {
            builder = builder.query(&spec.query);
        }
        for (name, value) in &spec.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &spec.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(classify_reqwest_error)?
            .to_vec();

        if !(200..300).contains(&status) {
            return Err(ApiError::from_status(
                status,
                &String::from_utf8_lossy(&body),
            ));
        }

        Ok(RawResponse {
            status,
            content_type,
            body,
            attempts: 1,
        })
    }
}

/// Maps a `reqwest` failure that happened before a status was available.
fn classify_reqwest_error(error: reqwest::Error) -> ApiError {
    if error.is_builder() {
        return ApiError::new(ErrorKind::ClientError, format!("invalid request: {error}"));
    }
    let message = if error.is_timeout() {
        format!("request timed out: {error}")
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        format!("request failed: {error}")
    };
    ApiError::transport(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_api_key() {
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(1)));
        let executor = HttpExecutor::new(ExecutorOptions::default(), "super-secret", limiter).unwrap();
        let debug = format!("{executor:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(1)));
        let options = ExecutorOptions {
            base_url: "http://localhost:1234/".to_string(),
            ..ExecutorOptions::default()
        };
        let executor = HttpExecutor::new(options, "k", limiter).unwrap();
        assert_eq!(executor.base_url(), "http://localhost:1234");
    }
}
