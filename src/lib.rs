//! govinfo-mcp: MCP server for legal research against the GovInfo API
//!
//! This library exposes the U.S. Government Publishing Office's GovInfo API
//! (collections, packages, publication dates, related documents, search and
//! statutes) as MCP tools for AI assistants.
//!
//! # Architecture
//!
//! Tools validate their arguments and describe the upstream call. A shared
//! request core does the rest:
//!
//! - **Rate limiting**: one trailing-window budget for every outgoing request
//! - **Execution**: HTTP with timeouts, retries and exponential backoff
//! - **Normalisation**: uniform pages, opaque cursors and content payloads
//!
//! # Modules
//!
//! - [`config`] — Configuration loading and validation
//! - [`error`] — Configuration error types
//! - [`govinfo`] — Request core: rate limiter, executor, normaliser
//! - [`mcp`] — MCP protocol implementation
//! - [`tools`] — The GovInfo tools

pub mod config;
pub mod error;
pub mod govinfo;
pub mod mcp;
pub mod tools;

use std::sync::Arc;

use crate::config::Config;
use crate::error::ConfigError;
use crate::govinfo::{HttpExecutor, RateLimiter};
use crate::tools::ToolContext;

/// Builds the tool context (executor, shared rate limiter) from a
/// validated configuration.
///
/// # Errors
///
/// Returns an error if no API key is configured or the HTTP client cannot
/// be initialised.
pub fn build_context(config: &Config) -> Result<ToolContext, ConfigError> {
    let api_key = config.api_key().ok_or_else(|| ConfigError::ValidationError {
        message: format!(
            "no API key configured; set {} or api.api_key",
            config::API_KEY_ENV
        ),
    })?;

    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit.requests_per_window,
        config.rate_window(),
    ));
    let executor = HttpExecutor::new(config.executor_options(), api_key, limiter)
        .map_err(|source| ConfigError::HttpClientError { source })?;

    Ok(ToolContext::new(executor, config.date_range.max_days))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_requires_api_key() {
        let config = Config::default();
        let err = build_context(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn context_shares_configured_limiter() {
        let mut config = Config::default();
        config.api.api_key = Some("test-key".to_string());
        config.date_range.max_days = 30;

        let ctx = build_context(&config).unwrap();
        assert_eq!(ctx.max_range_days, 30);
        assert_eq!(
            ctx.executor.limiter().limit(),
            config.rate_limit.requests_per_window
        );
    }
}
