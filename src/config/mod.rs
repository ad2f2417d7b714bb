//! Configuration file loading and parsing.
//!
//! This module handles loading the configuration file from disk and parsing
//! it into validated, type-safe structures.
//!
//! # Configuration Sources
//!
//! Settings are resolved in the following order:
//!
//! 1. Path specified on the command line (must exist)
//! 2. Default location, if present:
//!    - **Linux/macOS:** `~/.govinfo-mcp/config.json`
//!    - **Windows:** `%USERPROFILE%\.govinfo-mcp\config.json`
//! 3. Built-in defaults
//!
//! `GOVINFO_API_KEY` and `GOVINFO_BASE_URL` are applied on top of whichever
//! source was used.

mod settings;

pub use settings::{
    ApiConfig, Config, DateRangeConfig, LoggingConfig, RateLimitConfig, RetryConfig,
    TimeoutConfig, API_KEY_ENV, BASE_URL_ENV,
};

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Returns the default configuration directory.
///
/// - **Linux/macOS:** `~/.govinfo-mcp/`
/// - **Windows:** `%USERPROFILE%\.govinfo-mcp\`
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".govinfo-mcp"))
}

/// Returns the platform-specific default configuration file path.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("config.json"))
}

/// Loads the configuration, applies environment overrides and validates it.
///
/// If `path` is `None`, the default location is used when it exists and the
/// built-in defaults otherwise.
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly given configuration file cannot be found
/// - The file cannot be read
/// - The JSON is malformed
/// - Required settings (such as the API key) are missing or invalid
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => read_config_file(p)?,
        None => match default_config_path().filter(|p| p.exists()) {
            Some(p) => read_config_file(&p)?,
            None => Config::default(),
        },
    };

    config.apply_env(|name| std::env::var(name).ok());

    // Validate the configuration
    config.validate()?;

    Ok(config)
}

/// Reads and parses a configuration file without validating it.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable or malformed.
pub fn read_config_file(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}
