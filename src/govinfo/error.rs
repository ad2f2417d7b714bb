//! Error types for GovInfo requests.
//!
//! Every failure in the request core resolves to an [`ApiError`]. The tool
//! layer turns it into a tool-call failure; nothing is swallowed.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Result type for GovInfo operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Classification of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Upstream returned 429, or the local budget was not granted in time.
    RateLimited,
    /// Connection, DNS or timeout failure before a response arrived.
    Transport,
    /// Upstream returned a 5xx status.
    ServerError,
    /// Upstream returned a 4xx status other than 429.
    ClientError,
    /// A 2xx body did not have the expected shape.
    MalformedResponse,
    /// The requested content format is not served by the endpoint.
    UnsupportedContentType,
    /// The calling context was cancelled while suspended.
    Cancelled,
}

impl ErrorKind {
    /// Whether errors of this kind may succeed when repeated.
    #[must_use]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::RateLimited | Self::Transport | Self::ServerError)
    }

    /// Returns the stable snake_case name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Transport => "transport",
            Self::ServerError => "server_error",
            Self::ClientError => "client_error",
            Self::MalformedResponse => "malformed_response",
            Self::UnsupportedContentType => "unsupported_content_type",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A terminal request failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind}: {message}")]
pub struct ApiError {
    /// Failure classification.
    pub kind: ErrorKind,
    /// Upstream HTTP status, when a response was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Whether the caller may try again later.
    pub retriable: bool,
    /// Human-readable description. Never contains the API key.
    pub message: String,
}

impl ApiError {
    /// Creates an error whose retriability follows its kind.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status_code: None,
            retriable: kind.is_retriable(),
            message: message.into(),
        }
    }

    /// Attaches the upstream status code.
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    /// Classifies a non-success HTTP status.
    ///
    /// 429 is `RateLimited`, 5xx is `ServerError`, anything else is a
    /// non-retriable `ClientError`.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            429 => ErrorKind::RateLimited,
            500..=599 => ErrorKind::ServerError,
            _ => ErrorKind::ClientError,
        };
        let snippet = truncate(body.trim(), 200);
        let message = if snippet.is_empty() {
            format!("HTTP error: {status}")
        } else {
            format!("HTTP error: {status} - {snippet}")
        };
        Self::new(kind, message).with_status(status)
    }

    /// Shorthand for a `Transport` error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Shorthand for a `MalformedResponse` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedResponse, message)
    }

    /// Shorthand for a `Cancelled` error.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "request cancelled")
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        let err = ApiError::from_status(429, "");
        assert_eq!(err.kind, ErrorKind::RateLimited);
        assert!(err.retriable);

        let err = ApiError::from_status(503, "unavailable");
        assert_eq!(err.kind, ErrorKind::ServerError);
        assert!(err.retriable);
        assert_eq!(err.status_code, Some(503));

        for status in [400, 401, 403, 404] {
            let err = ApiError::from_status(status, "");
            assert_eq!(err.kind, ErrorKind::ClientError);
            assert!(!err.retriable);
        }
    }

    #[test]
    fn message_includes_truncated_body() {
        let body = "x".repeat(500);
        let err = ApiError::from_status(400, &body);
        assert!(err.message.starts_with("HTTP error: 400 - "));
        assert!(err.message.ends_with("..."));
        assert!(err.message.len() < 250);
    }

    #[test]
    fn non_retriable_kinds() {
        assert!(!ErrorKind::MalformedResponse.is_retriable());
        assert!(!ErrorKind::UnsupportedContentType.is_retriable());
        assert!(!ErrorKind::Cancelled.is_retriable());
    }

    #[test]
    fn display_contains_kind() {
        let err = ApiError::cancelled();
        assert_eq!(err.to_string(), "cancelled: request cancelled");
    }
}
