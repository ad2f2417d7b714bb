//! Upstream request description.

use std::fmt;

use indexmap::IndexMap;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;

/// HTTP method. The GovInfo API is read-only, so both are safe to repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET` request.
    Get,
    /// `POST` request (used by `/search`).
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// A fully validated request, relative to the configured base URL.
///
/// Query parameters keep insertion order; setting an existing key replaces
/// its value in place.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    /// HTTP method.
    pub method: Method,
    /// Path below the base URL, starting with `/`.
    pub path: String,
    /// Query string parameters.
    pub query: IndexMap<String, String>,
    /// Extra request headers (the API key is added by the executor).
    pub headers: IndexMap<String, String>,
    /// JSON body for `POST` requests.
    pub body: Option<Value>,
    /// Use the longer download timeout.
    pub download: bool,
}

impl RequestSpec {
    /// Creates a `GET` request for `path`.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Creates a `POST` request for `path` with a JSON body.
    #[must_use]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        let mut spec = Self::new(Method::Post, path);
        spec.body = Some(body);
        spec
    }

    fn new(method: Method, path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        Self {
            method,
            path,
            query: IndexMap::new(),
            headers: IndexMap::new(),
            body: None,
            download: false,
        }
    }

    /// Sets a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.insert(key.into(), value.to_string());
        self
    }

    /// Sets a query parameter if `value` is present.
    #[must_use]
    pub fn query_opt<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    /// Sets a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Marks this as a content download.
    #[must_use]
    pub const fn download(mut self) -> Self {
        self.download = true;
        self
    }
}

impl fmt::Display for RequestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Characters escaped in a path segment: everything except the unreserved
/// set and `:`, which GovInfo timestamps use unescaped.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b':');

/// Percent-encodes a single path segment.
///
/// Package and granule IDs are opaque; anything outside the unreserved set
/// is escaped so it cannot change the request path.
#[must_use]
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}
