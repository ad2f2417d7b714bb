//! Response normalisation.
//!
//! Converts raw upstream payloads into [`Page`]s, metadata records and
//! downloaded [`Content`], and drives date-range partitioning for endpoints
//! that cap the span of a single request.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use chrono::{Duration as ChronoDuration, NaiveDate};
use reqwest::Url;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::govinfo::error::{ApiError, ApiResult, ErrorKind};
use crate::govinfo::executor::{HttpExecutor, RawResponse};
use crate::govinfo::request::RequestSpec;

/// Cursor value that requests the first page.
pub const FIRST_PAGE_CURSOR: &str = "*";

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// Records in upstream order.
    pub items: Vec<Value>,
    /// Continuation token, absent once results are exhausted.
    pub next_cursor: Option<String>,
    /// Number of items on this page.
    pub count_returned: usize,
    /// Total matches reported by upstream, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
}

impl Page {
    /// Returns `true` if no further pages exist.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// Where a listing response keeps its continuation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorSource {
    /// A top-level string field holding the token itself.
    Field(&'static str),
    /// A top-level URL field; the token is one of its query parameters.
    NextPageUrl {
        /// Name of the URL field.
        field: &'static str,
        /// Query parameter holding the token.
        param: &'static str,
    },
}

/// Shape of a listing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingShape {
    /// Field holding the array of records.
    pub items_field: &'static str,
    /// Location of the continuation token.
    pub cursor: CursorSource,
}

impl ListingShape {
    /// `GET /collections`.
    pub const COLLECTIONS: Self = Self {
        items_field: "collections",
        cursor: CursorSource::NextPageUrl {
            field: "nextPage",
            param: "offsetMark",
        },
    };

    /// `GET /collections/{c}/...` and `GET /published/...`.
    pub const PACKAGES: Self = Self {
        items_field: "packages",
        cursor: CursorSource::NextPageUrl {
            field: "nextPage",
            param: "offsetMark",
        },
    };

    /// `POST /search`.
    pub const SEARCH: Self = Self {
        items_field: "results",
        cursor: CursorSource::Field("offsetMark"),
    };
}

/// Parses a JSON object body.
///
/// # Errors
///
/// Returns `MalformedResponse` if the body is not a JSON object.
pub fn parse_object(raw: &RawResponse) -> ApiResult<Map<String, Value>> {
    match serde_json::from_slice::<Value>(&raw.body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ApiError::malformed("expected a JSON object")),
        Err(e) => Err(ApiError::malformed(format!("invalid JSON: {e}"))),
    }
}

/// Parses a listing response into a [`Page`].
///
/// # Errors
///
/// Returns `MalformedResponse` if the body is not JSON, the items field is
/// missing or not an array, or the cursor field has the wrong type.
pub fn parse_page(raw: &RawResponse, shape: ListingShape) -> ApiResult<Page> {
    let mut object = parse_object(raw)?;

    let items = match object.remove(shape.items_field) {
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ApiError::malformed(format!(
                "field '{}' is not an array",
                shape.items_field
            )))
        }
        None => {
            return Err(ApiError::malformed(format!(
                "missing field '{}'",
                shape.items_field
            )))
        }
    };

    let next_cursor = extract_cursor(&object, shape.cursor)?;
    let total_count = object.get("count").and_then(Value::as_u64);

    Ok(Page {
        count_returned: items.len(),
        items,
        next_cursor,
        total_count,
    })
}

fn extract_cursor(object: &Map<String, Value>, source: CursorSource) -> ApiResult<Option<String>> {
    match source {
        CursorSource::Field(field) => match object.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(ApiError::malformed(format!("field '{field}' is not a string"))),
        },
        CursorSource::NextPageUrl { field, param } => {
            let url = match object.get(field) {
                None | Some(Value::Null) => return Ok(None),
                Some(Value::String(s)) if s.is_empty() => return Ok(None),
                Some(Value::String(s)) => s,
                Some(_) => {
                    return Err(ApiError::malformed(format!("field '{field}' is not a string")))
                }
            };
            let mut parsed = Url::parse(url)
                .or_else(|_| Url::parse("http://localhost/").and_then(|base| base.join(url)))
                .map_err(|e| ApiError::malformed(format!("field '{field}' is not a URL: {e}")))?;
            // '+' in a cursor is data, not an encoded space
            if let Some(query) = parsed.query().map(|q| q.replace('+', "%2B")) {
                parsed.set_query(Some(&query));
            }
            parsed
                .query_pairs()
                .find(|(k, _)| k == param)
                .map(|(_, v)| Some(v.into_owned()))
                .ok_or_else(|| {
                    ApiError::malformed(format!("field '{field}' has no '{param}' parameter"))
                })
        }
    }
}

/// Downloadable document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    /// Rendered HTML.
    Html,
    /// Structured XML markup.
    Xml,
    /// Portable document, returned base64-encoded.
    Pdf,
    /// Plain text.
    Text,
}

impl ContentFormat {
    /// Formats served by the package download endpoints.
    pub const ALL: [Self; 4] = [Self::Html, Self::Xml, Self::Pdf, Self::Text];

    /// Path suffix of the download endpoint.
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Html => "htm",
            Self::Xml => "xml",
            Self::Pdf => "pdf",
            Self::Text => "txt",
        }
    }

    /// Whether the payload is binary and must be base64-encoded.
    #[must_use]
    pub const fn is_binary(self) -> bool {
        matches!(self, Self::Pdf)
    }

    /// Parses a caller-supplied format and checks it against `supported`.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedContentType` if the name is unknown or not in
    /// `supported`.
    pub fn negotiate(requested: &str, supported: &[Self]) -> ApiResult<Self> {
        let format = requested
            .parse::<Self>()
            .ok()
            .filter(|f| supported.contains(f));
        format.ok_or_else(|| {
            let names: Vec<_> = supported.iter().map(ToString::to_string).collect();
            ApiError::new(
                ErrorKind::UnsupportedContentType,
                format!(
                    "content type '{requested}' is not supported; expected one of: {}",
                    names.join(", ")
                ),
            )
        })
    }
}

impl FromStr for ContentFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" | "htm" => Ok(Self::Html),
            "xml" => Ok(Self::Xml),
            "pdf" => Ok(Self::Pdf),
            "text" | "txt" => Ok(Self::Text),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Html => "html",
            Self::Xml => "xml",
            Self::Pdf => "pdf",
            Self::Text => "text",
        })
    }
}

/// Downloaded document payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ContentBody {
    /// Text formats, decoded as UTF-8.
    Text {
        /// Document text.
        text: String,
    },
    /// Binary formats.
    Binary {
        /// Base64-encoded bytes.
        base64_content: String,
    },
}

/// A downloaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Content {
    /// Requested format.
    pub format: ContentFormat,
    /// Upstream `Content-Type` header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Size of the raw payload in bytes.
    pub size_bytes: usize,
    /// The payload.
    #[serde(flatten)]
    pub body: ContentBody,
}

/// Wraps a download response.
///
/// # Errors
///
/// Returns `MalformedResponse` if a text format is not valid UTF-8.
pub fn decode_content(raw: RawResponse, format: ContentFormat) -> ApiResult<Content> {
    let size_bytes = raw.body.len();
    let body = if format.is_binary() {
        ContentBody::Binary {
            base64_content: BASE64_STANDARD.encode(&raw.body),
        }
    } else {
        let text = String::from_utf8(raw.body)
            .map_err(|_| ApiError::malformed(format!("{format} content is not valid UTF-8")))?;
        ContentBody::Text { text }
    };
    Ok(Content {
        format,
        content_type: raw.content_type,
        size_bytes,
        body,
    })
}

/// An inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    /// First day.
    pub start: NaiveDate,
    /// Last day, inclusive.
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a range; returns `None` if `end` precedes `start`.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Number of days covered, counting both ends.
    #[must_use]
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Splits into ascending, non-overlapping ranges of at most `max_days`.
    #[must_use]
    pub fn partitions(&self, max_days: u32) -> Vec<Self> {
        let step = i64::from(max_days.max(1));
        let mut parts = Vec::new();
        let mut start = self.start;
        while start <= self.end {
            let end = start
                .checked_add_signed(ChronoDuration::days(step - 1))
                .map_or(self.end, |d| d.min(self.end));
            parts.push(Self { start, end });
            match end.succ_opt() {
                Some(next) => start = next,
                None => break,
            }
        }
        parts
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Result of one partition in a date-range fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionSummary {
    /// Sub-range requested.
    pub range: DateRange,
    /// Items this partition contributed.
    pub count_returned: usize,
    /// Continuation token for this partition, if it has more pages.
    pub next_cursor: Option<String>,
}

/// Concatenated results of a partitioned date-range fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionedPage {
    /// Items from every partition, in partition order.
    pub items: Vec<Value>,
    /// Total number of items.
    pub count_returned: usize,
    /// Per-partition details, in ascending date order.
    pub partitions: Vec<PartitionSummary>,
}

impl PartitionedPage {
    /// Returns `true` if no partition has further pages.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.partitions.iter().all(|p| p.next_cursor.is_none())
    }
}

/// Fetches `range` as a sequence of sub-ranges no longer than `max_days`.
///
/// Partitions are requested one at a time in ascending order; items are
/// concatenated without re-sorting. Any failure aborts the whole fetch, so
/// no partial result is returned.
///
/// # Errors
///
/// Returns the first error from the executor or the normaliser.
pub async fn fetch_date_range<F>(
    executor: &HttpExecutor,
    range: DateRange,
    max_days: u32,
    shape: ListingShape,
    cancel: &CancellationToken,
    build: F,
) -> ApiResult<PartitionedPage>
where
    F: Fn(&DateRange) -> RequestSpec,
{
    let parts = range.partitions(max_days);
    tracing::debug!(range = %range, partitions = parts.len(), "Fetching date range");

    let mut items = Vec::new();
    let mut partitions = Vec::with_capacity(parts.len());

    for part in parts {
        let spec = build(&part);
        let raw = executor.execute(&spec, cancel).await?;
        let page = parse_page(&raw, shape)?;
        partitions.push(PartitionSummary {
            range: part,
            count_returned: page.count_returned,
            next_cursor: page.next_cursor,
        });
        items.extend(page.items);
    }

    Ok(PartitionedPage {
        count_returned: items.len(),
        items,
        partitions,
    })
}
