//! Package listing, metadata and content downloads.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::govinfo::normalize::{decode_content, fetch_date_range, parse_object, parse_page};
use crate::govinfo::request::encode_segment;
use crate::govinfo::{ContentFormat, DateRange, ErrorKind, ListingShape, RequestSpec};
use crate::mcp::server::ToolDefinition;
use crate::tools::params::{self, default_offset_mark, default_page_size};
use crate::tools::{page_json, partitioned_json, ParamError, ToolContext, ToolResult};

/// How far back listings start when no start date is given.
const DEFAULT_LOOKBACK_DAYS: i64 = 365;

/// Arguments for `packages_get_packages_by_collection`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionPackagesParams {
    /// Collection code, e.g. `BILLS`.
    pub collection: String,
    /// Congress number (BILLS, PLAW and similar collections).
    #[serde(default)]
    pub congress: Option<u32>,
    /// Document class filter.
    #[serde(default)]
    pub doc_class: String,
    /// Last-modified start date (`YYYY-MM-DD`); defaults to one year ago.
    #[serde(default)]
    pub start_date: String,
    /// Last-modified end date (`YYYY-MM-DD`).
    #[serde(default)]
    pub end_date: String,
    /// Results per page (1-100).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Continuation cursor.
    #[serde(default = "default_offset_mark")]
    pub offset_mark: String,
}

/// What a collection listing will request.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionPlan {
    /// Everything modified since a timestamp, in one request.
    Since(RequestSpec),
    /// A bounded range, fetched partition by partition.
    Range(DateRange),
}

impl CollectionPackagesParams {
    /// Validates the parameters and decides how to fetch.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter is missing, malformed or out of range.
    pub fn plan(&self, now: DateTime<Utc>, max_days: u32) -> Result<CollectionPlan, ParamError> {
        params::required("collection", &self.collection)?;
        params::page_size(self.page_size)?;
        let offset_mark = params::offset_mark(&self.offset_mark)?;
        if let Some(congress) = self.congress {
            params::congress("congress", congress)?;
        }

        let default_start = now - ChronoDuration::days(DEFAULT_LOOKBACK_DAYS);
        let start = params::optional_date("start_date", &self.start_date)?;

        match params::optional_date("end_date", &self.end_date)? {
            Some(end) => {
                let range =
                    params::date_range(start.unwrap_or_else(|| default_start.date_naive()), end)?;
                params::range_cursor(&range, max_days, offset_mark)?;
                Ok(CollectionPlan::Range(range))
            }
            None => {
                let since = start.map_or_else(
                    || default_start.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                    |d| format!("{d}T00:00:00Z"),
                );
                Ok(CollectionPlan::Since(self.request(&[since])))
            }
        }
    }

    /// Builds the request for one partition of a range listing.
    #[must_use]
    pub fn partition_request(&self, range: &DateRange) -> RequestSpec {
        self.request(&[
            format!("{}T00:00:00Z", range.start),
            format!("{}T23:59:59Z", range.end),
        ])
    }

    fn request(&self, timestamps: &[String]) -> RequestSpec {
        let mut path = format!("/collections/{}", encode_segment(self.collection.trim()));
        for ts in timestamps {
            path.push('/');
            path.push_str(&encode_segment(ts));
        }
        RequestSpec::get(path)
            .query("pageSize", self.page_size)
            .query("offsetMark", &self.offset_mark)
            .query_opt("congress", self.congress)
            .query_opt("docClass", params::optional(&self.doc_class))
    }
}

/// Lists packages in a collection by last-modified date.
pub async fn get_packages_by_collection(
    ctx: &ToolContext,
    params: CollectionPackagesParams,
    cancel: &CancellationToken,
) -> ToolResult {
    tracing::info!(collection = %params.collection, "Fetching packages from collection");

    match params.plan(Utc::now(), ctx.max_range_days)? {
        CollectionPlan::Since(spec) => {
            let raw = ctx.executor.execute(&spec, cancel).await?;
            let page = parse_page(&raw, ListingShape::PACKAGES)?;
            tracing::info!(count = page.count_returned, "Found packages");
            Ok(page_json(page))
        }
        CollectionPlan::Range(range) => {
            let page = fetch_date_range(
                &ctx.executor,
                range,
                ctx.max_range_days,
                ListingShape::PACKAGES,
                cancel,
                |part| params.partition_request(part),
            )
            .await?;
            tracing::info!(count = page.count_returned, "Found packages");
            Ok(partitioned_json(page))
        }
    }
}

/// Arguments for `packages_get_package_summary`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSummaryParams {
    /// Package ID, e.g. `BILLS-116hr1-ih`.
    pub package_id: String,
}

impl PackageSummaryParams {
    /// Validates the parameters and builds the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the package ID is blank.
    pub fn to_request(&self) -> Result<RequestSpec, ParamError> {
        let id = params::required("package_id", &self.package_id)?;
        Ok(RequestSpec::get(format!("/packages/{}/summary", encode_segment(id))))
    }
}

/// Fetches package metadata, including available download formats.
pub async fn get_package_summary(
    ctx: &ToolContext,
    params: PackageSummaryParams,
    cancel: &CancellationToken,
) -> ToolResult {
    let spec = params.to_request()?;
    tracing::info!(package_id = %params.package_id, "Fetching package summary");

    let raw = ctx.executor.execute(&spec, cancel).await?;
    Ok(Value::Object(parse_object(&raw)?))
}

/// Arguments for `packages_get_package_content`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageContentParams {
    /// Package ID.
    pub package_id: String,
    /// `html` (default), `xml`, `pdf` or `text`.
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_content_type() -> String {
    "html".to_string()
}

impl PackageContentParams {
    /// Validates the parameters and builds the download request.
    ///
    /// Unsupported formats are rejected here, before any request is made.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedContentType` or a parameter error.
    pub fn to_request(&self) -> Result<(ContentFormat, RequestSpec), crate::tools::ToolError> {
        let id = params::required("package_id", &self.package_id)?;
        let format = ContentFormat::negotiate(&self.content_type, &ContentFormat::ALL)?;
        let spec = RequestSpec::get(format!(
            "/packages/{}/{}",
            encode_segment(id),
            format.endpoint()
        ))
        .download();
        Ok((format, spec))
    }
}

/// Downloads package content. Text formats are returned as text, PDF as
/// base64.
pub async fn get_package_content(
    ctx: &ToolContext,
    params: PackageContentParams,
    cancel: &CancellationToken,
) -> ToolResult {
    let (format, spec) = params.to_request()?;
    tracing::info!(package_id = %params.package_id, format = %format, "Fetching package content");

    let raw = match ctx.executor.execute(&spec, cancel).await {
        Ok(raw) => raw,
        Err(mut error) => {
            if error.kind == ErrorKind::ClientError && error.status_code == Some(400) {
                error.message = format!(
                    "Content type '{format}' is not available for package '{}'. Use \
                     packages_get_package_summary to check the 'download' field for \
                     available formats. {}",
                    params.package_id.trim(),
                    error.message
                );
            }
            return Err(error.into());
        }
    };

    let content = decode_content(raw, format)?;
    let mut value = serde_json::to_value(&content)
        .map_err(|e| crate::govinfo::ApiError::malformed(e.to_string()))?;
    value["package_id"] = Value::String(params.package_id.trim().to_string());
    Ok(value)
}

pub(crate) fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "packages_get_packages_by_collection".to_string(),
            description: Some(
                "List packages from a collection (BILLS, PLAW, CFR, FR, STATUTE, USCOURTS, ...) \
                 by last-modified date. Without end_date, returns packages modified since \
                 start_date (default: one year ago) with a next_cursor for paging. With \
                 end_date, long ranges are split into consecutive partitions and each \
                 partition reports its own next_cursor."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "collection": {
                        "type": "string",
                        "description": "Collection code (e.g., 'BILLS', 'PLAW', 'CFR')"
                    },
                    "congress": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 200,
                        "description": "Congress number for filtering"
                    },
                    "doc_class": {
                        "type": "string",
                        "description": "Document class for filtering"
                    },
                    "start_date": {
                        "type": "string",
                        "description": "Start date (YYYY-MM-DD)"
                    },
                    "end_date": {
                        "type": "string",
                        "description": "End date (YYYY-MM-DD)"
                    },
                    "page_size": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 100,
                        "description": "Number of results per page (default: 50)"
                    },
                    "offset_mark": {
                        "type": "string",
                        "description": "Pagination cursor; '*' for the first page (default)"
                    }
                },
                "required": ["collection"]
            }),
        },
        ToolDefinition {
            name: "packages_get_package_summary".to_string(),
            description: Some(
                "Get metadata for a package: title, dates, collection and the 'download' \
                 field listing available content formats."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "package_id": {
                        "type": "string",
                        "description": "Package ID (e.g., 'BILLS-116hr1-ih')"
                    }
                },
                "required": ["package_id"]
            }),
        },
        ToolDefinition {
            name: "packages_get_package_content".to_string(),
            description: Some(
                "Download the content of a package. Not every format exists for every \
                 package; check packages_get_package_summary first. 'html' and 'xml' are \
                 most widely available. PDF content is returned base64-encoded."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "package_id": {
                        "type": "string",
                        "description": "Package ID (e.g., 'BILLS-116hr1-ih')"
                    },
                    "content_type": {
                        "type": "string",
                        "enum": ["html", "xml", "pdf", "text"],
                        "description": "Content format (default: html)"
                    }
                },
                "required": ["package_id"]
            }),
        },
    ]
}
