//! Packages by publication date.

use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::govinfo::normalize::{fetch_date_range, parse_page};
use crate::govinfo::{DateRange, ListingShape, RequestSpec};
use crate::mcp::server::ToolDefinition;
use crate::tools::params::{self, default_offset_mark, default_page_size};
use crate::tools::{page_json, partitioned_json, ParamError, ToolContext, ToolResult};

/// Arguments for `published_get_published_packages`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishedParams {
    /// Issue date (`YYYY-MM-DD`).
    pub date_issued: String,
    /// Collection code filter.
    #[serde(default)]
    pub collection: String,
    /// Document class filter.
    #[serde(default)]
    pub doc_class: String,
    /// Results per page (1-100).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Continuation cursor.
    #[serde(default = "default_offset_mark")]
    pub offset_mark: String,
}

impl PublishedParams {
    /// Validates the parameters and builds the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the date is malformed or a parameter is out of range.
    pub fn to_request(&self) -> Result<RequestSpec, ParamError> {
        let date = params::date("date_issued", &self.date_issued)?;
        Ok(RequestSpec::get(format!("/published/{date}"))
            .query("pageSize", params::page_size(self.page_size)?)
            .query("offsetMark", params::offset_mark(&self.offset_mark)?)
            .query_opt("collection", params::optional(&self.collection))
            .query_opt("docClass", params::optional(&self.doc_class)))
    }
}

/// Lists packages issued on one date.
pub async fn get_published_packages(
    ctx: &ToolContext,
    params: PublishedParams,
    cancel: &CancellationToken,
) -> ToolResult {
    let spec = params.to_request()?;
    tracing::info!(date = %params.date_issued, "Fetching published packages");

    let raw = ctx.executor.execute(&spec, cancel).await?;
    let page = parse_page(&raw, ListingShape::PACKAGES)?;

    tracing::info!(count = page.count_returned, "Found published packages");
    Ok(page_json(page))
}

/// Arguments for `published_get_published_range`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishedRangeParams {
    /// First issue date (`YYYY-MM-DD`).
    pub start_date: String,
    /// Last issue date (`YYYY-MM-DD`), inclusive.
    pub end_date: String,
    /// Collection code; the upstream requires one for ranges.
    pub collection: String,
    /// Document class filter.
    #[serde(default)]
    pub doc_class: String,
    /// Only packages modified since this date (`YYYY-MM-DD`).
    #[serde(default)]
    pub modified_since: String,
    /// Results per page (1-100).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Continuation cursor; only valid when the range fits one partition.
    #[serde(default = "default_offset_mark")]
    pub offset_mark: String,
}

impl PublishedRangeParams {
    /// Validates the parameters and returns the range to fetch.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter is missing, malformed or out of range,
    /// or if a cursor is given for a range spanning several partitions.
    pub fn validate(&self, max_days: u32) -> Result<DateRange, ParamError> {
        params::required("collection", &self.collection)?;
        params::page_size(self.page_size)?;
        let offset_mark = params::offset_mark(&self.offset_mark)?;
        params::optional_date("modified_since", &self.modified_since)?;

        let range = params::date_range(
            params::date("start_date", &self.start_date)?,
            params::date("end_date", &self.end_date)?,
        )?;
        params::range_cursor(&range, max_days, offset_mark)?;
        Ok(range)
    }

    /// Builds the request for one partition.
    #[must_use]
    pub fn partition_request(&self, range: &DateRange) -> RequestSpec {
        RequestSpec::get(format!("/published/{}/{}", range.start, range.end))
            .query("pageSize", self.page_size)
            .query("offsetMark", &self.offset_mark)
            .query("collection", self.collection.trim())
            .query_opt("docClass", params::optional(&self.doc_class))
            .query_opt("modifiedSince", params::optional(&self.modified_since))
    }
}

/// Lists packages issued within a date range, splitting long ranges.
pub async fn get_published_range(
    ctx: &ToolContext,
    params: PublishedRangeParams,
    cancel: &CancellationToken,
) -> ToolResult {
    let range = params.validate(ctx.max_range_days)?;
    tracing::info!(range = %range, collection = %params.collection, "Fetching published range");

    let page = fetch_date_range(
        &ctx.executor,
        range,
        ctx.max_range_days,
        ListingShape::PACKAGES,
        cancel,
        |part| params.partition_request(part),
    )
    .await?;

    tracing::info!(
        count = page.count_returned,
        partitions = page.partitions.len(),
        "Found published packages in range"
    );
    Ok(partitioned_json(page))
}

pub(crate) fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "published_get_published_packages".to_string(),
            description: Some(
                "Get packages published on a specific date, optionally filtered by \
                 collection and document class."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "date_issued": {
                        "type": "string",
                        "description": "Date to get published packages for (YYYY-MM-DD)"
                    },
                    "collection": {
                        "type": "string",
                        "description": "Filter by collection code (e.g., 'BILLS', 'PLAW')"
                    },
                    "doc_class": {
                        "type": "string",
                        "description": "Filter by document class"
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
                "required": ["date_issued"]
            }),
        },
        ToolDefinition {
            name: "published_get_published_range".to_string(),
            description: Some(
                "Get packages published within a date range for one collection. Long \
                 ranges are split into consecutive partitions; each partition in the \
                 result carries its own next_cursor."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "start_date": {
                        "type": "string",
                        "description": "Start date for range (YYYY-MM-DD)"
                    },
                    "end_date": {
                        "type": "string",
                        "description": "End date for range (YYYY-MM-DD), inclusive"
                    },
                    "collection": {
                        "type": "string",
                        "description": "Collection code (e.g., 'BILLS', 'PLAW', 'CFR')"
                    },
                    "doc_class": {
                        "type": "string",
                        "description": "Filter by document class"
                    },
                    "modified_since": {
                        "type": "string",
                        "description": "Only return packages modified since this date (YYYY-MM-DD)"
                    },
                    "page_size": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 100,
                        "description": "Number of results per page (default: 50)"
                    },
                    "offset_mark": {
                        "type": "string",
                        "description": "Pagination cursor for a single-partition range"
                    }
                },
                "required": ["start_date", "end_date", "collection"]
            }),
        },
    ]
}
