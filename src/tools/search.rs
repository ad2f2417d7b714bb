//! Full-text search.
//!
//! Every search goes through `POST /search` with a Lucene-style query string.
//! The helpers here are shared with the statute tools.

use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::govinfo::normalize::parse_page;
use crate::govinfo::{ApiResult, ListingShape, Page, RequestSpec};
use crate::mcp::server::ToolDefinition;
use crate::tools::params::{self, default_offset_mark, default_page_size};
use crate::tools::{page_json, ParamError, ToolContext, ToolResult};

/// Sort direction for search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Upstream spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    fn parse(value: &str) -> Result<Self, ParamError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(ParamError::invalid(
                "sort_order",
                format!("'{value}' must be 'asc' or 'desc'"),
            )),
        }
    }
}

/// Builds a `POST /search` request.
#[must_use]
pub fn search_request(
    query: &str,
    page_size: u32,
    offset_mark: &str,
    sort_field: &str,
    order: SortOrder,
) -> RequestSpec {
    RequestSpec::post(
        "/search",
        json!({
            "query": query,
            "pageSize": page_size,
            "offsetMark": offset_mark,
            "resultLevel": "default",
            "sorts": [{"field": sort_field, "sortOrder": order.as_str()}],
        }),
    )
}

/// Runs a search request and normalises the result page.
pub(crate) async fn run_search(
    ctx: &ToolContext,
    spec: &RequestSpec,
    cancel: &CancellationToken,
) -> ApiResult<Page> {
    let raw = ctx.executor.execute(spec, cancel).await?;
    parse_page(&raw, ListingShape::SEARCH)
}

/// Quotes a phrase for use in a query.
pub(crate) fn phrase(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}

/// Arguments for `search_search_packages`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchParams {
    /// Search text.
    pub query: String,
    /// Collection code filter.
    #[serde(default)]
    pub collection: String,
    /// Congress number filter.
    #[serde(default)]
    pub congress: Option<u32>,
    /// Document class filter.
    #[serde(default)]
    pub doc_class: String,
    /// Title phrase filter.
    #[serde(default)]
    pub title: String,
    /// Earliest publish date (`YYYY-MM-DD`).
    #[serde(default)]
    pub start_date: String,
    /// Latest publish date (`YYYY-MM-DD`).
    #[serde(default)]
    pub end_date: String,
    /// Results per page (1-100).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Continuation cursor.
    #[serde(default = "default_offset_mark")]
    pub offset_mark: String,
}

impl SearchParams {
    /// Validates the parameters and builds the request.
    ///
    /// Filters are prepended to the query text, each joined with `AND`.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter is missing, malformed or out of range.
    pub fn to_request(&self) -> Result<RequestSpec, ParamError> {
        let mut query = params::required("query", &self.query)?.to_string();
        let page_size = params::page_size(self.page_size)?;
        let offset_mark = params::offset_mark(&self.offset_mark)?;

        if let Some(collection) = params::optional(&self.collection) {
            query = format!("collection:{collection} AND {query}");
        }
        if let Some(congress) = self.congress {
            params::congress("congress", congress)?;
            query = format!("congress:{congress} AND {query}");
        }
        if let Some(doc_class) = params::optional(&self.doc_class) {
            query = format!("docClass:{doc_class} AND {query}");
        }
        if let Some(title) = params::optional(&self.title) {
            query = format!("title:{} AND {query}", phrase(title));
        }
        if let Some(start) = params::optional_date("start_date", &self.start_date)? {
            query = format!("publishdate:>={start} AND {query}");
        }
        if let Some(end) = params::optional_date("end_date", &self.end_date)? {
            query = format!("publishdate:<={end} AND {query}");
        }

        Ok(search_request(&query, page_size, offset_mark, "score", SortOrder::Desc))
    }
}

/// Searches packages across all collections, most relevant first.
pub async fn search_packages(
    ctx: &ToolContext,
    params: SearchParams,
    cancel: &CancellationToken,
) -> ToolResult {
    let spec = params.to_request()?;
    tracing::info!(query = %params.query, "Searching packages");

    let page = run_search(ctx, &spec, cancel).await?;
    tracing::info!(
        count = page.count_returned,
        total = page.total_count,
        "Search complete"
    );
    Ok(page_json(page))
}

const SORT_FIELDS: [&str; 5] = ["relevance", "dateIssued", "title", "packageId", "lastModified"];

fn default_sort_by() -> String {
    "relevance".to_string()
}

fn default_sort_order() -> String {
    "desc".to_string()
}

/// Arguments for `search_advanced_search`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdvancedSearchParams {
    /// Lucene query.
    pub query: String,
    /// Collection codes, any of which may match.
    #[serde(default)]
    pub collections: Vec<String>,
    /// Congress numbers, any of which may match.
    #[serde(default)]
    pub congress: Vec<u32>,
    /// Document classes, any of which may match.
    #[serde(default)]
    pub doc_class: Vec<String>,
    /// Committee names, any of which may match.
    #[serde(default)]
    pub committees: Vec<String>,
    #[serde(default)]
    pub date_issued_start: String,
    #[serde(default)]
    pub date_issued_end: String,
    #[serde(default)]
    pub last_modified_start: String,
    #[serde(default)]
    pub last_modified_end: String,
    /// `relevance`, `dateIssued`, `title`, `packageId` or `lastModified`.
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    /// `asc` or `desc`.
    #[serde(default = "default_sort_order")]
    pub sort_order: String,
    /// Results per page (1-100).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Continuation cursor.
    #[serde(default = "default_offset_mark")]
    pub offset_mark: String,
}

impl AdvancedSearchParams {
    /// Validates the parameters and builds the request.
    ///
    /// Values within one list filter are OR-ed; the filters and the query
    /// are AND-ed together.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter is missing, malformed or out of range.
    pub fn to_request(&self) -> Result<RequestSpec, ParamError> {
        let query = params::required("query", &self.query)?;
        let page_size = params::page_size(self.page_size)?;
        let offset_mark = params::offset_mark(&self.offset_mark)?;
        let order = SortOrder::parse(&self.sort_order)?;

        let sort_by = self.sort_by.trim();
        let sort_field = match sort_by {
            "relevance" => "score",
            field if SORT_FIELDS.contains(&field) => field,
            _ => {
                return Err(ParamError::invalid(
                    "sort_by",
                    format!("'{sort_by}' must be one of: {}", SORT_FIELDS.join(", ")),
                ))
            }
        };

        for &congress in &self.congress {
            params::congress("congress", congress)?;
        }

        let mut clauses = Vec::new();
        push_any(&mut clauses, "collection", self.collections.iter().map(|c| c.trim().to_string()));
        push_any(&mut clauses, "congress", self.congress.iter().map(ToString::to_string));
        push_any(&mut clauses, "docClass", self.doc_class.iter().map(|c| c.trim().to_string()));
        push_any(&mut clauses, "committee", self.committees.iter().map(|c| phrase(c.trim())));
        push_between(
            &mut clauses,
            "dateIssued",
            ("date_issued_start", &self.date_issued_start),
            ("date_issued_end", &self.date_issued_end),
        )?;
        push_between(
            &mut clauses,
            "lastModified",
            ("last_modified_start", &self.last_modified_start),
            ("last_modified_end", &self.last_modified_end),
        )?;

        let full_query = if clauses.is_empty() {
            query.to_string()
        } else {
            format!("({query}) AND {}", clauses.join(" AND "))
        };

        Ok(search_request(&full_query, page_size, offset_mark, sort_field, order))
    }
}

/// Adds `(field:a OR field:b ...)` for the non-blank values.
fn push_any(clauses: &mut Vec<String>, field: &str, values: impl Iterator<Item = String>) {
    let terms: Vec<_> = values
        .filter(|v| !v.is_empty() && v != "\"\"")
        .map(|v| format!("{field}:{v}"))
        .collect();
    if !terms.is_empty() {
        clauses.push(format!("({})", terms.join(" OR ")));
    }
}

/// Adds `field:[start TO end]`, with `*` for an open side.
fn push_between(
    clauses: &mut Vec<String>,
    field: &str,
    (start_name, start): (&'static str, &str),
    (end_name, end): (&'static str, &str),
) -> Result<(), ParamError> {
    let start = params::optional_date(start_name, start)?;
    let end = params::optional_date(end_name, end)?;
    if start.is_none() && end.is_none() {
        return Ok(());
    }
    if let (Some(s), Some(e)) = (start, end) {
        params::date_range(s, e)?;
    }
    let bound = |d: Option<chrono::NaiveDate>| d.map_or_else(|| "*".to_string(), |d| d.to_string());
    clauses.push(format!("{field}:[{} TO {}]", bound(start), bound(end)));
    Ok(())
}

/// Runs a Lucene query with list filters.
pub async fn advanced_search(
    ctx: &ToolContext,
    params: AdvancedSearchParams,
    cancel: &CancellationToken,
) -> ToolResult {
    let spec = params.to_request()?;
    tracing::info!(query = %params.query, "Running advanced search");

    let page = run_search(ctx, &spec, cancel).await?;
    tracing::info!(
        count = page.count_returned,
        total = page.total_count,
        "Advanced search complete"
    );
    Ok(page_json(page))
}

pub(crate) fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "search_search_packages".to_string(),
            description: Some(
                "Full-text search across GovInfo documents, most relevant first. Optional \
                 filters narrow by collection, Congress, document class, title and \
                 publish date."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search query text"},
                    "collection": {
                        "type": "string",
                        "description": "Filter by collection code (e.g., 'BILLS', 'PLAW', 'CFR')"
                    },
                    "congress": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 200,
                        "description": "Filter by Congress number"
                    },
                    "doc_class": {"type": "string", "description": "Filter by document class"},
                    "title": {"type": "string", "description": "Filter by title phrase"},
                    "start_date": {
                        "type": "string",
                        "description": "Published on or after this date (YYYY-MM-DD)"
                    },
                    "end_date": {
                        "type": "string",
                        "description": "Published on or before this date (YYYY-MM-DD)"
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
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "search_advanced_search".to_string(),
            description: Some(
                "Search with Lucene syntax (AND, OR, NOT, wildcards, \"exact phrases\", \
                 field:value) plus list filters. Values within a list are OR-ed; \
                 filters are AND-ed with the query."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query with Lucene syntax support"
                    },
                    "collections": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Collection codes to search within"
                    },
                    "congress": {
                        "type": "array",
                        "items": {"type": "integer", "minimum": 1, "maximum": 200},
                        "description": "Congress numbers to filter by"
                    },
                    "doc_class": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Document classes to filter by"
                    },
                    "committees": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Committees to filter by"
                    },
                    "date_issued_start": {"type": "string", "description": "YYYY-MM-DD"},
                    "date_issued_end": {"type": "string", "description": "YYYY-MM-DD"},
                    "last_modified_start": {"type": "string", "description": "YYYY-MM-DD"},
                    "last_modified_end": {"type": "string", "description": "YYYY-MM-DD"},
                    "sort_by": {
                        "type": "string",
                        "enum": SORT_FIELDS,
                        "description": "Sort field (default: relevance)"
                    },
                    "sort_order": {
                        "type": "string",
                        "enum": ["asc", "desc"],
                        "description": "Sort order (default: desc)"
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
                "required": ["query"]
            }),
        },
    ]
}
