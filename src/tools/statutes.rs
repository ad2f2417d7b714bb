//! US statutes: the United States Code, Statutes at Large, public and
//! private laws, and statute compilations.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::govinfo::normalize::parse_object;
use crate::govinfo::request::encode_segment;
use crate::govinfo::{ContentFormat, RequestSpec};
use crate::mcp::server::ToolDefinition;
use crate::tools::params::{self, default_offset_mark, default_page_size};
use crate::tools::search::{run_search, search_request, SortOrder};
use crate::tools::{page_json, ParamError, ToolContext, ToolError, ToolResult};

/// A statute-related collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatuteCollection {
    pub code: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const STATUTE_COLLECTIONS: [StatuteCollection; 4] = [
    StatuteCollection {
        code: "USCODE",
        name: "United States Code",
        description: "The United States Code (USC) is the official codification of the \
                      general and permanent laws of the United States. It is organized into \
                      54 titles covering broad subject areas.",
    },
    StatuteCollection {
        code: "STATUTE",
        name: "Statutes at Large",
        description: "The Statutes at Large is the official record of laws enacted by \
                      Congress. It contains the text of public and private laws, joint \
                      resolutions, and concurrent resolutions.",
    },
    StatuteCollection {
        code: "PLAW",
        name: "Public and Private Laws",
        description: "Public and Private Laws are the individual laws enacted by Congress \
                      before they are codified into the United States Code. Public laws \
                      affect the general public, while private laws affect specific \
                      individuals or entities.",
    },
    StatuteCollection {
        code: "COMPS",
        name: "Statutes Compilations",
        description: "Statutes Compilations contain various compilations and collections of \
                      statutes, including subject-specific compilations and historical \
                      collections.",
    },
];

fn is_statute_collection(code: &str) -> bool {
    STATUTE_COLLECTIONS.iter().any(|c| c.code == code)
}

fn statute_codes() -> Vec<&'static str> {
    STATUTE_COLLECTIONS.iter().map(|c| c.code).collect()
}

/// Appends ` AND publishdate:[...]` clauses for optional date bounds.
fn push_publish_dates(query: &mut String, start: &str, end: &str) -> Result<(), ParamError> {
    if let Some(start) = params::optional_date("start_date", start)? {
        query.push_str(&format!(" AND publishdate:[{start} TO *]"));
    }
    if let Some(end) = params::optional_date("end_date", end)? {
        query.push_str(&format!(" AND publishdate:[* TO {end}]"));
    }
    Ok(())
}

/// Arguments for `statutes_search_statutes`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatuteSearchParams {
    /// Search text.
    pub query: String,
    /// One of the statute collections; blank searches all of them.
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub congress: Option<u32>,
    /// USC title number.
    #[serde(default)]
    pub title_number: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_offset_mark")]
    pub offset_mark: String,
}

impl StatuteSearchParams {
    /// Validates the parameters and builds the request.
    ///
    /// Returns the request and the collection restriction, if one was given.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter is missing, malformed or out of range,
    /// or if the collection is not a statute collection.
    pub fn to_request(&self) -> Result<(RequestSpec, Option<String>), ParamError> {
        let text = params::required("query", &self.query)?;
        let page_size = params::page_size(self.page_size)?;
        let offset_mark = params::offset_mark(&self.offset_mark)?;

        let collection = params::optional(&self.collection).map(str::to_ascii_uppercase);
        let mut query = match &collection {
            Some(code) if is_statute_collection(code) => format!("collection:{code} AND ({text})"),
            Some(code) => {
                return Err(ParamError::invalid(
                    "collection",
                    format!(
                        "'{code}' must be one of: {}",
                        statute_codes().join(", ")
                    ),
                ))
            }
            None => {
                let any = statute_codes()
                    .iter()
                    .map(|c| format!("collection:{c}"))
                    .collect::<Vec<_>>()
                    .join(" OR ");
                format!("({any}) AND ({text})")
            }
        };

        if let Some(congress) = self.congress {
            params::congress("congress", congress)?;
            query.push_str(&format!(" AND congress:{congress}"));
        }
        if let Some(title) = params::optional(&self.title_number) {
            query.push_str(&format!(" AND title:{title}"));
        }
        if let Some(section) = params::optional(&self.section) {
            query.push_str(&format!(" AND section:{section}"));
        }
        push_publish_dates(&mut query, &self.start_date, &self.end_date)?;

        Ok((
            search_request(&query, page_size, offset_mark, "score", SortOrder::Desc),
            collection,
        ))
    }
}

/// Searches the statute collections.
///
/// Without a collection restriction, results from other collections are
/// dropped.
pub async fn search_statutes(
    ctx: &ToolContext,
    params: StatuteSearchParams,
    cancel: &CancellationToken,
) -> ToolResult {
    let (spec, collection) = params.to_request()?;
    tracing::info!(query = %params.query, "Searching statutes");

    let mut page = run_search(ctx, &spec, cancel).await?;
    if collection.is_none() {
        page.items.retain(|item| {
            item.get("collectionCode")
                .and_then(Value::as_str)
                .is_some_and(is_statute_collection)
        });
        page.count_returned = page.items.len();
    }

    tracing::info!(count = page.count_returned, "Found statute results");
    Ok(page_json(page))
}

/// Arguments for `statutes_get_uscode_title`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UscodeTitleParams {
    /// Title number, e.g. `42`.
    pub title_number: String,
    /// Edition year; blank for all editions.
    #[serde(default)]
    pub edition: String,
    #[serde(default)]
    pub chapter: String,
    #[serde(default)]
    pub section: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_offset_mark")]
    pub offset_mark: String,
}

impl UscodeTitleParams {
    /// Validates the parameters and builds the request.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter is missing or out of range.
    pub fn to_request(&self) -> Result<RequestSpec, ParamError> {
        let title = params::required("title_number", &self.title_number)?;
        let page_size = params::page_size(self.page_size)?;
        let offset_mark = params::offset_mark(&self.offset_mark)?;

        let mut query = format!("collection:USCODE AND title:{title}");
        if let Some(edition) = params::optional(&self.edition) {
            query.push_str(&format!(" AND publishdate:{edition}"));
        }
        if let Some(chapter) = params::optional(&self.chapter) {
            query.push_str(&format!(" AND chapter:{chapter}"));
        }
        if let Some(section) = params::optional(&self.section) {
            query.push_str(&format!(" AND section:{section}"));
        }

        Ok(search_request(&query, page_size, offset_mark, "title", SortOrder::Asc))
    }
}

/// Finds sections, chapters and subchapters of one USC title.
pub async fn get_uscode_title(
    ctx: &ToolContext,
    params: UscodeTitleParams,
    cancel: &CancellationToken,
) -> ToolResult {
    let spec = params.to_request()?;
    tracing::info!(title = %params.title_number, "Searching USC title");

    let page = run_search(ctx, &spec, cancel).await?;
    Ok(page_json(page))
}

/// Arguments for `statutes_get_public_laws_by_congress`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CongressLawsParams {
    pub congress: u32,
    /// `public`, `private`, or blank for both.
    #[serde(default)]
    pub law_type: String,
    #[serde(default)]
    pub law_number: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_offset_mark")]
    pub offset_mark: String,
}

impl CongressLawsParams {
    /// Validates the parameters and builds the request.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter is malformed or out of range, or if
    /// `law_type` is neither `public` nor `private`.
    pub fn to_request(&self) -> Result<RequestSpec, ParamError> {
        let congress = params::congress("congress", self.congress)?;
        let page_size = params::page_size(self.page_size)?;
        let offset_mark = params::offset_mark(&self.offset_mark)?;

        let mut query = format!("collection:PLAW AND congress:{congress}");
        if let Some(law_type) = params::optional(&self.law_type) {
            let kind = law_type.to_ascii_lowercase();
            if kind != "public" && kind != "private" {
                return Err(ParamError::invalid(
                    "law_type",
                    format!("'{law_type}' must be 'public' or 'private'"),
                ));
            }
            query.push_str(&format!(" AND (docClass:{kind} OR title:{kind})"));
        }
        if let Some(number) = params::optional(&self.law_number) {
            query.push_str(&format!(" AND {number}"));
        }
        push_publish_dates(&mut query, &self.start_date, &self.end_date)?;

        Ok(search_request(
            &query,
            page_size,
            offset_mark,
            "publishdate",
            SortOrder::Desc,
        ))
    }
}

/// Finds laws enacted by one Congress, newest first.
pub async fn get_public_laws_by_congress(
    ctx: &ToolContext,
    params: CongressLawsParams,
    cancel: &CancellationToken,
) -> ToolResult {
    let spec = params.to_request()?;
    tracing::info!(congress = params.congress, "Searching laws by Congress");

    let page = run_search(ctx, &spec, cancel).await?;
    Ok(page_json(page))
}

/// Arguments for `statutes_get_statutes_at_large`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatutesAtLargeParams {
    pub volume: String,
    #[serde(default)]
    pub page: String,
    #[serde(default)]
    pub congress: Option<u32>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_offset_mark")]
    pub offset_mark: String,
}

impl StatutesAtLargeParams {
    /// Validates the parameters and builds the request.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter is missing or out of range.
    pub fn to_request(&self) -> Result<RequestSpec, ParamError> {
        let volume = params::required("volume", &self.volume)?;
        let page_size = params::page_size(self.page_size)?;
        let offset_mark = params::offset_mark(&self.offset_mark)?;

        let mut query = format!("collection:STATUTE AND {volume}");
        if let Some(page) = params::optional(&self.page) {
            query.push_str(&format!(" AND {page}"));
        }
        if let Some(congress) = self.congress {
            params::congress("congress", congress)?;
            query.push_str(&format!(" AND congress:{congress}"));
        }

        Ok(search_request(&query, page_size, offset_mark, "title", SortOrder::Asc))
    }
}

/// Searches one volume of the Statutes at Large.
pub async fn get_statutes_at_large(
    ctx: &ToolContext,
    params: StatutesAtLargeParams,
    cancel: &CancellationToken,
) -> ToolResult {
    let spec = params.to_request()?;
    tracing::info!(volume = %params.volume, "Searching Statutes at Large");

    let page = run_search(ctx, &spec, cancel).await?;
    Ok(page_json(page))
}

/// What `statutes_get_statute_content` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatuteView {
    /// The summary record alone.
    Summary,
    /// The summary plus the download link for a format.
    Link(ContentFormat),
}

impl StatuteView {
    const LINK_FORMATS: [ContentFormat; 3] =
        [ContentFormat::Xml, ContentFormat::Pdf, ContentFormat::Text];

    fn parse(value: &str) -> Result<Self, ToolError> {
        if value.trim().eq_ignore_ascii_case("summary") {
            return Ok(Self::Summary);
        }
        Ok(Self::Link(ContentFormat::negotiate(value, &Self::LINK_FORMATS)?))
    }

    const fn link_key(format: ContentFormat) -> &'static str {
        match format {
            ContentFormat::Xml => "xmlLink",
            ContentFormat::Pdf => "pdfLink",
            ContentFormat::Text => "txtLink",
            ContentFormat::Html => "htmLink",
        }
    }
}

fn default_statute_view() -> String {
    "summary".to_string()
}

/// Arguments for `statutes_get_statute_content`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatuteContentParams {
    pub package_id: String,
    /// `summary` (default), `xml`, `pdf` or `text`.
    #[serde(default = "default_statute_view")]
    pub content_type: String,
    /// Granule within the package, e.g. one section.
    #[serde(default)]
    pub granule_id: String,
}

impl StatuteContentParams {
    /// Validates the parameters and builds the summary request.
    ///
    /// # Errors
    ///
    /// Returns an error if the package ID is blank or the content type is
    /// not supported.
    pub fn to_request(&self) -> Result<(StatuteView, RequestSpec), ToolError> {
        let package = encode_segment(params::required("package_id", &self.package_id)?);
        let view = StatuteView::parse(&self.content_type)?;
        let path = match params::optional(&self.granule_id) {
            Some(granule) => format!(
                "/packages/{package}/granules/{}/summary",
                encode_segment(granule)
            ),
            None => format!("/packages/{package}/summary"),
        };
        Ok((view, RequestSpec::get(path)))
    }
}

/// Fetches a statute summary, optionally pointing at a download link.
pub async fn get_statute_content(
    ctx: &ToolContext,
    params: StatuteContentParams,
    cancel: &CancellationToken,
) -> ToolResult {
    let (view, spec) = params.to_request()?;
    tracing::info!(package_id = %params.package_id, "Fetching statute content");

    let raw = ctx.executor.execute(&spec, cancel).await?;
    let mut record = parse_object(&raw)?;

    if let StatuteView::Link(format) = view {
        let link = record
            .get("download")
            .and_then(|d| d.get(StatuteView::link_key(format)))
            .cloned();
        match link {
            Some(url) => {
                record.insert("requested_content_url".to_string(), url);
                record.insert("content_type".to_string(), Value::String(format.to_string()));
            }
            None => {
                tracing::info!(format = %format, "No download link for requested format");
            }
        }
    }

    Ok(Value::Object(record))
}

/// Lists the statute collections.
#[must_use]
pub fn list_statute_collections() -> Value {
    json!({
        "statute_collections": STATUTE_COLLECTIONS,
        "total_collections": STATUTE_COLLECTIONS.len(),
    })
}

pub(crate) fn definitions() -> Vec<ToolDefinition> {
    let page_size = json!({
        "type": "integer",
        "minimum": 1,
        "maximum": 100,
        "description": "Number of results per page (default: 50)"
    });
    let offset_mark = json!({
        "type": "string",
        "description": "Pagination cursor; '*' for the first page (default)"
    });
    let congress = json!({
        "type": "integer",
        "minimum": 1,
        "maximum": 200,
        "description": "Congress number"
    });

    vec![
        ToolDefinition {
            name: "statutes_search_statutes".to_string(),
            description: Some(
                "Search US statutes in the United States Code (USCODE), Statutes at Large \
                 (STATUTE), Public and Private Laws (PLAW) and Statutes Compilations \
                 (COMPS). Leave collection empty to search all four."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search query text"},
                    "collection": {
                        "type": "string",
                        "enum": statute_codes(),
                        "description": "Statute collection to search"
                    },
                    "congress": congress,
                    "title_number": {"type": "string", "description": "USC title number"},
                    "section": {"type": "string", "description": "Section number"},
                    "start_date": {"type": "string", "description": "YYYY-MM-DD"},
                    "end_date": {"type": "string", "description": "YYYY-MM-DD"},
                    "page_size": page_size,
                    "offset_mark": offset_mark
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "statutes_get_uscode_title".to_string(),
            description: Some(
                "Find sections, chapters and subchapters of a United States Code title."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "title_number": {
                        "type": "string",
                        "description": "USC title number (e.g., '42')"
                    },
                    "edition": {
                        "type": "string",
                        "description": "Edition year (e.g., '2022'); empty for all"
                    },
                    "chapter": {"type": "string", "description": "Chapter number"},
                    "section": {"type": "string", "description": "Section number"},
                    "page_size": page_size,
                    "offset_mark": offset_mark
                },
                "required": ["title_number"]
            }),
        },
        ToolDefinition {
            name: "statutes_get_public_laws_by_congress".to_string(),
            description: Some(
                "Find public and private laws enacted by a Congress, newest first."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "congress": congress,
                    "law_type": {
                        "type": "string",
                        "enum": ["public", "private"],
                        "description": "Law type; omit for both"
                    },
                    "law_number": {"type": "string", "description": "Law number"},
                    "start_date": {"type": "string", "description": "YYYY-MM-DD"},
                    "end_date": {"type": "string", "description": "YYYY-MM-DD"},
                    "page_size": page_size,
                    "offset_mark": offset_mark
                },
                "required": ["congress"]
            }),
        },
        ToolDefinition {
            name: "statutes_get_statutes_at_large".to_string(),
            description: Some("Search a volume of the Statutes at Large.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "volume": {"type": "string", "description": "Volume number"},
                    "page": {"type": "string", "description": "Page number"},
                    "congress": congress,
                    "page_size": page_size,
                    "offset_mark": offset_mark
                },
                "required": ["volume"]
            }),
        },
        ToolDefinition {
            name: "statutes_get_statute_content".to_string(),
            description: Some(
                "Get the summary of a statute package or granule. For 'xml', 'pdf' or \
                 'text' the result also carries requested_content_url, the download link \
                 for that format, when one exists."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "package_id": {
                        "type": "string",
                        "description": "Package ID (e.g., 'PLAW-117publ58')"
                    },
                    "content_type": {
                        "type": "string",
                        "enum": ["summary", "xml", "pdf", "text"],
                        "description": "Content type (default: summary)"
                    },
                    "granule_id": {
                        "type": "string",
                        "description": "Granule ID for a specific section"
                    }
                },
                "required": ["package_id"]
            }),
        },
        ToolDefinition {
            name: "statutes_list_statute_collections".to_string(),
            description: Some(
                "List the statute collections available for search.".to_string(),
            ),
            input_schema: json!({"type": "object", "properties": {}}),
        },
    ]
}
