//! Collection listing.

use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::govinfo::normalize::parse_page;
use crate::govinfo::{ListingShape, RequestSpec};
use crate::mcp::server::ToolDefinition;
use crate::tools::params::{self, default_offset_mark, default_page_size};
use crate::tools::{page_json, ParamError, ToolContext, ToolResult};

/// Arguments for `collections_get_collections`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionsParams {
    /// Results per page (1-100).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Continuation cursor from a previous page.
    #[serde(default = "default_offset_mark")]
    pub offset_mark: String,
}

impl CollectionsParams {
    /// Validates the parameters and builds the request.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter is out of range.
    pub fn to_request(&self) -> Result<RequestSpec, ParamError> {
        Ok(RequestSpec::get("/collections")
            .query("pageSize", params::page_size(self.page_size)?)
            .query("offsetMark", params::offset_mark(&self.offset_mark)?))
    }
}

/// Lists the collections available in GovInfo.
pub async fn get_collections(
    ctx: &ToolContext,
    params: CollectionsParams,
    cancel: &CancellationToken,
) -> ToolResult {
    let spec = params.to_request()?;
    tracing::info!("Fetching GovInfo collections");

    let raw = ctx.executor.execute(&spec, cancel).await?;
    let page = parse_page(&raw, ListingShape::COLLECTIONS)?;

    tracing::info!(count = page.count_returned, "Found collections");
    Ok(page_json(page))
}

pub(crate) fn definitions() -> Vec<ToolDefinition> {
    vec![ToolDefinition {
        name: "collections_get_collections".to_string(),
        description: Some(
            "Get a list of collections available in GovInfo, including their codes, \
             names and package counts. Pass next_cursor from a previous result as \
             offset_mark to fetch the next page."
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
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
            }
        }),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::parse_args;

    #[test]
    fn defaults() {
        let params: CollectionsParams = parse_args(&json!({})).unwrap();
        let spec = params.to_request().unwrap();
        assert_eq!(spec.path, "/collections");
        assert_eq!(spec.query["pageSize"], "50");
        assert_eq!(spec.query["offsetMark"], "*");
    }

    #[test]
    fn cursor_is_passed_verbatim() {
        let params: CollectionsParams =
            parse_args(&json!({"offset_mark": "AoJw+q8=", "page_size": 5})).unwrap();
        let spec = params.to_request().unwrap();
        assert_eq!(spec.query["offsetMark"], "AoJw+q8=");
        assert_eq!(spec.query["pageSize"], "5");
    }

    #[test]
    fn rejects_unknown_arguments() {
        assert!(parse_args::<CollectionsParams>(&json!({"pagesize": 5})).is_err());
    }
}
