//! GovInfo tools exposed over MCP.
//!
//! Each tool deserialises its arguments into a parameter struct, validates
//! it, builds a [`RequestSpec`](crate::govinfo::RequestSpec) and hands it to
//! the request core. Results are JSON values; failures are [`ToolError`]s.
//!
//! | Prefix | Upstream |
//! |---|---|
//! | `collections_` | `/collections` |
//! | `packages_` | `/collections/{code}/...`, `/packages/{id}/...` |
//! | `published_` | `/published/...` |
//! | `related_` | `/related/...` |
//! | `search_` | `/search` |
//! | `statutes_` | `/search`, `/packages/{id}/...` (statute collections only) |

pub mod collections;
pub mod packages;
pub mod params;
pub mod published;
pub mod related;
pub mod search;
pub mod statutes;
pub mod status;

use std::time::Instant;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::govinfo::{ApiError, HttpExecutor, Page, PartitionedPage};
use crate::mcp::server::{ToolCallResult, ToolDefinition};

/// Shared state for tool calls.
#[derive(Debug)]
pub struct ToolContext {
    /// Request executor (owns the shared rate limiter).
    pub executor: HttpExecutor,
    /// Longest date span requested from upstream in one call.
    pub max_range_days: u32,
    /// When the server started.
    pub started: Instant,
}

impl ToolContext {
    /// Creates a tool context.
    #[must_use]
    pub fn new(executor: HttpExecutor, max_range_days: u32) -> Self {
        Self {
            executor,
            max_range_days,
            started: Instant::now(),
        }
    }
}

/// Invalid tool arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    /// Arguments could not be deserialised.
    #[error("invalid arguments: {0}")]
    Malformed(String),

    /// A parameter failed validation.
    #[error("invalid parameter '{name}': {message}")]
    Invalid {
        /// Parameter name.
        name: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

impl ParamError {
    /// Creates an `Invalid` error.
    #[must_use]
    pub fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            name,
            message: message.into(),
        }
    }
}

/// A failed tool call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// The caller supplied bad arguments.
    #[error(transparent)]
    Params(#[from] ParamError),

    /// The request core failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ToolError {
    /// Renders this error as the JSON body of a failed tool call.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Params(e) => json!({
                "status": "error",
                "kind": "invalid_params",
                "retriable": false,
                "message": e.to_string(),
            }),
            Self::Api(e) => json!({
                "status": "error",
                "kind": e.kind,
                "retriable": e.retriable,
                "status_code": e.status_code,
                "message": e.message,
            }),
        }
    }
}

/// Result of a tool function.
pub type ToolResult = Result<Value, ToolError>;

/// Deserialises tool arguments. A missing or `null` argument object is
/// treated as `{}`.
///
/// # Errors
///
/// Returns `ParamError::Malformed` if the arguments do not match `T`.
pub fn parse_args<T: DeserializeOwned>(arguments: &Value) -> Result<T, ParamError> {
    let arguments = if arguments.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        arguments.clone()
    };
    serde_json::from_value(arguments).map_err(|e| ParamError::Malformed(e.to_string()))
}

/// Renders a listing page.
#[must_use]
pub fn page_json(page: Page) -> Value {
    json!({
        "status": "success",
        "count_returned": page.count_returned,
        "total_count": page.total_count,
        "next_cursor": page.next_cursor,
        "items": page.items,
    })
}

/// Renders a partitioned date-range listing.
#[must_use]
pub fn partitioned_json(page: PartitionedPage) -> Value {
    json!({
        "status": "success",
        "count_returned": page.count_returned,
        "exhausted": page.is_exhausted(),
        "partitions": page.partitions,
        "items": page.items,
    })
}

/// Returns every tool definition.
#[must_use]
pub fn definitions() -> Vec<ToolDefinition> {
    let mut tools = status::definitions();
    tools.extend(collections::definitions());
    tools.extend(packages::definitions());
    tools.extend(published::definitions());
    tools.extend(related::definitions());
    tools.extend(search::definitions());
    tools.extend(statutes::definitions());
    tools
}

/// Runs the named tool.
///
/// Returns `None` if no tool has that name.
pub async fn dispatch(
    ctx: &ToolContext,
    name: &str,
    arguments: &Value,
    cancel: &CancellationToken,
) -> Option<ToolResult> {
    let result = match name {
        "status" => status::status(ctx, cancel).await,
        "collections_get_collections" => {
            run(arguments, |p| collections::get_collections(ctx, p, cancel)).await
        }
        "packages_get_packages_by_collection" => {
            run(arguments, |p| packages::get_packages_by_collection(ctx, p, cancel)).await
        }
        "packages_get_package_summary" => {
            run(arguments, |p| packages::get_package_summary(ctx, p, cancel)).await
        }
        "packages_get_package_content" => {
            run(arguments, |p| packages::get_package_content(ctx, p, cancel)).await
        }
        "published_get_published_packages" => {
            run(arguments, |p| published::get_published_packages(ctx, p, cancel)).await
        }
        "published_get_published_range" => {
            run(arguments, |p| published::get_published_range(ctx, p, cancel)).await
        }
        "related_get_related_packages" => {
            run(arguments, |p| related::get_related_packages(ctx, p, cancel)).await
        }
        "related_get_granule_related" => {
            run(arguments, |p| related::get_granule_related(ctx, p, cancel)).await
        }
        "search_search_packages" => {
            run(arguments, |p| search::search_packages(ctx, p, cancel)).await
        }
        "search_advanced_search" => {
            run(arguments, |p| search::advanced_search(ctx, p, cancel)).await
        }
        "statutes_search_statutes" => {
            run(arguments, |p| statutes::search_statutes(ctx, p, cancel)).await
        }
        "statutes_get_uscode_title" => {
            run(arguments, |p| statutes::get_uscode_title(ctx, p, cancel)).await
        }
        "statutes_get_public_laws_by_congress" => {
            run(arguments, |p| statutes::get_public_laws_by_congress(ctx, p, cancel)).await
        }
        "statutes_get_statutes_at_large" => {
            run(arguments, |p| statutes::get_statutes_at_large(ctx, p, cancel)).await
        }
        "statutes_get_statute_content" => {
            run(arguments, |p| statutes::get_statute_content(ctx, p, cancel)).await
        }
        "statutes_list_statute_collections" => Ok(statutes::list_statute_collections()),
        _ => return None,
    };
    Some(result)
}

/// Parses arguments into `P` and runs `tool` with them.
async fn run<P, F, Fut>(arguments: &Value, tool: F) -> ToolResult
where
    P: DeserializeOwned,
    F: FnOnce(P) -> Fut,
    Fut: std::future::Future<Output = ToolResult>,
{
    let params = parse_args(arguments)?;
    tool(params).await
}

/// Converts a tool outcome into an MCP tool result.
#[must_use]
pub fn into_call_result(name: &str, result: ToolResult) -> ToolCallResult {
    match result {
        Ok(value) => ToolCallResult::text(to_pretty(&value)),
        Err(error) => {
            tracing::warn!(tool = name, error = %error, "Tool call failed");
            ToolCallResult::error(to_pretty(&error.to_json()))
        }
    }
}

fn to_pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::govinfo::ErrorKind;

    #[test]
    fn null_arguments_are_empty_object() {
        #[derive(serde::Deserialize)]
        struct P {
            #[serde(default)]
            x: Option<u32>,
        }
        let p: P = parse_args(&Value::Null).unwrap();
        assert!(p.x.is_none());
    }

    #[test]
    fn malformed_arguments() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct P {
            x: u32,
        }
        let err = parse_args::<P>(&json!({"x": "nope"})).unwrap_err();
        assert!(matches!(err, ParamError::Malformed(_)));
    }

    #[test]
    fn api_error_json() {
        let error = ToolError::from(ApiError::from_status(404, "not found"));
        let value = error.to_json();
        assert_eq!(value["kind"], "client_error");
        assert_eq!(value["retriable"], false);
        assert_eq!(value["status_code"], 404);
    }

    #[test]
    fn param_error_json() {
        let error = ToolError::from(ParamError::invalid("page_size", "too big"));
        let value = error.to_json();
        assert_eq!(value["kind"], "invalid_params");
        assert!(value["message"].as_str().unwrap().contains("page_size"));
    }

    #[test]
    fn error_call_result_is_flagged() {
        let result = into_call_result(
            "t",
            Err(ApiError::new(ErrorKind::Cancelled, "request cancelled").into()),
        );
        assert!(result.is_error);
    }

    #[test]
    fn tool_names_are_unique() {
        let tools = definitions();
        let mut names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(total, 17);
    }
}
