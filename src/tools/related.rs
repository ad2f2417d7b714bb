//! Related-document lookups.

use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::govinfo::normalize::parse_object;
use crate::govinfo::request::encode_segment;
use crate::govinfo::RequestSpec;
use crate::mcp::server::ToolDefinition;
use crate::tools::params;
use crate::tools::{ParamError, ToolContext, ToolResult};

/// Arguments for `related_get_related_packages`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelatedParams {
    /// Package ID, e.g. `BILLS-116hr1-ih`.
    pub package_id: String,
}

impl RelatedParams {
    /// Validates the parameters and builds the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the package ID is blank.
    pub fn to_request(&self) -> Result<RequestSpec, ParamError> {
        let id = params::required("package_id", &self.package_id)?;
        Ok(RequestSpec::get(format!("/related/{}", encode_segment(id))))
    }
}

/// Finds packages related to a package, such as other versions of a bill.
pub async fn get_related_packages(
    ctx: &ToolContext,
    params: RelatedParams,
    cancel: &CancellationToken,
) -> ToolResult {
    let spec = params.to_request()?;
    tracing::info!(package_id = %params.package_id, "Fetching related packages");

    let raw = ctx.executor.execute(&spec, cancel).await?;
    let record = parse_object(&raw)?;

    let related = record
        .get("relatedPackages")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    tracing::info!(count = related, "Found related packages");
    Ok(Value::Object(record))
}

/// Arguments for `related_get_granule_related`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GranuleRelatedParams {
    /// Package containing the granule.
    pub package_id: String,
    /// Granule ID.
    pub granule_id: String,
}

impl GranuleRelatedParams {
    /// Validates the parameters and builds the request.
    ///
    /// The upstream looks granules up by their own ID; the package ID is
    /// checked but not sent.
    ///
    /// # Errors
    ///
    /// Returns an error if either ID is blank.
    pub fn to_request(&self) -> Result<RequestSpec, ParamError> {
        params::required("package_id", &self.package_id)?;
        let granule = params::required("granule_id", &self.granule_id)?;
        Ok(RequestSpec::get(format!("/related/{}", encode_segment(granule))))
    }
}

/// Finds items related to a granule within a package.
pub async fn get_granule_related(
    ctx: &ToolContext,
    params: GranuleRelatedParams,
    cancel: &CancellationToken,
) -> ToolResult {
    let spec = params.to_request()?;
    tracing::info!(
        package_id = %params.package_id,
        granule_id = %params.granule_id,
        "Fetching granule related items"
    );

    let raw = ctx.executor.execute(&spec, cancel).await?;
    Ok(Value::Object(parse_object(&raw)?))
}

pub(crate) fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "related_get_related_packages".to_string(),
            description: Some(
                "Get packages related to a package, such as other versions of a bill, \
                 related congressional reports or associated documents."
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
            name: "related_get_granule_related".to_string(),
            description: Some(
                "Get items related to a granule within a package, such as related \
                 sections, amendments or cross-references."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "package_id": {
                        "type": "string",
                        "description": "Package ID (e.g., 'CFR-2023-title12-vol1')"
                    },
                    "granule_id": {
                        "type": "string",
                        "description": "Granule ID within the package"
                    }
                },
                "required": ["package_id", "granule_id"]
            }),
        },
    ]
}
