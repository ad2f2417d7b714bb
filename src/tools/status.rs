//! Server status and upstream health.

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::govinfo::{ApiError, ErrorKind, RequestSpec};
use crate::mcp::protocol::SERVER_NAME;
use crate::mcp::server::ToolDefinition;
use crate::tools::{ToolContext, ToolResult};

/// Reports server identity, uptime, rate budget and upstream health.
///
/// An unreachable upstream is reported as `degraded`, not as a tool error.
/// Cancellation still fails the call.
pub async fn status(ctx: &ToolContext, cancel: &CancellationToken) -> ToolResult {
    let check = RequestSpec::get("/collections").query("pageSize", 1);
    let health = match ctx.executor.execute(&check, cancel).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind == ErrorKind::Cancelled => return Err(e.into()),
        Err(e) => {
            tracing::warn!(error = %e, "Upstream health check failed");
            Err(e)
        }
    };
    Ok(render(ctx, &health))
}

fn render(ctx: &ToolContext, health: &Result<(), ApiError>) -> Value {
    let limiter = ctx.executor.limiter();
    let mut api = json!({
        "base_url": ctx.executor.base_url(),
        "reachable": health.is_ok(),
    });
    if let Err(e) = health {
        api["error"] = json!({"kind": e.kind, "message": e.message});
    }

    json!({
        "service": SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "status": if health.is_ok() { "healthy" } else { "degraded" },
        "uptime_secs": ctx.started.elapsed().as_secs(),
        "api": api,
        "rate_limit": {
            "used": limiter.used(),
            "limit": limiter.limit(),
        },
    })
}

pub(crate) fn definitions() -> Vec<ToolDefinition> {
    vec![ToolDefinition {
        name: "status".to_string(),
        description: Some(
            "Check server status: version, uptime, request budget and whether the \
             GovInfo API is reachable."
                .to_string(),
        ),
        input_schema: json!({"type": "object", "properties": {}}),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::govinfo::{ExecutorOptions, HttpExecutor, RateLimiter};
    use crate::tools::ToolError;
    use std::sync::Arc;
    use std::time::Duration;

    fn context() -> ToolContext {
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(60)));
        let executor = HttpExecutor::new(ExecutorOptions::default(), "key", limiter).unwrap();
        ToolContext::new(executor, 365)
    }

    #[test]
    fn healthy_status() {
        let ctx = context();
        let value = render(&ctx, &Ok(()));
        assert_eq!(value["status"], "healthy");
        assert_eq!(value["service"], SERVER_NAME);
        assert_eq!(value["rate_limit"]["limit"], 10);
        assert!(value["api"].get("error").is_none());
    }

    #[test]
    fn degraded_status() {
        let ctx = context();
        let value = render(&ctx, &Err(ApiError::new(ErrorKind::Transport, "connection refused")));
        assert_eq!(value["status"], "degraded");
        assert_eq!(value["api"]["reachable"], false);
        assert_eq!(value["api"]["error"]["kind"], "transport");
    }

    #[tokio::test]
    async fn cancelled_status_is_an_error() {
        let ctx = context();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = status(&ctx, &cancel).await;
        let Err(ToolError::Api(e)) = &result else {
            panic!("expected a cancelled error, got {result:?}");
        };
        assert_eq!(e.kind, ErrorKind::Cancelled);
        assert_eq!(ctx.executor.limiter().used(), 0);
    }
}
