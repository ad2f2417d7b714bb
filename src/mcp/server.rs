//! MCP server implementation for the GovInfo tools.
//!
//! This module implements the MCP server lifecycle:
//!
//! 1. **Initialisation**: Capability negotiation and version agreement
//! 2. **Operation**: Handling tool calls and other requests
//! 3. **Shutdown**: Graceful connection termination
//!
//! # Concurrency
//!
//! Each `tools/call` runs as its own task so that slow upstream requests do
//! not block `ping`, `tools/list` or further calls. Every call gets a child
//! of the server's cancellation token: `notifications/cancelled` cancels one
//! call, shutdown cancels them all. Responses are written by the main loop
//! as calls complete, so output is never interleaved.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::{Id as TaskId, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::mcp::protocol::{
    parse_message, CancelledParams, IncomingMessage, JsonRpcError, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, RequestId, MCP_PROTOCOL_VERSION, SERVER_NAME,
};
use crate::mcp::transport::{StdioTransport, Transport};
use crate::tools::{self, ToolContext};

/// How long in-flight calls get to report after shutdown cancels them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for initialize request.
    AwaitingInit,
    /// Initialize received, waiting for initialized notification.
    Initialising,
    /// Ready for normal operation.
    Running,
    /// Shutdown in progress.
    ShuttingDown,
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolCapabilities>,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            tools: Some(ToolCapabilities::default()),
        }
    }
}

/// Tool-specific capabilities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change during the session.
    #[serde(rename = "listChanged", skip_serializing_if = "is_false")]
    pub list_changed: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if requires a predicate fn(&T) -> bool, so we must take &bool here
const fn is_false(b: &bool) -> bool {
    !*b
}

/// Server information for initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by client.
    pub protocol_version: String,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// A tool definition for tools/list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// Parameters for tools/call request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: Value,
}

/// Content item in a tool call response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// Result of a tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Whether the tool call resulted in an error.
    #[serde(skip_serializing_if = "is_false")]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Creates a successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Creates an error text result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }
}

/// The MCP server exposing GovInfo tools.
pub struct McpServer<R = tokio::io::Stdin, W = tokio::io::Stdout> {
    /// Current server state.
    state: ServerState,
    /// The transport layer.
    transport: Transport<R, W>,
    /// Negotiated protocol version (set after initialisation).
    protocol_version: Option<String>,
    /// Shared tool state.
    ctx: Arc<ToolContext>,
    /// Tool calls in progress.
    calls: JoinSet<ToolCallResult>,
    /// Request each call task answers, by task.
    call_ids: HashMap<TaskId, RequestId>,
    /// Cancellation handles of in-flight calls, by request.
    in_flight: HashMap<RequestId, CancellationToken>,
    /// Parent of every call's token.
    shutdown: CancellationToken,
}

impl McpServer {
    /// Creates a server on stdin and stdout.
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self::with_transport(ctx, StdioTransport::stdio())
    }

    /// Runs the MCP server main loop until stdin closes or a termination
    /// signal arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails or signal handlers cannot be
    /// installed.
    pub async fn run(&mut self) -> io::Result<()> {
        self.serve(shutdown_signal()).await
    }
}

/// Resolves when SIGINT or SIGTERM arrives.
#[cfg(unix)]
async fn shutdown_signal() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => tracing::info!("Received SIGINT, initiating graceful shutdown"),
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
    }
    Ok(())
}

/// Resolves when Ctrl+C arrives.
#[cfg(windows)]
async fn shutdown_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
    Ok(())
}

impl<R, W> McpServer<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a server on the given transport.
    #[must_use]
    pub fn with_transport(ctx: ToolContext, transport: Transport<R, W>) -> Self {
        Self {
            state: ServerState::AwaitingInit,
            transport,
            protocol_version: None,
            ctx: Arc::new(ctx),
            calls: JoinSet::new(),
            call_ids: HashMap::new(),
            in_flight: HashMap::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Runs the main loop until the input closes or `shutdown` resolves,
    /// then cancels in-flight calls and reports their results.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails or `shutdown` fails.
    pub async fn serve<F>(&mut self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = io::Result<()>>,
    {
        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                biased;

                signal = &mut shutdown => break signal,

                Some(joined) = self.calls.join_next_with_id() => {
                    if let Err(e) = self.call_joined(joined).await {
                        break Err(e);
                    }
                }

                line_result = self.transport.read_line() => {
                    match self.handle_transport_result(line_result).await {
                        Ok(false) => {}
                        Ok(true) => break Ok(()),
                        Err(e) => break Err(e),
                    }
                }
            }
        };

        self.state = ServerState::ShuttingDown;
        self.drain_calls().await;
        outcome
    }

    /// Cancels every in-flight call and writes whatever results arrive
    /// within the grace period.
    async fn drain_calls(&mut self) {
        self.shutdown.cancel();
        if self.calls.is_empty() {
            return;
        }
        tracing::info!(in_flight = self.calls.len(), "Cancelling in-flight tool calls");

        let drain = async {
            while let Some(joined) = self.calls.join_next_with_id().await {
                if let Err(e) = self.call_joined(joined).await {
                    tracing::debug!(error = %e, "Could not report cancelled call");
                }
            }
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            tracing::warn!("Abandoning tool calls that ignored cancellation");
            self.calls.abort_all();
        }
    }

    /// Handles the result from transport read.
    ///
    /// Returns `true` if the server should shut down.
    async fn handle_transport_result(
        &mut self,
        line_result: io::Result<Option<String>>,
    ) -> io::Result<bool> {
        let Some(line) = line_result? else {
            tracing::info!("Input closed, shutting down");
            return Ok(true);
        };

        if line.trim().is_empty() {
            return Ok(false);
        }

        self.handle_line(&line).await?;

        Ok(self.state == ServerState::ShuttingDown)
    }

    /// Handles a single line of input.
    async fn handle_line(&mut self, line: &str) -> io::Result<()> {
        match parse_message(line) {
            Ok(IncomingMessage::Request(req)) => self.handle_request(req).await,
            Ok(IncomingMessage::Notification(ref notif)) => {
                self.handle_notification(notif);
                Ok(())
            }
            Err(error) => self.transport.write_error(&error).await,
        }
    }

    /// Handles an incoming request.
    ///
    /// `tools/call` is answered later, when its task completes.
    async fn handle_request(&mut self, req: JsonRpcRequest) -> io::Result<()> {
        let response = match req.method.as_str() {
            "initialize" => self.handle_initialize(&req),
            "tools/list" => self.handle_tools_list(&req),
            "tools/call" => match self.start_tool_call(&req) {
                Ok(()) => return Ok(()),
                Err(e) => Err(e),
            },
            "ping" => Ok(Self::handle_ping(&req)),
            _ => Err(JsonRpcError::method_not_found(req.id.clone(), &req.method)),
        };

        match response {
            Ok(resp) => self.transport.write_response(&resp).await,
            Err(error) => self.transport.write_error(&error).await,
        }
    }

    /// Handles an incoming notification.
    fn handle_notification(&mut self, notif: &JsonRpcNotification) {
        match notif.method.as_str() {
            "notifications/initialized" if self.state == ServerState::Initialising => {
                self.state = ServerState::Running;
                tracing::info!("Client initialised");
            }
            "notifications/cancelled" => self.cancel_call(notif.params.as_ref()),
            other => tracing::debug!(method = other, "Ignoring notification"),
        }
    }

    /// Cancels the call named by a `notifications/cancelled` message.
    fn cancel_call(&self, params: Option<&Value>) {
        let Some(params) = params
            .cloned()
            .and_then(|p| serde_json::from_value::<CancelledParams>(p).ok())
        else {
            tracing::debug!("Ignoring malformed cancellation");
            return;
        };

        match self.in_flight.get(&params.request_id) {
            Some(token) => {
                tracing::info!(
                    request_id = %params.request_id,
                    reason = params.reason.as_deref().unwrap_or(""),
                    "Cancelling tool call"
                );
                token.cancel();
            }
            None => {
                tracing::debug!(request_id = %params.request_id, "No in-flight call to cancel");
            }
        }
    }

    /// Handles the initialize request.
    fn handle_initialize(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        if self.state != ServerState::AwaitingInit {
            return Err(JsonRpcError::invalid_request_with(
                req.id.clone(),
                "Server already initialised",
            ));
        }

        let params: InitializeParams = req.parse_params("initialize")?;
        tracing::info!(
            client = params.client_info.as_ref().map_or("unknown", |c| c.name.as_str()),
            requested_version = %params.protocol_version,
            "Initialising"
        );

        let negotiated_version = MCP_PROTOCOL_VERSION.to_string();

        self.protocol_version = Some(negotiated_version.clone());
        self.state = ServerState::Initialising;

        let result = json!({
            "protocolVersion": negotiated_version,
            "capabilities": ServerCapabilities::default(),
            "serverInfo": ServerInfo::default(),
        });

        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Handles the tools/list request.
    fn handle_tools_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        let result = json!({
            "tools": tools::definitions(),
        });

        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Starts a tools/call request in its own task.
    fn start_tool_call(&mut self, req: &JsonRpcRequest) -> Result<(), JsonRpcError> {
        self.require_running(&req.id)?;

        let params: ToolCallParams = req.parse_params("tool call")?;

        if self.in_flight.contains_key(&req.id) {
            return Err(JsonRpcError::invalid_request_with(
                req.id.clone(),
                format!("Request {} is already in progress", req.id),
            ));
        }

        let cancel = self.shutdown.child_token();
        self.in_flight.insert(req.id.clone(), cancel.clone());

        let ctx = Arc::clone(&self.ctx);
        tracing::debug!(request_id = %req.id, tool = %params.name, "Starting tool call");

        let task = self.calls.spawn(async move {
            match tools::dispatch(&ctx, &params.name, &params.arguments, &cancel).await {
                Some(outcome) => tools::into_call_result(&params.name, outcome),
                None => ToolCallResult::error(format!("Unknown tool: {}", params.name)),
            }
        });
        self.call_ids.insert(task.id(), req.id.clone());

        Ok(())
    }

    /// Reports a finished call task, including one that panicked.
    async fn call_joined(
        &mut self,
        joined: Result<(TaskId, ToolCallResult), JoinError>,
    ) -> io::Result<()> {
        let (task, outcome) = match joined {
            Ok((task, result)) => (task, Ok(result)),
            Err(e) => (e.id(), Err(e)),
        };
        let Some(id) = self.call_ids.remove(&task) else {
            return Ok(());
        };

        match outcome {
            Ok(result) => self.finish_call(id, result).await,
            Err(e) => {
                tracing::error!(request_id = %id, error = %e, "Tool call task failed");
                self.in_flight.remove(&id);
                self.transport
                    .write_error(&JsonRpcError::internal_error(
                        id,
                        "Internal error: tool call failed",
                    ))
                    .await
            }
        }
    }

    /// Writes the response for a completed tool call.
    async fn finish_call(&mut self, id: RequestId, result: ToolCallResult) -> io::Result<()> {
        self.in_flight.remove(&id);

        match serde_json::to_value(&result) {
            Ok(value) => {
                self.transport
                    .write_response(&JsonRpcResponse::success(id, value))
                    .await
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialise tool call result");
                self.transport
                    .write_error(&JsonRpcError::internal_error(
                        id,
                        "Internal error: failed to serialise result",
                    ))
                    .await
            }
        }
    }

    /// Handles the ping request.
    fn handle_ping(req: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(req.id.clone(), json!({}))
    }

    /// Ensures the server is in the Running state.
    fn require_running(&self, id: &RequestId) -> Result<(), JsonRpcError> {
        if self.state != ServerState::Running {
            return Err(JsonRpcError::invalid_request_with(
                id.clone(),
                "Server not initialised",
            ));
        }
        Ok(())
    }
}
