//! Integration tests for MCP protocol handling.
//!
//! These tests verify the MCP server's JSON-RPC 2.0 protocol implementation,
//! including request/response handling, error responses, lifecycle management
//! and cancellation of in-flight tool calls. The server is driven through
//! in-memory pipes; upstream calls go to a mock GovInfo API.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::sync::oneshot;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use govinfo_mcp::govinfo::{ExecutorOptions, HttpExecutor, RateLimiter, RetryPolicy};
use govinfo_mcp::mcp::protocol::{parse_message, IncomingMessage, RequestId};
use govinfo_mcp::mcp::{McpServer, Transport};
use govinfo_mcp::tools::ToolContext;

// =============================================================================
// Protocol Parsing Tests
// =============================================================================

#[test]
fn parse_initialize_request() {
    let json = r#"{
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {"name": "test-client", "version": "1.0.0"}
        }
    }"#;

    let Ok(IncomingMessage::Request(req)) = parse_message(json) else {
        panic!("Expected Request");
    };
    assert_eq!(req.method, "initialize");
    assert_eq!(req.id, RequestId::Number(1));
}

#[test]
fn parse_cancelled_notification() {
    let json = r#"{"jsonrpc":"2.0","method":"notifications/cancelled","params":{"requestId":"abc"}}"#;

    let Ok(IncomingMessage::Notification(notif)) = parse_message(json) else {
        panic!("Expected Notification");
    };
    assert_eq!(notif.method, "notifications/cancelled");
}

#[test]
fn parse_invalid_messages() {
    assert!(parse_message("{ not json").is_err());
    assert!(parse_message(r#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#).is_err());
    assert!(parse_message(r#"{"jsonrpc":"2.0","id":1}"#).is_err());
}

// =============================================================================
// Session harness
// =============================================================================

/// The client end of a session.
struct Client {
    tx: DuplexStream,
    rx: Lines<BufReader<DuplexStream>>,
}

impl Client {
    async fn send(&mut self, message: Value) {
        let mut line = message.to_string();
        line.push('\n');
        self.tx.write_all(line.as_bytes()).await.unwrap();
    }

    async fn send_raw(&mut self, line: &str) {
        self.tx.write_all(line.as_bytes()).await.unwrap();
        self.tx.write_all(b"\n").await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let line = tokio::time::timeout(Duration::from_secs(10), self.rx.next_line())
            .await
            .expect("timed out waiting for server")
            .unwrap()
            .expect("server closed output");
        serde_json::from_str(&line).unwrap()
    }

    async fn request(&mut self, id: i64, method: &str, params: Value) -> Value {
        self.send(json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}))
            .await;
        self.recv().await
    }

    async fn initialise(&mut self) {
        let response = self
            .request(
                1,
                "initialize",
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {"name": "test-client", "version": "1.0.0"}
                }),
            )
            .await;
        assert!(response.get("result").is_some(), "{response}");
        self.send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await;
    }
}

fn context(base_url: String) -> ToolContext {
    let options = ExecutorOptions {
        base_url,
        retry: RetryPolicy {
            max_attempts: 1,
            backoff_base: Duration::from_millis(10),
            jitter: false,
        },
        ..ExecutorOptions::default()
    };
    let limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(60)));
    ToolContext::new(HttpExecutor::new(options, "test-key", limiter).unwrap(), 365)
}

/// Runs `script` against a server until the script finishes and closes its
/// end of the input, or `shutdown` resolves.
async fn session<S, Fut>(
    ctx: ToolContext,
    shutdown: impl Future<Output = io::Result<()>>,
    script: S,
) -> io::Result<()>
where
    S: FnOnce(Client) -> Fut,
    Fut: Future<Output = ()>,
{
    let (client_tx, server_rx) = tokio::io::duplex(64 * 1024);
    let (server_tx, client_rx) = tokio::io::duplex(64 * 1024);

    let mut server = McpServer::with_transport(ctx, Transport::new(server_rx, server_tx));
    let client = Client {
        tx: client_tx,
        rx: BufReader::new(client_rx).lines(),
    };

    let (served, ()) = tokio::join!(server.serve(shutdown), script(client));
    served
}

fn never() -> impl Future<Output = io::Result<()>> {
    std::future::pending()
}

fn tool_text(response: &Value) -> &str {
    response["result"]["content"][0]["text"].as_str().unwrap()
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn initialise_then_list_tools() {
    let result = session(context("http://127.0.0.1:9".into()), never(), |mut client| async move {
        let init = client
            .request(
                1,
                "initialize",
                json!({"protocolVersion": "2024-11-05", "capabilities": {}}),
            )
            .await;
        assert_eq!(init["id"], 1);
        assert_eq!(init["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(init["result"]["serverInfo"]["name"], "govinfo-mcp");
        assert!(init["result"]["capabilities"]["tools"].is_object());

        client
            .send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await;

        let list = client.request(2, "tools/list", json!({})).await;
        let tools = list["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 17);
        assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
    })
    .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn requests_before_initialisation_are_rejected() {
    session(context("http://127.0.0.1:9".into()), never(), |mut client| async move {
        let list = client.request(1, "tools/list", json!({})).await;
        assert_eq!(list["error"]["code"], -32600);

        let call = client
            .request(2, "tools/call", json!({"name": "status", "arguments": {}}))
            .await;
        assert_eq!(call["error"]["code"], -32600);

        // ping works in any state
        let ping = client.request(3, "ping", json!({})).await;
        assert_eq!(ping["result"], json!({}));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn second_initialise_is_rejected() {
    session(context("http://127.0.0.1:9".into()), never(), |mut client| async move {
        client.initialise().await;
        let again = client
            .request(5, "initialize", json!({"protocolVersion": "2024-11-05"}))
            .await;
        assert_eq!(again["error"]["code"], -32600);
        assert_eq!(again["id"], 5);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn protocol_errors() {
    session(context("http://127.0.0.1:9".into()), never(), |mut client| async move {
        client.send_raw("{ not json").await;
        let parse = client.recv().await;
        assert_eq!(parse["error"]["code"], -32700);

        client.initialise().await;

        let unknown = client.request(2, "resources/list", json!({})).await;
        assert_eq!(unknown["error"]["code"], -32601);

        let bad_params = client.request(3, "tools/call", json!({"arguments": {}})).await;
        assert_eq!(bad_params["error"]["code"], -32602);
    })
    .await
    .unwrap();
}

// =============================================================================
// Tool calls
// =============================================================================

#[tokio::test]
async fn unknown_tool_is_an_error_result() {
    session(context("http://127.0.0.1:9".into()), never(), |mut client| async move {
        client.initialise().await;
        let response = client
            .request(2, "tools/call", json!({"name": "nope", "arguments": {}}))
            .await;
        assert_eq!(response["id"], 2);
        assert_eq!(response["result"]["isError"], true);
        assert!(tool_text(&response).contains("Unknown tool: nope"));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn tool_call_reaches_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/packages/BILLS-118hr1enr/summary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "packageId": "BILLS-118hr1enr",
            "title": "Lower Energy Costs Act"
        })))
        .mount(&upstream)
        .await;

    session(context(upstream.uri()), never(), |mut client| async move {
        client.initialise().await;
        let response = client
            .request(
                2,
                "tools/call",
                json!({
                    "name": "packages_get_package_summary",
                    "arguments": {"package_id": "BILLS-118hr1enr"}
                }),
            )
            .await;
        assert!(response["result"].get("isError").is_none());
        let body: Value = serde_json::from_str(tool_text(&response)).unwrap();
        assert_eq!(body["title"], "Lower Energy Costs Act");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn slow_call_does_not_block_ping() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"collections": []}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&upstream)
        .await;

    session(context(upstream.uri()), never(), |mut client| async move {
        client.initialise().await;
        client
            .send(json!({
                "jsonrpc": "2.0",
                "id": 10,
                "method": "tools/call",
                "params": {"name": "collections_get_collections", "arguments": {}}
            }))
            .await;

        // The ping is answered before the slow call completes
        let ping = client.request(11, "ping", json!({})).await;
        assert_eq!(ping["id"], 11);

        let call = client.recv().await;
        assert_eq!(call["id"], 10);
        assert!(call["result"].get("isError").is_none());
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn cancelled_call_still_gets_a_response() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"collections": []}))
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&upstream)
        .await;

    let started = Instant::now();
    session(context(upstream.uri()), never(), |mut client| async move {
        client.initialise().await;
        client
            .send(json!({
                "jsonrpc": "2.0",
                "id": 20,
                "method": "tools/call",
                "params": {"name": "collections_get_collections", "arguments": {}}
            }))
            .await;
        client
            .send(json!({
                "jsonrpc": "2.0",
                "method": "notifications/cancelled",
                "params": {"requestId": 20, "reason": "user aborted"}
            }))
            .await;

        let response = client.recv().await;
        assert_eq!(response["id"], 20);
        assert_eq!(response["result"]["isError"], true);
        assert!(tool_text(&response).contains("cancelled"));
    })
    .await
    .unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn shutdown_cancels_in_flight_calls() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"collections": []}))
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&upstream)
        .await;

    let (trigger, signal) = oneshot::channel::<()>();
    let shutdown = async move {
        let _ = signal.await;
        Ok(())
    };

    let started = Instant::now();
    session(context(upstream.uri()), shutdown, |mut client| async move {
        client.initialise().await;
        client
            .send(json!({
                "jsonrpc": "2.0",
                "id": 30,
                "method": "tools/call",
                "params": {"name": "collections_get_collections", "arguments": {}}
            }))
            .await;
        // Once the ping is answered the call is registered
        client.request(31, "ping", json!({})).await;
        trigger.send(()).unwrap();

        let response = client.recv().await;
        assert_eq!(response["id"], 30);
        assert_eq!(response["result"]["isError"], true);
        assert!(tool_text(&response).contains("cancelled"));
    })
    .await
    .unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
}
