//! Tool-level tests against a mock GovInfo API.
//!
//! Each test drives `tools::dispatch` exactly as the MCP server does and
//! checks both the rendered result and the requests that reached upstream.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use govinfo_mcp::govinfo::{ErrorKind, ExecutorOptions, HttpExecutor, RateLimiter, RetryPolicy};
use govinfo_mcp::tools::{self, ToolContext, ToolError, ToolResult};

fn context(server: &MockServer, max_range_days: u32) -> ToolContext {
    let options = ExecutorOptions {
        base_url: server.uri(),
        retry: RetryPolicy {
            max_attempts: 2,
            backoff_base: Duration::from_millis(10),
            jitter: false,
        },
        ..ExecutorOptions::default()
    };
    let limiter = Arc::new(RateLimiter::new(1000, Duration::from_secs(60)));
    ToolContext::new(HttpExecutor::new(options, "test-key", limiter).unwrap(), max_range_days)
}

async fn call(ctx: &ToolContext, name: &str, arguments: Value) -> ToolResult {
    tools::dispatch(ctx, name, &arguments, &CancellationToken::new())
        .await
        .unwrap_or_else(|| panic!("unknown tool {name}"))
}

fn api_error(result: ToolResult) -> govinfo_mcp::govinfo::ApiError {
    match result {
        Err(ToolError::Api(e)) => e,
        other => panic!("expected API error, got {other:?}"),
    }
}

async fn received_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect()
}

// =============================================================================
// Cursors
// =============================================================================

#[tokio::test]
async fn cursor_round_trips_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .and(query_param("offsetMark", "XYZ"))
        .and(query_param("pageSize", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 40,
            "collections": [{"collectionCode": "BILLS"}, {"collectionCode": "FR"}],
            "nextPage": "https://api.govinfo.gov/collections?offsetMark=AoJ%2Fq8%3D&pageSize=2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(&server, 365);
    let value = call(
        &ctx,
        "collections_get_collections",
        json!({"offset_mark": "XYZ", "page_size": 2}),
    )
    .await
    .unwrap();

    assert_eq!(value["status"], "success");
    assert_eq!(value["count_returned"], 2);
    assert_eq!(value["total_count"], 40);
    assert_eq!(value["next_cursor"], "AoJ/q8=");
}

#[tokio::test]
async fn missing_next_page_means_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "collections": [{"collectionCode": "BILLS"}]
        })))
        .mount(&server)
        .await;

    let ctx = context(&server, 365);
    let value = call(&ctx, "collections_get_collections", json!({}))
        .await
        .unwrap();

    assert!(value["next_cursor"].is_null());
    assert_eq!(value["items"][0]["collectionCode"], "BILLS");
}

#[tokio::test]
async fn malformed_listing_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&server)
        .await;

    let ctx = context(&server, 365);
    let err = api_error(call(&ctx, "collections_get_collections", json!({})).await);

    assert_eq!(err.kind, ErrorKind::MalformedResponse);
    assert!(!err.retriable);
}

// =============================================================================
// Date ranges
// =============================================================================

#[tokio::test]
async fn long_range_is_partitioned_in_order() {
    let server = MockServer::start().await;
    for (start, end, id) in [
        ("2024-01-01", "2024-01-30", "A"),
        ("2024-01-31", "2024-02-29", "B"),
        ("2024-03-01", "2024-03-05", "C"),
    ] {
        Mock::given(method("GET"))
            .and(path(format!("/published/{start}/{end}")))
            .and(query_param("collection", "BILLS"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 1,
                "packages": [{"packageId": id}]
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let ctx = context(&server, 30);
    let value = call(
        &ctx,
        "published_get_published_range",
        json!({
            "start_date": "2024-01-01",
            "end_date": "2024-03-05",
            "collection": "BILLS"
        }),
    )
    .await
    .unwrap();

    assert_eq!(
        received_paths(&server).await,
        vec![
            "/published/2024-01-01/2024-01-30",
            "/published/2024-01-31/2024-02-29",
            "/published/2024-03-01/2024-03-05",
        ]
    );
    assert_eq!(value["count_returned"], 3);
    assert_eq!(value["exhausted"], true);
    let ids: Vec<_> = value["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["packageId"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["A", "B", "C"]);
    assert_eq!(value["partitions"].as_array().unwrap().len(), 3);
    assert_eq!(value["partitions"][1]["range"]["start"], "2024-01-31");
}

#[tokio::test]
async fn failed_partition_fails_the_whole_range() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/published/2024-01-01/2024-01-30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"packages": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/published/2024-01-31/2024-02-15"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let ctx = context(&server, 30);
    let err = api_error(
        call(
            &ctx,
            "published_get_published_range",
            json!({
                "start_date": "2024-01-01",
                "end_date": "2024-02-15",
                "collection": "BILLS"
            }),
        )
        .await,
    );

    assert_eq!(err.kind, ErrorKind::ClientError);
    assert_eq!(err.status_code, Some(404));
}

#[tokio::test]
async fn reversed_range_makes_no_request() {
    let server = MockServer::start().await;
    let ctx = context(&server, 30);

    let result = call(
        &ctx,
        "published_get_published_range",
        json!({
            "start_date": "2024-03-01",
            "end_date": "2024-01-01",
            "collection": "BILLS"
        }),
    )
    .await;

    assert!(matches!(result, Err(ToolError::Params(_))));
    assert!(received_paths(&server).await.is_empty());
}

// =============================================================================
// Content
// =============================================================================

#[tokio::test]
async fn unsupported_content_type_makes_no_request() {
    let server = MockServer::start().await;
    let ctx = context(&server, 365);

    let err = api_error(
        call(
            &ctx,
            "packages_get_package_content",
            json!({"package_id": "BILLS-118hr1enr", "content_type": "docx"}),
        )
        .await,
    );

    assert_eq!(err.kind, ErrorKind::UnsupportedContentType);
    assert!(received_paths(&server).await.is_empty());
}

#[tokio::test]
async fn pdf_content_is_base64() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/packages/BILLS-118hr1enr/pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(b"%PDF".to_vec()),
        )
        .mount(&server)
        .await;

    let ctx = context(&server, 365);
    let value = call(
        &ctx,
        "packages_get_package_content",
        json!({"package_id": "BILLS-118hr1enr", "content_type": "PDF"}),
    )
    .await
    .unwrap();

    assert_eq!(value["format"], "pdf");
    assert_eq!(value["base64_content"], "JVBERg==");
    assert_eq!(value["size_bytes"], 4);
    assert_eq!(value["package_id"], "BILLS-118hr1enr");
}

#[tokio::test]
async fn unavailable_format_points_at_summary() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/packages/FR-2024-01-02/xml"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let ctx = context(&server, 365);
    let err = api_error(
        call(
            &ctx,
            "packages_get_package_content",
            json!({"package_id": "FR-2024-01-02", "content_type": "xml"}),
        )
        .await,
    );

    assert_eq!(err.kind, ErrorKind::ClientError);
    assert!(err.message.contains("packages_get_package_summary"));
}

// =============================================================================
// Search
// =============================================================================

#[tokio::test]
async fn search_posts_query_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({
            "query": "congress:118 AND collection:BILLS AND climate",
            "pageSize": 5,
            "offsetMark": "*",
            "sorts": [{"field": "score", "sortOrder": "DESC"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 120,
            "offsetMark": "next+mark",
            "results": [{"packageId": "BILLS-118hr1"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(&server, 365);
    let value = call(
        &ctx,
        "search_search_packages",
        json!({
            "query": "climate",
            "collection": "BILLS",
            "congress": 118,
            "page_size": 5
        }),
    )
    .await
    .unwrap();

    assert_eq!(value["total_count"], 120);
    assert_eq!(value["next_cursor"], "next+mark");
}

#[tokio::test]
async fn statute_search_keeps_statute_collections_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 3,
            "results": [
                {"packageId": "USCODE-2022-title42", "collectionCode": "USCODE"},
                {"packageId": "FR-2024-01-02", "collectionCode": "FR"},
                {"packageId": "PLAW-118publ1", "collectionCode": "PLAW"}
            ]
        })))
        .mount(&server)
        .await;

    let ctx = context(&server, 365);
    let value = call(&ctx, "statutes_search_statutes", json!({"query": "clean air"}))
        .await
        .unwrap();

    assert_eq!(value["count_returned"], 2);
    assert_eq!(value["total_count"], 3);
    assert_eq!(value["items"][1]["packageId"], "PLAW-118publ1");
}

#[tokio::test]
async fn statute_content_exposes_requested_link() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/packages/PLAW-118publ1/summary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "packageId": "PLAW-118publ1",
            "download": {
                "pdfLink": "https://api.govinfo.gov/packages/PLAW-118publ1/pdf",
                "txtLink": "https://api.govinfo.gov/packages/PLAW-118publ1/htm"
            }
        })))
        .mount(&server)
        .await;

    let ctx = context(&server, 365);
    let value = call(
        &ctx,
        "statutes_get_statute_content",
        json!({"package_id": "PLAW-118publ1", "content_type": "pdf"}),
    )
    .await
    .unwrap();

    assert_eq!(
        value["requested_content_url"],
        "https://api.govinfo.gov/packages/PLAW-118publ1/pdf"
    );
    assert_eq!(value["packageId"], "PLAW-118publ1");
}

// =============================================================================
// Dispatch
// =============================================================================

#[tokio::test]
async fn unknown_tool_is_not_dispatched() {
    let server = MockServer::start().await;
    let ctx = context(&server, 365);
    let result = tools::dispatch(&ctx, "nope", &json!({}), &CancellationToken::new()).await;
    assert!(result.is_none());
}

#[tokio::test]
async fn invalid_arguments_make_no_request() {
    let server = MockServer::start().await;
    let ctx = context(&server, 365);

    for (name, arguments) in [
        ("collections_get_collections", json!({"page_size": 0})),
        ("search_search_packages", json!({"query": "  "})),
        ("packages_get_package_summary", json!({})),
        ("statutes_get_public_laws_by_congress", json!({"congress": 118, "law_type": "secret"})),
        ("search_advanced_search", json!({"query": "x", "sort_order": "sideways"})),
    ] {
        let result = call(&ctx, name, arguments).await;
        let Err(ToolError::Params(error)) = result else {
            panic!("{name} accepted invalid arguments");
        };
        assert!(!error.to_string().is_empty());
    }
    assert!(received_paths(&server).await.is_empty());
}

#[tokio::test]
async fn status_reports_rate_usage() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .and(query_param("pageSize", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"collections": []})))
        .mount(&server)
        .await;

    let ctx = context(&server, 365);
    let value = call(&ctx, "status", json!({})).await.unwrap();

    assert_eq!(value["status"], "healthy");
    assert_eq!(value["api"]["reachable"], true);
    assert_eq!(value["rate_limit"]["used"], 1);
    assert_eq!(value["rate_limit"]["limit"], 1000);
}

#[tokio::test]
async fn statute_collections_need_no_upstream() {
    let server = MockServer::start().await;
    let ctx = context(&server, 365);

    let value = call(&ctx, "statutes_list_statute_collections", Value::Null)
        .await
        .unwrap();

    assert_eq!(value["total_collections"], 4);
    assert!(received_paths(&server).await.is_empty());
}
