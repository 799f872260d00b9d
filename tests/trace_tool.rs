//! Integration tests for the trace tool against a mock OAP GraphQL endpoint.

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use skywalking_mcp::backend::{RefType, Trace};
use skywalking_mcp::mcp::context::RequestContext;
use skywalking_mcp::mcp::server::{McpServer, Session};
use skywalking_mcp::tools::build_registry;
use skywalking_mcp::tools::trace::{search_trace, TraceRequest, SEARCH_TRACE_TOOL};

type Seen = Arc<Mutex<Vec<Value>>>;

/// Starts a mock backend answering every POST with `(status, reply)`.
async fn mock_backend(status: StatusCode, reply: Value) -> (String, Seen) {
    let seen: Seen = Arc::default();
    let app = Router::new()
        .route(
            "/graphql",
            post(
                move |State(seen): State<Seen>, Json(body): Json<Value>| {
                    let reply = reply.clone();
                    async move {
                        seen.lock().unwrap().push(body);
                        (status, Json(reply))
                    }
                },
            ),
        )
        .with_state(Arc::clone(&seen));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/graphql"), seen)
}

fn sample_trace() -> Value {
    json!({
        "data": {
            "result": {
                "spans": [
                    {
                        "traceId": "t-1",
                        "segmentId": "seg-1",
                        "spanId": 0,
                        "parentSpanId": -1,
                        "refs": [],
                        "serviceCode": "gateway",
                        "serviceInstanceName": "gw-0",
                        "startTime": 1_700_000_000_000_i64,
                        "endTime": 1_700_000_000_120_i64,
                        "endpointName": "GET:/orders",
                        "type": "Entry",
                        "peer": null,
                        "component": "SpringMVC",
                        "isError": false,
                        "layer": "Http",
                        "tags": [{"key": "http.method", "value": "GET"}],
                        "logs": []
                    },
                    {
                        "traceId": "t-1",
                        "segmentId": "seg-2",
                        "spanId": 0,
                        "parentSpanId": -1,
                        "refs": [{
                            "traceId": "t-1",
                            "parentSegmentId": "seg-1",
                            "parentSpanId": 0,
                            "type": "CROSS_PROCESS"
                        }],
                        "serviceCode": "orders",
                        "serviceInstanceName": "orders-0",
                        "startTime": 1_700_000_000_010_i64,
                        "endTime": 1_700_000_000_100_i64,
                        "endpointName": "/orders",
                        "type": "Entry",
                        "isError": true,
                        "tags": [],
                        "logs": [{"time": 1_700_000_000_050_i64, "data": [{"key": "event", "value": "error"}]}]
                    }
                ]
            }
        }
    })
}

fn context(url: &str) -> RequestContext {
    RequestContext::default().with_backend(url, false)
}

#[tokio::test]
async fn fetches_and_decodes_trace() {
    let (url, seen) = mock_backend(StatusCode::OK, sample_trace()).await;

    let trace = search_trace(
        context(&url),
        TraceRequest {
            trace_id: "t-1".to_string(),
        },
    )
    .await
    .unwrap()
    .0;

    assert_eq!(trace.spans.len(), 2);
    assert_eq!(trace.spans[0].service_code, "gateway");
    assert_eq!(trace.spans[0].peer, None);
    assert_eq!(trace.spans[1].refs[0].kind, RefType::CrossProcess);
    assert_eq!(trace.spans[1].is_error, Some(true));
    assert_eq!(trace.spans[1].logs[0].data[0].key, "event");

    let requests = seen.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["variables"], json!({"traceId": "t-1"}));
    assert!(requests[0]["query"]
        .as_str()
        .unwrap()
        .contains("queryTrace(traceId: $traceId)"));
}

#[tokio::test]
async fn missing_trace_is_empty() {
    let (url, _) = mock_backend(StatusCode::OK, json!({"data": {"result": null}})).await;

    let trace = search_trace(
        context(&url),
        TraceRequest {
            trace_id: "gone".to_string(),
        },
    )
    .await
    .unwrap()
    .0;
    assert_eq!(trace, Trace::default());
}

#[tokio::test]
async fn graphql_errors_name_the_trace() {
    let (url, _) = mock_backend(
        StatusCode::OK,
        json!({"errors": [{"message": "storage unavailable"}]}),
    )
    .await;

    let err = search_trace(
        context(&url),
        TraceRequest {
            trace_id: "t-9".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "search trace t-9 failed: storage unavailable"
    );
}

#[tokio::test]
async fn http_status_is_reported() {
    let (url, _) = mock_backend(StatusCode::BAD_GATEWAY, json!({})).await;

    let err = search_trace(
        context(&url),
        TraceRequest {
            trace_id: "t-1".to_string(),
        },
    )
    .await
    .unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("search trace t-1 failed: "), "{message}");
    assert!(message.contains("502"), "{message}");
}

#[tokio::test]
async fn tools_call_returns_trace_json() {
    let (url, _) = mock_backend(StatusCode::OK, sample_trace()).await;
    let server = McpServer::new(build_registry(true).unwrap());
    let session = Session::new("trace", context(&url));

    for line in [
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {"protocolVersion": "2024-11-05"}}),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
    ] {
        server.handle_line(&session, &line.to_string()).await;
    }

    let call = json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/call",
        "params": {"name": SEARCH_TRACE_TOOL, "arguments": {"trace_id": "t-1"}}
    });
    let response = server
        .handle_line(&session, &call.to_string())
        .await
        .unwrap();
    let response: Value = serde_json::from_str(&response.to_json().unwrap()).unwrap();

    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    let trace: Trace = serde_json::from_str(text).unwrap();
    assert_eq!(trace.spans.len(), 2);
    assert_eq!(trace.spans[1].service_code, "orders");
}

#[tokio::test]
async fn tools_call_surfaces_backend_failure() {
    let (url, _) = mock_backend(
        StatusCode::OK,
        json!({"errors": [{"message": "no such trace"}]}),
    )
    .await;
    let server = McpServer::new(build_registry(false).unwrap());
    let session = Session::new("trace", context(&url));

    for line in [
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {"protocolVersion": "2024-11-05"}}),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
    ] {
        server.handle_line(&session, &line.to_string()).await;
    }

    let call = json!({
        "jsonrpc": "2.0",
        "id": 7,
        "method": "tools/call",
        "params": {"name": SEARCH_TRACE_TOOL, "arguments": {"trace_id": "x"}}
    });
    let response = server
        .handle_line(&session, &call.to_string())
        .await
        .unwrap();
    let response: Value = serde_json::from_str(&response.to_json().unwrap()).unwrap();

    assert_eq!(response["id"], 7);
    assert_eq!(response["error"]["code"], -32603);
    assert_eq!(
        response["error"]["message"],
        "search trace x failed: no such trace"
    );
}
