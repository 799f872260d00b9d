//! Integration tests for the stdio runner.
//!
//! The runner is driven through in-memory pipes instead of the process's
//! real stdin/stdout.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use skywalking_mcp::config::ServerConfig;
use skywalking_mcp::error::{ServerError, ToolError};
use skywalking_mcp::mcp::context::{stdio_context_fn, RequestContext, StdioContextFn};
use skywalking_mcp::mcp::{
    McpServer, RunnerState, StdioServer, Structured, ToolDefinition, ToolParam, ToolRegistry,
};

#[derive(Deserialize)]
struct WhereArgs {
    label: String,
}

fn server() -> McpServer {
    let mut registry = ToolRegistry::new();
    registry
        .register(ToolDefinition::new(
            "where",
            "Reports which backend the call would query",
            |ctx: RequestContext, args: WhereArgs| async move {
                Ok::<_, ToolError>(Structured(json!({
                    "label": args.label,
                    "backend": ctx.backend_url(),
                })))
            },
            vec![ToolParam::string("label").required().into()],
        ))
        .unwrap();
    McpServer::new(registry)
}

fn enrich() -> StdioContextFn {
    stdio_context_fn(&ServerConfig {
        url: Some("http://oap:12800/".to_string()),
        ..ServerConfig::default()
    })
}

#[tokio::test]
async fn serves_session_until_eof() {
    let runner = StdioServer::from_parts(server(), &enrich(), false);
    let handle = runner.handle();

    let (client_in, server_in) = tokio::io::duplex(4096);
    let (server_out, client_out) = tokio::io::duplex(4096);
    let task = tokio::spawn(runner.run_with_io(server_in, server_out, CancellationToken::new()));

    let mut requests = client_in;
    let mut responses = BufReader::new(client_out).lines();

    let script = [
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {"protocolVersion": "2024-11-05"}}),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {"name": "where", "arguments": {"label": "a"}}}),
    ];
    for message in &script {
        requests
            .write_all(format!("{message}\r\n\n").as_bytes())
            .await
            .unwrap();
    }

    let init: Value = serde_json::from_str(&responses.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(init["id"], 1);
    assert_eq!(init["result"]["protocolVersion"], "2024-11-05");

    let call: Value = serde_json::from_str(&responses.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(call["id"], 2);
    let text = call["result"]["content"][0]["text"].as_str().unwrap();
    assert_eq!(text, r#"{"backend":"http://oap:12800/graphql","label":"a"}"#);

    drop(requests);
    task.await.unwrap().unwrap();
    assert_eq!(handle.state(), RunnerState::Stopped);
}

#[tokio::test]
async fn cancellation_stops_runner() {
    let runner = StdioServer::from_parts(server(), &enrich(), false);
    let handle = runner.handle();
    let shutdown = CancellationToken::new();

    let (_client_in, server_in) = tokio::io::duplex(64);
    let task = tokio::spawn(runner.run_with_io(server_in, tokio::io::sink(), shutdown.clone()));

    assert!(
        handle
            .wait_for(RunnerState::Listening, Duration::from_secs(5))
            .await
    );
    shutdown.cancel();

    task.await.unwrap().unwrap();
    assert_eq!(handle.state(), RunnerState::Stopped);
}

#[tokio::test]
async fn read_error_is_transport_error() {
    let runner = StdioServer::from_parts(server(), &enrich(), false);
    let handle = runner.handle();
    let mut states = handle.subscribe();

    let reader = tokio_test::io::Builder::new()
        .read_error(io::Error::new(io::ErrorKind::BrokenPipe, "stdin went away"))
        .build();

    let err = runner
        .run_with_io(reader, tokio::io::sink(), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ServerError::Transport { .. }));
    assert!(err.to_string().contains("stdin went away"));
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), RunnerState::Stopped);
}

#[tokio::test]
async fn logged_streams_pass_bytes_through() {
    let runner = StdioServer::from_parts(server(), &enrich(), true);

    let input = b"{\"jsonrpc\":\"2.0\",\"id\":\"p\",\"method\":\"ping\"}\n".as_slice();
    let (server_out, client_out) = tokio::io::duplex(4096);

    runner
        .run_with_io(input, server_out, CancellationToken::new())
        .await
        .unwrap();

    let mut responses = BufReader::new(client_out).lines();
    let line = responses.next_line().await.unwrap().unwrap();
    assert_eq!(line, r#"{"jsonrpc":"2.0","id":"p","result":{}}"#);
    assert!(responses.next_line().await.unwrap().is_none());
}

#[test]
fn context_is_shared_by_all_calls() {
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let enrich: StdioContextFn = Arc::new(move |ctx: RequestContext| {
        counted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        ctx.with_backend("http://counted/graphql", false)
    });

    let runner = StdioServer::from_parts(server(), &enrich, false);
    assert_eq!(runner.context().backend_url(), Some("http://counted/graphql"));
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}
