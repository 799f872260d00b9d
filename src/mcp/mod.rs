//! Model Context Protocol (MCP) server implementation.
//!
//! Exposes the SkyWalking tools to AI assistants over JSON-RPC 2.0, either
//! on stdin/stdout or over HTTP with server-sent events.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                          MCP Server                           │
//! │                                                               │
//! │   ┌─────────────┐    ┌─────────────┐    ┌────────────────┐    │
//! │   │  Runner     │───▶│  McpServer  │───▶│  ToolRegistry  │    │
//! │   │ (stdio/sse) │    │  (session)  │    │   (handlers)   │    │
//! │   └─────────────┘    └─────────────┘    └────────────────┘    │
//! │          │                                      ▲             │
//! │          ▼                                      │             │
//! │   ┌────────────────┐                  ┌──────────────────┐    │
//! │   │ enrichment fn  │─────────────────▶│  RequestContext  │    │
//! │   └────────────────┘                  └──────────────────┘    │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2024-11-05.

pub mod context;
pub mod io_log;
pub mod lifecycle;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod sse;
pub mod stdio;
pub mod tool;
pub mod transport;

pub use context::RequestContext;
pub use lifecycle::{signal_token, RunnerHandle, RunnerState};
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use registry::ToolRegistry;
pub use server::{McpServer, Session};
pub use sse::SseServer;
pub use stdio::StdioServer;
pub use tool::{
    convert_tool, CallToolResult, Structured, Tool, ToolDefinition, ToolOption, ToolParam,
};
