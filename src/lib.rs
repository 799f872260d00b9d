//! skywalking-mcp: MCP server for Apache SkyWalking
//!
//! Lets AI assistants query a SkyWalking OAP backend through the Model
//! Context Protocol.
//!
//! # Architecture
//!
//! - **Tools** are plain async functions over typed arguments, converted
//!   into protocol tools and registered once at startup
//! - **Context enrichment** decides, per process (stdio) or per connection
//!   (SSE), which OAP GraphQL endpoint the tools talk to
//! - **Runners** serve the protocol over stdio or HTTP/SSE and handle
//!   graceful shutdown
//!
//! # Modules
//!
//! - [`backend`]: SkyWalking GraphQL client and trace model
//! - [`config`]: Resolved settings and defaults
//! - [`error`]: Error types
//! - [`logging`]: Tracing subscriber setup
//! - [`mcp`]: MCP protocol implementation and transports
//! - [`tools`]: The SkyWalking tools

pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod tools;
