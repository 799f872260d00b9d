//! Error types for skywalking-mcp.
//!
//! Errors fall into three tiers:
//!
//! - [`ConfigError`]: the resolved settings are unusable. Fatal at startup.
//! - [`ToolError`]: confined to a single tool invocation, except for the
//!   definition variants, which abort server construction.
//! - [`ServerError`]: startup and transport failures that reach `main` and
//!   decide the exit code.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while resolving the server configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No backend URL was configured for a transport that requires one.
    #[error("SW_URL must be specified")]
    MissingUrl,

    /// The backend URL is not an http(s) URL.
    #[error("invalid SkyWalking URL '{url}': expected an http:// or https:// URL")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
    },

    /// The SSE listen address is empty or malformed.
    #[error("invalid SSE listen address '{address}'")]
    InvalidAddress {
        /// The rejected address.
        address: String,
    },

    /// The SSE base path does not start with `/`.
    #[error("invalid base path '{path}': must be empty or start with '/'")]
    InvalidBasePath {
        /// The rejected base path.
        path: String,
    },

    /// The log file could not be opened for appending.
    #[error("failed to open log file: {path}")]
    LogFile {
        /// Path to the log file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while defining, registering or invoking a tool.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The tool definition itself is malformed (empty name, bad option).
    #[error("invalid tool definition: {message}")]
    InvalidDefinition {
        /// Description of the problem.
        message: String,
    },

    /// A tool with the same name is already registered.
    #[error("tool '{name}' is already registered")]
    DuplicateTool {
        /// The duplicated tool name.
        name: String,
    },

    /// No tool with this name is registered.
    #[error("tool not found: {name}")]
    UnknownTool {
        /// The requested tool name.
        name: String,
    },

    /// The invocation arguments do not match the handler's argument type.
    #[error("failed to bind arguments for tool '{tool}': {source}")]
    Binding {
        /// The tool being invoked.
        tool: String,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The handler's return value could not be encoded.
    #[error("failed to marshal return value: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The handler itself failed.
    #[error("{message}")]
    Execution {
        /// The handler's error message, surfaced verbatim.
        message: String,
    },
}

impl ToolError {
    /// Creates an execution error from any displayable cause.
    pub fn execution(message: impl std::fmt::Display) -> Self {
        Self::Execution {
            message: message.to_string(),
        }
    }

    /// Returns `true` if this error is the caller's fault (bad arguments or
    /// an unknown tool) rather than a server-side failure.
    #[must_use]
    pub const fn is_invalid_params(&self) -> bool {
        matches!(self, Self::Binding { .. } | Self::UnknownTool { .. })
    }
}

/// Errors that terminate a transport runner.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The configuration was rejected before the transport started.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A tool could not be registered.
    #[error("failed to register tools: {0}")]
    Registration(#[from] ToolError),

    /// The transport failed to start or failed while running.
    #[error("{context}: {source}")]
    Transport {
        /// What the transport was doing.
        context: &'static str,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Graceful shutdown did not finish within the drain window.
    #[error("shutdown timed out after {timeout:?}")]
    ShutdownTimeout {
        /// The configured drain window.
        timeout: Duration,
    },
}

impl ServerError {
    /// Wraps an IO error as a transport error.
    pub(crate) const fn transport(context: &'static str, source: std::io::Error) -> Self {
        Self::Transport { context, source }
    }
}
