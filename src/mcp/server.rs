//! MCP request handling shared by both transports.
//!
//! The server itself holds no connection state. Each connection owns a
//! [`Session`] that tracks the MCP lifecycle and carries the
//! [`RequestContext`] derived when the connection was opened. A transport
//! may hand a per-message context to [`McpServer::handle_line_with`].
//!
//! Lifecycle:
//!
//! 1. **Initialisation**: `initialize` request, then the
//!    `notifications/initialized` notification
//! 2. **Operation**: `tools/list` and `tools/call`
//!
//! `ping` is answered in every state.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::mcp::context::RequestContext;
use crate::mcp::protocol::{
    parse_message, IncomingMessage, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, OutgoingMessage, RequestId, MCP_PROTOCOL_VERSION, SERVER_NAME,
};
use crate::mcp::registry::ToolRegistry;

/// Session state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for initialize request.
    AwaitingInit,
    /// Initialize received, waiting for initialized notification.
    Initialising,
    /// Ready for normal operation.
    Running,
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

#[allow(clippy::trivially_copy_pass_by_ref)] // skip_serializing_if wants fn(&T) -> bool
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

/// Parameters for tools/call request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: Value,
}

/// Per-connection protocol state.
#[derive(Debug)]
pub struct Session {
    id: String,
    context: RequestContext,
    state: Mutex<SessionState>,
}

impl Session {
    /// Creates a session awaiting initialisation.
    #[must_use]
    pub fn new(id: impl Into<String>, context: RequestContext) -> Self {
        Self {
            id: id.into(),
            context,
            state: Mutex::new(SessionState::AwaitingInit),
        }
    }

    /// The session identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The context passed to every tool invoked in this session.
    #[must_use]
    pub const fn context(&self) -> &RequestContext {
        &self.context
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves to `to` if currently in `from`. Returns whether it moved.
    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }
}

/// Dispatches MCP messages to the tool registry.
#[derive(Debug, Clone)]
pub struct McpServer {
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    /// Creates a server over the given registry.
    #[must_use]
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// The registered tools.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handles one line of input.
    ///
    /// Returns the message to send back, or `None` for blank lines and
    /// notifications.
    pub async fn handle_line(&self, session: &Session, line: &str) -> Option<OutgoingMessage> {
        self.handle_line_with(session, session.context(), line).await
    }

    /// Handles one line of input, running tool calls against `context`
    /// instead of the session's own context.
    pub async fn handle_line_with(
        &self,
        session: &Session,
        context: &RequestContext,
        line: &str,
    ) -> Option<OutgoingMessage> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        match parse_message(line) {
            Ok(msg) => self.dispatch(session, context, msg).await,
            Err(error) => {
                tracing::debug!(
                    session = %session.id(),
                    code = error.error.code,
                    "Rejected malformed message"
                );
                Some(error.into())
            }
        }
    }

    async fn dispatch(
        &self,
        session: &Session,
        context: &RequestContext,
        msg: IncomingMessage,
    ) -> Option<OutgoingMessage> {
        match msg {
            IncomingMessage::Request(req) => Some(self.handle_request(session, context, req).await),
            IncomingMessage::Notification(ref notif) => {
                Self::handle_notification(session, notif);
                None
            }
        }
    }

    async fn handle_request(
        &self,
        session: &Session,
        context: &RequestContext,
        req: JsonRpcRequest,
    ) -> OutgoingMessage {
        tracing::debug!(
            session = %session.id(),
            id = %req.id,
            method = %req.method,
            "Handling request"
        );

        let response = match req.method.as_str() {
            "initialize" => Self::handle_initialize(session, &req),
            "tools/list" => self.handle_tools_list(session, &req),
            "tools/call" => self.handle_tools_call(session, context, &req).await,
            "ping" => Ok(Self::handle_ping(&req)),
            _ => Err(JsonRpcError::method_not_found(req.id.clone(), &req.method)),
        };

        match response {
            Ok(resp) => resp.into(),
            Err(error) => error.into(),
        }
    }

    fn handle_notification(session: &Session, notif: &JsonRpcNotification) {
        if notif.method == "notifications/initialized"
            && session.transition(SessionState::Initialising, SessionState::Running)
        {
            tracing::debug!(session = %session.id(), "Session initialised");
        }
    }

    fn handle_initialize(
        session: &Session,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        if session.state() != SessionState::AwaitingInit {
            return Err(JsonRpcError::invalid_request(
                Some(req.id.clone()),
                "Server already initialised",
            ));
        }

        let params: InitializeParams = req.params_as()?;

        if !session.transition(SessionState::AwaitingInit, SessionState::Initialising) {
            return Err(JsonRpcError::invalid_request(
                Some(req.id.clone()),
                "Server already initialised",
            ));
        }

        tracing::info!(
            session = %session.id(),
            client = params.client_info.as_ref().map_or("unknown", |c| c.name.as_str()),
            requested_version = %params.protocol_version,
            "Client connected"
        );

        let result = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": ServerCapabilities::default(),
            "serverInfo": ServerInfo::default(),
        });

        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    fn handle_tools_list(
        &self,
        session: &Session,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        Self::require_running(session, &req.id)?;

        let tools: Vec<_> = self.registry.tools().collect();
        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "tools": tools }),
        ))
    }

    async fn handle_tools_call(
        &self,
        session: &Session,
        context: &RequestContext,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        Self::require_running(session, &req.id)?;

        let params: ToolCallParams = req.params_as()?;

        let result = self
            .registry
            .call(&params.name, context.clone(), params.arguments)
            .await
            .map_err(|e| {
                tracing::warn!(tool = %params.name, error = %e, "Tool call failed");
                JsonRpcError::from_tool_error(req.id.clone(), &e)
            })?;

        let value = serde_json::to_value(&result).map_err(|e| {
            tracing::error!(error = %e, "Failed to serialise tool call result");
            JsonRpcError::internal_error(
                req.id.clone(),
                "Internal error: failed to serialise result",
            )
        })?;

        Ok(JsonRpcResponse::success(req.id.clone(), value))
    }

    fn handle_ping(req: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(req.id.clone(), json!({}))
    }

    fn require_running(session: &Session, id: &RequestId) -> Result<(), JsonRpcError> {
        if session.state() != SessionState::Running {
            return Err(JsonRpcError::invalid_request(
                Some(id.clone()),
                "Server not initialised",
            ));
        }
        Ok(())
    }
}
