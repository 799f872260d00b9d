//! Registry of the tools a server exposes.
//!
//! Tools keep their registration order so `tools/list` is stable. The
//! registry is built once before serving and shared read-only afterwards.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ToolError;
use crate::mcp::context::RequestContext;
use crate::mcp::tool::{CallToolResult, Tool, ToolDefinition, ToolHandler, ToolOutput};

struct RegisteredTool {
    tool: Tool,
    handler: ToolHandler,
}

/// Maps tool names to their descriptors and invocation adapters.
#[derive(Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, RegisteredTool>,
    read_only: bool,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry that only accepts read-only tools.
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            tools: IndexMap::new(),
            read_only: true,
        }
    }

    /// Adds an already converted tool.
    ///
    /// In read-only mode, tools without a read-only hint are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if the name is taken.
    pub fn add(&mut self, tool: Tool, handler: ToolHandler) -> Result<(), ToolError> {
        if self.tools.contains_key(&tool.name) {
            return Err(ToolError::DuplicateTool { name: tool.name });
        }

        if self.read_only && !tool.is_read_only() {
            tracing::debug!(tool = %tool.name, "Skipping tool that is not read-only");
            return Ok(());
        }

        tracing::debug!(tool = %tool.name, "Registered tool");
        self.tools
            .insert(tool.name.clone(), RegisteredTool { tool, handler });
        Ok(())
    }

    /// Converts and adds a typed tool definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition is malformed or the name is taken.
    pub fn register<A, R>(&mut self, definition: ToolDefinition<A, R>) -> Result<(), ToolError>
    where
        A: DeserializeOwned + Send + 'static,
        R: ToolOutput + Send + 'static,
    {
        let (tool, handler) = definition.convert()?;
        self.add(tool, handler)
    }

    /// Descriptors of all registered tools, in registration order.
    pub fn tools(&self) -> impl Iterator<Item = &Tool> {
        self.tools.values().map(|entry| &entry.tool)
    }

    /// Looks up a tool descriptor by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name).map(|entry| &entry.tool)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invokes a tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] for unknown names, otherwise
    /// whatever the tool's adapter returns.
    pub async fn call(
        &self,
        name: &str,
        ctx: RequestContext,
        arguments: Value,
    ) -> Result<CallToolResult, ToolError> {
        let entry = self.tools.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
        })?;
        (entry.handler)(ctx, arguments).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("read_only", &self.read_only)
            .finish()
    }
}
