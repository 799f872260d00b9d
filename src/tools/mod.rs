//! SkyWalking tools exposed over MCP.

pub mod trace;

use crate::error::ToolError;
use crate::mcp::registry::ToolRegistry;

/// Builds the registry of every SkyWalking tool.
///
/// # Errors
///
/// Returns an error if a tool definition is malformed or two tools share a
/// name.
pub fn build_registry(read_only: bool) -> Result<ToolRegistry, ToolError> {
    let mut registry = if read_only {
        ToolRegistry::read_only()
    } else {
        ToolRegistry::new()
    };

    registry.register(trace::search_trace_tool())?;

    tracing::debug!(tools = registry.len(), read_only, "Built tool registry");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_trace_tool() {
        let registry = build_registry(false).unwrap();
        assert!(registry.get(trace::SEARCH_TRACE_TOOL).is_some());
    }

    #[test]
    fn trace_tool_survives_read_only() {
        let registry = build_registry(true).unwrap();
        assert!(registry.get(trace::SEARCH_TRACE_TOOL).is_some());
    }
}
