//! Trace lookup tools.

use serde::Deserialize;

use crate::backend::{GraphqlClient, Trace};
use crate::error::ToolError;
use crate::mcp::context::RequestContext;
use crate::mcp::tool::{Structured, ToolDefinition, ToolOption, ToolParam};

/// Name of the trace lookup tool.
pub const SEARCH_TRACE_TOOL: &str = "search_trace_by_trace_id";

/// Arguments of [`SEARCH_TRACE_TOOL`].
#[derive(Debug, Clone, Deserialize)]
pub struct TraceRequest {
    /// The trace to fetch.
    pub trace_id: String,
}

/// Fetches a single trace from the backend named by `ctx`.
///
/// # Errors
///
/// Returns [`ToolError::Execution`] naming the trace if the backend call
/// fails.
pub async fn search_trace(
    ctx: RequestContext,
    req: TraceRequest,
) -> Result<Structured<Trace>, ToolError> {
    let client =
        GraphqlClient::from_context(&ctx).map_err(|e| search_failed(&req.trace_id, e))?;
    let trace = client
        .query_trace(&req.trace_id)
        .await
        .map_err(|e| search_failed(&req.trace_id, e))?;

    tracing::debug!(trace_id = %req.trace_id, spans = trace.spans.len(), "Fetched trace");
    Ok(Structured(trace))
}

fn search_failed(trace_id: &str, cause: impl std::fmt::Display) -> ToolError {
    ToolError::execution(format!("search trace {trace_id} failed: {cause}"))
}

/// The `search_trace_by_trace_id` tool definition.
#[must_use]
pub fn search_trace_tool() -> ToolDefinition<TraceRequest, Structured<Trace>> {
    ToolDefinition::new(
        SEARCH_TRACE_TOOL,
        "Search for traces by a single TraceId",
        search_trace,
        vec![
            ToolOption::Title("Search a trace by TraceId".to_string()),
            ToolOption::ReadOnlyHint(true),
            ToolParam::string("trace_id")
                .required()
                .description("The TraceId to search for")
                .into(),
        ],
    )
}
