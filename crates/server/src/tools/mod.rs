//! MCP tool implementations.
//!
//! This module contains all tools exposed by the labelgate server. Each tool
//! is a thin adapter: it validates parameters, calls into the core or client
//! crate, and renders the output as pretty-printed JSON text.

pub mod cache;
pub mod metrics;
pub mod quality;
pub mod search;
pub mod tokens;

use labelgate_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

/// Render a tool output as a JSON text result.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(Error::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Parse the JSON text of a tool result back into an output type.
#[cfg(test)]
pub(crate) fn parse_output<T: serde::de::DeserializeOwned>(result: &CallToolResult) -> T {
    let content = serde_json::to_value(&result.content[0]).unwrap();
    let text = content
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
