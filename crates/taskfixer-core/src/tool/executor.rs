//! Tool executor: resolves tool calls into JSON outputs.
//!
//! Tool failures never abort a generation. `run_call` always produces an
//! output for the call id; failures are reported inside the payload so the
//! assistant can react to them.

use serde_json::{Value, json};
use taskfixer_types::tool::{ToolError, WEB_SEARCH_TOOL, WebSearchArgs};
use taskfixer_types::upstream::{ToolCallRequest, ToolOutput};
use tracing::{Instrument, debug, info_span, warn};

use super::search::SearchProvider;

pub const SEARCH_FAILED_MESSAGE: &str = "Failed to perform web search";

pub struct ToolExecutor<S: SearchProvider> {
    search: S,
    default_results: usize,
}

impl<S: SearchProvider> ToolExecutor<S> {
    pub fn new(search: S, default_results: usize) -> Self {
        Self {
            search,
            default_results,
        }
    }

    /// Execute a named tool with raw JSON arguments.
    ///
    /// Unknown tools and malformed arguments are errors. A failing search
    /// backend is not: it yields an error-tagged result object.
    pub async fn execute(&self, tool_name: &str, arguments: &str) -> Result<Value, ToolError> {
        match tool_name {
            WEB_SEARCH_TOOL => {
                let args: WebSearchArgs =
                    serde_json::from_str(arguments).map_err(|e| ToolError::InvalidArguments {
                        tool: tool_name.to_string(),
                        message: e.to_string(),
                    })?;
                Ok(self.web_search(args).await)
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    /// Resolve one call into an output keyed by its id.
    pub async fn run_call(&self, call: &ToolCallRequest) -> ToolOutput {
        let span = info_span!(
            "execute_tool",
            gen_ai.operation.name = "execute_tool",
            gen_ai.tool.name = %call.name,
            gen_ai.tool.call.id = %call.id,
        );
        let value = match self.execute(&call.name, &call.arguments).instrument(span).await {
            Ok(value) => value,
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool call failed");
                json!({ "results": [], "error": e.to_string() })
            }
        };
        ToolOutput {
            tool_call_id: call.id.clone(),
            output: value.to_string(),
        }
    }

    async fn web_search(&self, args: WebSearchArgs) -> Value {
        let limit = args.num_results.unwrap_or(self.default_results);
        debug!(query = %args.query, limit, "Running web search");

        match self.search.search(&args.query, limit).await {
            Ok(mut results) => {
                results.truncate(limit);
                let total = results.len();
                json!({ "query": args.query, "results": results, "total": total })
            }
            Err(e) => {
                warn!(query = %args.query, error = %e, "Web search failed");
                json!({ "query": args.query, "results": [], "error": SEARCH_FAILED_MESSAGE })
            }
        }
    }
}
