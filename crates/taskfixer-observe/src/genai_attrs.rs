//! OpenTelemetry GenAI Semantic Convention attribute names.
//!
//! Relay spans carry these as dotted `tracing` field names
//! (`gen_ai.operation.name = "chat"`); the constants are the same strings
//! for code that records them by name.

/// The name of the operation being performed (e.g., "chat").
pub const GEN_AI_OPERATION_NAME: &str = "gen_ai.operation.name";

/// The name of the GenAI provider (e.g., "openai").
pub const GEN_AI_PROVIDER_NAME: &str = "gen_ai.provider.name";

/// The upstream conversation (thread) id.
pub const GEN_AI_CONVERSATION_ID: &str = "gen_ai.conversation.id";

/// The name of a tool the model invoked (e.g., "web_search").
pub const GEN_AI_TOOL_NAME: &str = "gen_ai.tool.name";

/// The provider-issued id of a tool call.
pub const GEN_AI_TOOL_CALL_ID: &str = "gen_ai.tool.call.id";

// --- Operation name values ---

/// Streaming chat turn.
pub const OP_CHAT: &str = "chat";

/// Out-of-band tool execution.
pub const OP_EXECUTE_TOOL: &str = "execute_tool";
