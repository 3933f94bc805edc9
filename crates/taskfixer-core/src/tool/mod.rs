//! Out-of-band tool execution for provider-issued tool calls.

pub mod executor;
pub mod search;

pub use executor::ToolExecutor;
pub use search::SearchProvider;
