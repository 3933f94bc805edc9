//! Upstream conversation port and per-turn session helpers.

pub mod box_provider;
pub mod provider;
pub mod session;

pub use box_provider::BoxConversationProvider;
pub use provider::{ConversationProvider, UpstreamStream};
pub use session::ConversationSession;
