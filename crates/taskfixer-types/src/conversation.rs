//! Conversation vocabulary: messages and file references.
//!
//! Chat history itself is owned by an external collaborator. The relay only
//! needs the shape of one user turn and the upstream thread it belongs to.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Text sent upstream when a user turn carries only attachments.
pub const DEFAULT_ATTACHMENT_PROMPT: &str = "Please analyze the attached files.";

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Reference to a file held in the provider's file store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl FileRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

/// An immutable chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<FileRef>,
}

impl Message {
    /// Build the user message for one turn.
    ///
    /// Blank text with attachments falls back to [`DEFAULT_ATTACHMENT_PROMPT`].
    pub fn user_turn(text: Option<&str>, attachments: Vec<FileRef>) -> Self {
        let content = match text.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => DEFAULT_ATTACHMENT_PROMPT.to_string(),
        };
        Self {
            role: MessageRole::User,
            content,
            attachments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_turn_keeps_text() {
        let msg = Message::user_turn(Some("Redesign my essay prompt"), vec![]);
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content, "Redesign my essay prompt");
        assert!(msg.attachments.is_empty());
    }

    #[test]
    fn test_user_turn_defaults_when_only_files() {
        let msg = Message::user_turn(None, vec![FileRef::new("file-1")]);
        assert_eq!(msg.content, DEFAULT_ATTACHMENT_PROMPT);
        assert_eq!(msg.attachments.len(), 1);

        let blank = Message::user_turn(Some("   "), vec![FileRef::new("file-2")]);
        assert_eq!(blank.content, DEFAULT_ATTACHMENT_PROMPT);
    }

    #[test]
    fn test_file_ref_omits_missing_name() {
        let json = serde_json::to_string(&FileRef::new("file-abc")).unwrap();
        assert_eq!(json, r#"{"id":"file-abc"}"#);
    }
}
