//! Heuristic detection of a finished assignment redesign.
//!
//! The web client offers a PDF export once a reply looks like a complete
//! redesigned assignment. The heuristic sits behind a trait so a smarter
//! classifier can replace it.

/// Decides whether an assistant reply is a complete redesign.
pub trait ReplyClassifier: Send + Sync {
    fn is_redesign_complete(&self, reply: &str) -> bool;
}

const ASSIGNMENT_INDICATORS: &[&str] = &[
    "assignment",
    "project title",
    "project:",
    "project idea",
    "redesign",
];

const COMPLETION_MARKERS: &[&str] = &[
    "here is",
    "here's",
    "redesigned",
    "completed",
    "ready for",
    "assignment for",
    "updated assignment",
    "revised assignment",
    "let's create",
    "i've created",
    "i've redesigned",
    "i've updated",
    "i've added",
    "i've enhanced",
    "i've revised",
    "i've modified",
    "created a project",
    "created an assignment",
    "updated the assignment",
    "revised the assignment",
    "complete revised version",
    "complete updated version",
    "here's the complete",
];

const MIN_REPLY_LEN: usize = 500;

/// Keyword heuristic: an assignment indicator, a completion marker, and
/// more than 500 characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl ReplyClassifier for KeywordClassifier {
    fn is_redesign_complete(&self, reply: &str) -> bool {
        if reply.chars().count() <= MIN_REPLY_LEN {
            return false;
        }
        let lower = reply.to_lowercase();
        // Markdown headings count as structure even without the keywords.
        let has_indicator =
            reply.contains("# ") || ASSIGNMENT_INDICATORS.iter().any(|k| lower.contains(k));
        let has_marker = COMPLETION_MARKERS.iter().any(|k| lower.contains(k));
        has_indicator && has_marker
    }
}
