//! Message types for the conversation log.

use serde::{Deserialize, Serialize};

/// Role of a message in the conversation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageRole {
    User,
    Assistant,
    SpecialistResult,
    SystemNote,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::SpecialistResult => "specialist-result",
            Self::SystemNote => "system-note",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry in the conversation log.
///
/// Messages are only created by [`crate::TaskState`], which assigns the
/// sequence number. Once appended they are never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the entry
    pub role: MessageRole,

    /// Who produced it: a specialist id, `supervisor`, `validator`, `controller` or `user`
    pub author: String,

    /// Message content
    pub content: String,

    /// Position in the log, starting at 0
    pub sequence: u64,

    /// Timestamp (Unix millis)
    pub timestamp: u64,
}

impl Message {
    pub(crate) fn new(
        role: MessageRole,
        author: impl Into<String>,
        content: impl Into<String>,
        sequence: u64,
    ) -> Self {
        Self {
            role,
            author: author.into(),
            content: content.into(),
            sequence,
            timestamp: now_millis(),
        }
    }

    pub fn is_specialist_result(&self) -> bool {
        self.role == MessageRole::SpecialistResult
    }

    /// One-line rendering used when the log is embedded in a prompt.
    pub fn transcript_line(&self) -> String {
        format!("[{}] {} ({}): {}", self.sequence, self.author, self.role, self.content)
    }
}

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&MessageRole::SpecialistResult).unwrap(),
            "\"specialist-result\""
        );
        assert_eq!(
            serde_json::to_string(&MessageRole::SystemNote).unwrap(),
            "\"system-note\""
        );
        assert_eq!(serde_json::to_string(&MessageRole::User).unwrap(), "\"user\"");
    }

    #[test]
    fn role_display_matches_serde_name() {
        for role in [
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::SpecialistResult,
            MessageRole::SystemNote,
        ] {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json.trim_matches('"'), role.to_string());
        }
    }

    #[test]
    fn transcript_line_contains_author_and_role() {
        let msg = Message::new(MessageRole::SystemNote, "supervisor", "route to domain-lookup", 3);
        assert_eq!(
            msg.transcript_line(),
            "[3] supervisor (system-note): route to domain-lookup"
        );
        assert!(msg.timestamp > 0);
    }
}
