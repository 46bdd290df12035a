use serde::{Deserialize, Serialize};

use crate::models::chat::ChatMessage;

/// Speaker of a conversation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One turn held in the in-memory conversation window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationEntry {
    role: Role,
    content: String,
}

impl ConversationEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage::new(self.role.as_str(), self.content.clone())
    }
}

/// Per-request snapshot of what the user shared about themselves
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub preferred_name: Option<String>,
    pub interests: Option<String>,
    pub emotional_needs: Option<String>,
}

/// Message counts of a user's current conversation window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConversationSummary {
    pub user_messages: usize,
    pub assistant_messages: usize,
}

impl std::fmt::Display for ConversationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Conversation: {} user messages, {} AI responses",
            self.user_messages, self.assistant_messages
        )
    }
}
