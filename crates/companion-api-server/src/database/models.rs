use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::services::companion::{Role, UserContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SessionRecord {
    pub id: i64,
    pub session_id: String,
    pub user_id: i64,
    pub language: String,
    pub duration_minutes: i32,
    pub message_count: i32,
    pub meeting_id: Option<String>,
    pub meeting_platform: Option<String>,
    pub status: String, // "active" or "completed"
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active.as_str()
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MessageRecord {
    pub id: i64,
    /// ai_sessions.id of the owning session
    pub session_pk: i64,
    pub role: String,
    pub content: String,
    pub language: String,
    pub audio_duration: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Read-only view of the account row
#[derive(Debug, Clone, FromRow)]
pub struct UserAccount {
    pub id: i64,
    pub is_active: bool,
    pub is_premium: bool,
    pub preferred_language: Option<String>,
}

#[derive(Debug, Clone, Default, FromRow)]
pub struct UserProfile {
    pub user_id: i64,
    pub display_name: Option<String>,
    pub interests: Option<String>,
    pub emotional_needs: Option<String>,
}

impl UserProfile {
    pub fn to_context(&self) -> UserContext {
        UserContext {
            preferred_name: self.display_name.clone(),
            interests: self.interests.clone(),
            emotional_needs: self.emotional_needs.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub session_id: String,
    pub user_id: i64,
    pub language: String,
    pub meeting_id: Option<String>,
    pub meeting_platform: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    pub language: String,
    pub audio_duration: Option<f64>,
}

impl NewMessage {
    pub fn text(role: Role, content: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            language: language.into(),
            audio_duration: None,
        }
    }

    pub fn with_audio_duration(mut self, seconds: f64) -> Self {
        self.audio_duration = Some(seconds);
        self
    }
}
