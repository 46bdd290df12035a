use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Activity type categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    SessionStarted,
    MessageExchanged,
    VoiceExchanged,
    CrisisDetected,
    AiServiceError,
    SessionEnded,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionStarted => "session_started",
            Self::MessageExchanged => "message_exchanged",
            Self::VoiceExchanged => "voice_exchanged",
            Self::CrisisDetected => "crisis_detected",
            Self::AiServiceError => "ai_service_error",
            Self::SessionEnded => "session_ended",
        }
    }
}

/// Activity status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Success,
    Error,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Complete activity log entry
#[derive(Debug, Clone)]
pub struct ActivityLog {
    // Session & User
    pub session_id: String,
    pub user_id: i64,

    // Activity
    pub activity_type: ActivityType,
    pub activity_status: ActivityStatus,

    // Context
    pub language: Option<String>,
    pub message_length: Option<i32>,
    pub response_length: Option<i32>,

    // Performance
    pub processing_time_ms: Option<i32>,

    // Error
    pub error_message: Option<String>,
    pub error_type: Option<String>,

    /// Free-form extras, stored as JSONB
    pub details: Option<Value>,

    pub created_at: DateTime<Utc>,
}

impl ActivityLog {
    /// Create builder for fluent API
    pub fn builder(
        session_id: impl Into<String>,
        user_id: i64,
        activity_type: ActivityType,
    ) -> ActivityLogBuilder {
        ActivityLogBuilder::new(session_id.into(), user_id, activity_type)
    }
}

/// Builder pattern for ActivityLog
pub struct ActivityLogBuilder {
    log: ActivityLog,
    details: Map<String, Value>,
}

impl ActivityLogBuilder {
    pub fn new(session_id: String, user_id: i64, activity_type: ActivityType) -> Self {
        Self {
            log: ActivityLog {
                session_id,
                user_id,
                activity_type,
                activity_status: ActivityStatus::Success,
                language: None,
                message_length: None,
                response_length: None,
                processing_time_ms: None,
                error_message: None,
                error_type: None,
                details: None,
                created_at: Utc::now(),
            },
            details: Map::new(),
        }
    }

    pub fn language(mut self, code: impl Into<String>) -> Self {
        self.log.language = Some(code.into());
        self
    }

    /// Only sizes are logged, never message text
    pub fn message_length(mut self, text: &str) -> Self {
        self.log.message_length = Some(text.chars().count() as i32);
        self
    }

    pub fn response_length(mut self, text: &str) -> Self {
        self.log.response_length = Some(text.chars().count() as i32);
        self
    }

    pub fn processing_time(mut self, ms: i32) -> Self {
        self.log.processing_time_ms = Some(ms);
        self
    }

    pub fn error(mut self, message: impl Into<String>, error_type: impl Into<String>) -> Self {
        self.log.error_message = Some(message.into());
        self.log.error_type = Some(error_type.into());
        self.log.activity_status = ActivityStatus::Error;
        self
    }

    pub fn detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn build(mut self) -> ActivityLog {
        if !self.details.is_empty() {
            self.log.details = Some(Value::Object(self.details));
        }
        self.log
    }
}
