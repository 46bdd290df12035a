use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::{MessageRecord, SessionRecord};
use crate::services::companion::{EndedSession, MessageExchange, VoiceExchange};

fn default_meeting_platform() -> String {
    "webrtc".to_string()
}

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub preferred_language: Option<String>,
    /// webrtc, zoom or google_meet
    #[serde(default = "default_meeting_platform")]
    pub meeting_platform: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: i64,
    pub session_id: String,
    pub language: String,
    pub status: String,
    pub meeting_id: Option<String>,
    pub meeting_platform: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<SessionRecord> for SessionResponse {
    fn from(record: SessionRecord) -> Self {
        Self {
            id: record.id,
            session_id: record.session_id,
            language: record.language,
            status: record.status,
            meeting_id: record.meeting_id,
            meeting_platform: record.meeting_platform,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: i64,
    pub role: String,
    pub content: String,
    pub language: String,
    pub audio_duration: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl From<MessageRecord> for MessageResponse {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: record.id,
            role: record.role,
            content: record.content,
            language: record.language,
            audio_duration: record.audio_duration,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    #[serde(flatten)]
    pub message: MessageResponse,
    pub crisis_detected: bool,
}

impl From<MessageExchange> for SendMessageResponse {
    fn from(exchange: MessageExchange) -> Self {
        Self {
            message: exchange.message.into(),
            crisis_detected: exchange.crisis_detected,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VoiceMessageResponse {
    pub user_message: String,
    pub ai_response: String,
    pub language: String,
    /// Base64 encoded audio
    pub response_audio: Option<String>,
    pub session_id: String,
    pub crisis_detected: bool,
}

impl From<VoiceExchange> for VoiceMessageResponse {
    fn from(exchange: VoiceExchange) -> Self {
        Self {
            user_message: exchange.user_message,
            ai_response: exchange.ai_response,
            language: exchange.language.code().to_string(),
            response_audio: Some(STANDARD.encode(&exchange.response_audio)),
            session_id: exchange.session_id,
            crisis_detected: exchange.crisis_detected,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EndSessionResponse {
    pub message: String,
    pub duration_minutes: i32,
}

impl From<EndedSession> for EndSessionResponse {
    fn from(ended: EndedSession) -> Self {
        Self {
            message: "Session ended successfully".to_string(),
            duration_minutes: ended.duration_minutes,
        }
    }
}
