//! Meeting room bookkeeping for companion sessions.
//!
//! Rooms are placeholders held in process memory: no platform SDK is called.
//! Zoom and Google Meet are offered only when their credentials are
//! configured; WebRTC is always available and is the fallback.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::MeetingConfig;
use crate::services::companion::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingPlatform {
    Zoom,
    GoogleMeet,
    #[serde(rename = "webrtc")]
    WebRtc,
}

impl MeetingPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zoom => "zoom",
            Self::GoogleMeet => "google_meet",
            Self::WebRtc => "webrtc",
        }
    }

    /// Unknown names map to WebRTC
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "zoom" => Self::Zoom,
            "google_meet" => Self::GoogleMeet,
            _ => Self::WebRtc,
        }
    }
}

impl std::fmt::Display for MeetingPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Created,
    AiJoined,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingRoom {
    pub id: String,
    pub platform: MeetingPlatform,
    pub join_url: String,
    pub user_id: UserId,
    pub status: MeetingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ice_servers: Vec<IceServer>,
    pub created_at: DateTime<Utc>,
    pub ai_joined_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl MeetingRoom {
    pub fn is_active(&self) -> bool {
        matches!(self.status, MeetingStatus::Created | MeetingStatus::AiJoined)
    }
}

/// Meeting room capability used by the session coordinator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MeetingProvider: Send + Sync {
    /// Create a room on `platform`, or on WebRTC when that platform is unavailable
    async fn create_meeting(&self, user_id: UserId, platform: MeetingPlatform) -> Result<MeetingRoom>;

    /// Mark the assistant as present in the room. False when the room is unknown.
    async fn join_as_bot(&self, meeting_id: &str) -> bool;

    /// Ok(false) when the room is unknown
    async fn end_meeting(&self, meeting_id: &str) -> Result<bool>;

    /// platform name -> available
    fn platforms(&self) -> BTreeMap<&'static str, bool>;
}

pub struct MeetingIntegration {
    rooms: DashMap<String, MeetingRoom>,
    zoom_configured: bool,
    google_meet_configured: bool,
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl MeetingIntegration {
    pub fn new(config: &MeetingConfig) -> Self {
        let zoom_configured = is_set(&config.zoom_api_key) && is_set(&config.zoom_api_secret);
        let google_meet_configured = is_set(&config.google_meet_api_key);
        info!(
            "Meeting integration ready (zoom={}, google_meet={}, webrtc=true)",
            zoom_configured, google_meet_configured
        );

        Self {
            rooms: DashMap::new(),
            zoom_configured,
            google_meet_configured,
        }
    }

    fn is_available(&self, platform: MeetingPlatform) -> bool {
        match platform {
            MeetingPlatform::Zoom => self.zoom_configured,
            MeetingPlatform::GoogleMeet => self.google_meet_configured,
            MeetingPlatform::WebRtc => true,
        }
    }

    fn build_room(user_id: UserId, platform: MeetingPlatform) -> MeetingRoom {
        let token = Uuid::new_v4().simple().to_string();
        let (id, join_url, password, ice_servers) = match platform {
            MeetingPlatform::Zoom => {
                let id = format!("zoom_{}_{}", user_id, token);
                let url = format!("https://zoom.us/j/{}", id);
                (id, url, Some(token[..10].to_string()), Vec::new())
            }
            MeetingPlatform::GoogleMeet => {
                let id = format!("meet_{}_{}", user_id, token);
                let url = format!("https://meet.google.com/{}", id);
                (id, url, None, Vec::new())
            }
            MeetingPlatform::WebRtc => {
                let id = format!("simple_{}_{}", user_id, token);
                let url = format!("/meeting/{}", id);
                let ice = vec![
                    IceServer { urls: "stun:stun.l.google.com:19302".to_string() },
                    IceServer { urls: "stun:stun1.l.google.com:19302".to_string() },
                ];
                (id, url, None, ice)
            }
        };

        MeetingRoom {
            id,
            platform,
            join_url,
            user_id,
            status: MeetingStatus::Created,
            password,
            ice_servers,
            created_at: Utc::now(),
            ai_joined_at: None,
            ended_at: None,
        }
    }

    pub fn meeting_info(&self, meeting_id: &str) -> Option<MeetingRoom> {
        self.rooms.get(meeting_id).map(|room| room.clone())
    }

    /// Rooms of the user that are created or joined
    pub fn active_meetings(&self, user_id: UserId) -> Vec<MeetingRoom> {
        self.rooms
            .iter()
            .filter(|room| room.user_id == user_id && room.is_active())
            .map(|room| room.clone())
            .collect()
    }

    /// Drop rooms created longer than `max_age` ago. Returns how many were removed.
    pub fn cleanup_old(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let before = self.rooms.len();
        self.rooms.retain(|id, room| {
            let keep = room.created_at >= cutoff;
            if !keep {
                info!("Cleaned up old meeting {}", id);
            }
            keep
        });
        before.saturating_sub(self.rooms.len())
    }
}

#[async_trait]
impl MeetingProvider for MeetingIntegration {
    async fn create_meeting(&self, user_id: UserId, platform: MeetingPlatform) -> Result<MeetingRoom> {
        let platform = if self.is_available(platform) {
            platform
        } else {
            if platform != MeetingPlatform::WebRtc {
                warn!("Meeting platform {} is not configured, falling back to webrtc", platform);
            }
            MeetingPlatform::WebRtc
        };

        let room = Self::build_room(user_id, platform);
        self.rooms.insert(room.id.clone(), room.clone());
        info!("Created {} meeting {} for user {}", platform, room.id, user_id);

        Ok(room)
    }

    async fn join_as_bot(&self, meeting_id: &str) -> bool {
        match self.rooms.get_mut(meeting_id) {
            Some(mut room) => {
                room.status = MeetingStatus::AiJoined;
                room.ai_joined_at = Some(Utc::now());
                info!("AI companion joined meeting {}", meeting_id);
                true
            }
            None => {
                warn!("Cannot join unknown meeting {}", meeting_id);
                false
            }
        }
    }

    async fn end_meeting(&self, meeting_id: &str) -> Result<bool> {
        match self.rooms.get_mut(meeting_id) {
            Some(mut room) => {
                room.status = MeetingStatus::Ended;
                room.ended_at = Some(Utc::now());
                info!("Meeting {} ended", meeting_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn platforms(&self) -> BTreeMap<&'static str, bool> {
        BTreeMap::from([
            (MeetingPlatform::Zoom.as_str(), self.zoom_configured),
            (MeetingPlatform::GoogleMeet.as_str(), self.google_meet_configured),
            (MeetingPlatform::WebRtc.as_str(), true),
        ])
    }
}
