use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::AuthUser;
use crate::models::session::*;
use crate::services::companion::{SessionCoordinator, SupportedLanguages};
use crate::services::meeting::MeetingPlatform;
use crate::utils::error::ApiError;

/// Multipart field carrying the recorded audio
const AUDIO_FIELD: &str = "audio_file";

pub async fn start_session_handler(
    State(coordinator): State<Arc<SessionCoordinator>>,
    user: AuthUser,
    Json(request): Json<StartSessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    info!(
        "Start session: user={}, language={:?}, platform={}",
        user.user_id, request.preferred_language, request.meeting_platform
    );

    let session = coordinator
        .start_session(
            user.user_id,
            request.preferred_language.as_deref(),
            MeetingPlatform::parse(&request.meeting_platform),
        )
        .await?;

    Ok(Json(session.into()))
}

pub async fn send_message_handler(
    State(coordinator): State<Arc<SessionCoordinator>>,
    user: AuthUser,
    Query(query): Query<SessionQuery>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    if request.content.trim().is_empty() {
        return Err(ApiError::BadRequest("Message content must not be empty".to_string()));
    }
    debug!(
        "Message: user={}, session={}, len={}",
        user.user_id,
        query.session_id,
        request.content.len()
    );

    let exchange = coordinator
        .send_message(user.user_id, &query.session_id, &request.content)
        .await?;

    Ok(Json(exchange.into()))
}

pub async fn voice_message_handler(
    State(coordinator): State<Arc<SessionCoordinator>>,
    user: AuthUser,
    Query(query): Query<SessionQuery>,
    mut multipart: Multipart,
) -> Result<Json<VoiceMessageResponse>, ApiError> {
    let mut audio = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some(AUDIO_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read audio: {}", e)))?;
            audio = Some(bytes);
            break;
        }
    }

    let audio = audio.ok_or_else(|| {
        ApiError::BadRequest(format!("Missing multipart field '{}'", AUDIO_FIELD))
    })?;
    debug!(
        "Voice message: user={}, session={}, bytes={}",
        user.user_id,
        query.session_id,
        audio.len()
    );

    let exchange = coordinator
        .send_voice_message(user.user_id, &query.session_id, &audio)
        .await?;

    Ok(Json(exchange.into()))
}

pub async fn session_messages_handler(
    State(coordinator): State<Arc<SessionCoordinator>>,
    user: AuthUser,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let messages = coordinator.session_messages(user.user_id, &session_id).await?;
    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

pub async fn end_session_handler(
    State(coordinator): State<Arc<SessionCoordinator>>,
    user: AuthUser,
    Path(session_id): Path<String>,
) -> Result<Json<EndSessionResponse>, ApiError> {
    let ended = coordinator.end_session(user.user_id, &session_id).await?;
    Ok(Json(ended.into()))
}

pub async fn list_sessions_handler(
    State(coordinator): State<Arc<SessionCoordinator>>,
    user: AuthUser,
) -> Result<Json<Vec<SessionResponse>>, ApiError> {
    let sessions = coordinator.list_sessions(user.user_id).await?;
    Ok(Json(sessions.into_iter().map(Into::into).collect()))
}

pub async fn supported_languages_handler(
    State(coordinator): State<Arc<SessionCoordinator>>,
) -> Json<SupportedLanguages> {
    Json(coordinator.supported_languages())
}
