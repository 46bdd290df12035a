use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::services::companion::CompanionError;

/// Shown for every 5xx that is not a named upstream outage
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("AI service error: {0}")]
    AiServiceError(String),

    #[error("Voice processing error: {0}")]
    VoiceProcessingError(String),

    #[error("Meeting error: {0}")]
    MeetingError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl From<CompanionError> for ApiError {
    fn from(err: CompanionError) -> Self {
        match err {
            CompanionError::AiServiceUnavailable(kind) => {
                ApiError::AiServiceError(kind.user_message().to_string())
            }
            CompanionError::VoiceProcessingFailed(msg) => ApiError::VoiceProcessingError(msg),
            e @ CompanionError::SessionNotFound => ApiError::NotFound(e.to_string()),
            e @ CompanionError::PremiumRequired => ApiError::Forbidden(e.to_string()),
            e @ CompanionError::InvalidAudioFormat => ApiError::BadRequest(e.to_string()),
            CompanionError::MeetingServiceUnavailable(msg) => ApiError::MeetingError(msg),
            e @ CompanionError::UnknownUser => ApiError::Unauthorized(e.to_string()),
            e @ CompanionError::InactiveUser => ApiError::BadRequest(e.to_string()),
            CompanionError::Storage(msg) => ApiError::DatabaseError(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized: {}", msg);
                (StatusCode::UNAUTHORIZED, "Unauthorized", msg)
            }
            ApiError::Forbidden(msg) => {
                tracing::warn!("Forbidden: {}", msg);
                (StatusCode::FORBIDDEN, "Forbidden", msg)
            }
            ApiError::NotFound(msg) => {
                tracing::warn!("Not found: {}", msg);
                (StatusCode::NOT_FOUND, "NotFound", msg)
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, "BadRequest", msg)
            }
            ApiError::AiServiceError(msg) => {
                tracing::error!("AI service error: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "AIServiceError", msg)
            }
            ApiError::VoiceProcessingError(msg) => {
                tracing::warn!("Voice processing error: {}", msg);
                (StatusCode::UNPROCESSABLE_ENTITY, "VoiceProcessingError", msg)
            }
            ApiError::MeetingError(msg) => {
                tracing::error!("Meeting error: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "MeetingError", msg)
            }
            ApiError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalServerError",
                    GENERIC_ERROR_MESSAGE.to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}
