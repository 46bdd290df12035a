use thiserror::Error;

/// Why the text-generation call failed. Only the kind leaves the service;
/// the raw cause is logged where it happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiFailureKind {
    RateLimited,
    Api,
    Unknown,
}

impl AiFailureKind {
    /// Empathetic text shown to the user for this failure kind
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::RateLimited => {
                "I'm receiving too many requests right now. Please try again in a moment."
            }
            Self::Api => "I'm having trouble connecting to my AI service. Please try again.",
            Self::Unknown => "I'm experiencing technical difficulties. Please try again later.",
        }
    }
}

#[derive(Error, Debug)]
pub enum CompanionError {
    #[error("{}", .0.user_message())]
    AiServiceUnavailable(AiFailureKind),

    #[error("{0}")]
    VoiceProcessingFailed(String),

    #[error("Session not found or not active")]
    SessionNotFound,

    #[error("Voice messages require premium subscription")]
    PremiumRequired,

    #[error("Invalid audio format. Supported formats: WAV, FLAC, AIFF")]
    InvalidAudioFormat,

    #[error("{0}")]
    MeetingServiceUnavailable(String),

    #[error("Could not validate credentials")]
    UnknownUser,

    #[error("Inactive user")]
    InactiveUser,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<anyhow::Error> for CompanionError {
    fn from(e: anyhow::Error) -> Self {
        CompanionError::Storage(format!("{:#}", e))
    }
}
