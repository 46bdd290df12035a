pub mod companion;
pub mod language_detector;
pub mod llm_service;
pub mod meeting;
pub mod voice;

pub use language_detector::{LanguageDetector, WhatlangDetector};
pub use llm_service::{LlmProvider, LlmService};
pub use meeting::{MeetingIntegration, MeetingPlatform, MeetingProvider};
pub use voice::{OpenAiSpeech, SpeechToText, TextToSpeech, VoiceProcessor};
