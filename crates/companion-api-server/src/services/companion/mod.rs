//! Conversation and session management for the companion.

pub mod coordinator;
pub mod crisis;
pub mod error;
pub mod generator;
pub mod localization;
pub mod store;
pub mod types;

pub use coordinator::{
    EndedSession, MessageExchange, SessionCoordinator, SupportedLanguages, VoiceExchange,
};
pub use crisis::is_crisis_message;
pub use error::{AiFailureKind, CompanionError};
pub use generator::ResponseGenerator;
pub use localization::{greeting_for, prompt_for, supported_languages, Language};
pub use store::{ConversationStore, ExchangeGuard, UserId};
pub use types::{ConversationEntry, ConversationSummary, Role, UserContext};
