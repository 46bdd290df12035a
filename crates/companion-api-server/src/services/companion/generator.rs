use std::sync::Arc;
use tracing::{debug, error, info};

use super::error::CompanionError;
use super::localization::{prompt_for_language, Language};
use super::store::{ConversationStore, ExchangeGuard, UserId};
use super::types::{Role, UserContext};
use crate::models::chat::ChatMessage;
use crate::services::llm_service::{CompletionRequest, LlmProvider};

pub const TEMPERATURE: f32 = 0.7;
pub const MAX_TOKENS: usize = 500;
pub const PRESENCE_PENALTY: f32 = 0.1;
pub const FREQUENCY_PENALTY: f32 = 0.1;

/// Produces one assistant reply per exchange and commits it to the
/// user's conversation window.
pub struct ResponseGenerator {
    llm: Arc<dyn LlmProvider>,
    store: Arc<ConversationStore>,
    model: String,
}

impl ResponseGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, store: Arc<ConversationStore>, model: impl Into<String>) -> Self {
        Self {
            llm,
            store,
            model: model.into(),
        }
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Generate a reply to `user_message` for the user holding `exchange`.
    ///
    /// History is committed only after the upstream call succeeded: a failed
    /// call leaves it unchanged.
    pub async fn generate(
        &self,
        exchange: &ExchangeGuard,
        user_message: &str,
        language: Language,
        user_context: Option<&UserContext>,
    ) -> Result<String, CompanionError> {
        let user_id = exchange.user_id();
        let request = self.build_request(user_message, language, user_id, user_context);
        debug!(
            "Generating reply for user {} ({} context messages, language={})",
            user_id,
            request.messages.len(),
            language
        );

        match self.llm.complete(&request).await {
            Ok(reply) => {
                self.store.append(user_id, Role::User, user_message);
                self.store.append(user_id, Role::Assistant, reply.clone());
                info!("Generated reply for user {} ({} chars)", user_id, reply.len());
                Ok(reply)
            }
            Err(failure) => {
                error!("Response generation failed for user {}: {}", user_id, failure);
                Err(CompanionError::AiServiceUnavailable(failure.kind()))
            }
        }
    }

    fn build_request(
        &self,
        user_message: &str,
        language: Language,
        user_id: UserId,
        user_context: Option<&UserContext>,
    ) -> CompletionRequest {
        let history = self.store.history_for(user_id);

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(prompt_for_language(language, user_context)));
        messages.extend(history.iter().map(|entry| entry.to_chat_message()));
        messages.push(ChatMessage::user(user_message));

        CompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            presence_penalty: PRESENCE_PENALTY,
            frequency_penalty: FREQUENCY_PENALTY,
            stream: false,
        }
    }
}
