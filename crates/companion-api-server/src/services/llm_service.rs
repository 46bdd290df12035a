use crate::config::LlmConfig;
use crate::models::chat::ChatMessage;
use crate::services::companion::AiFailureKind;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    pub stream: bool,
}

/// Upstream failure, classified. The message is for logs only.
#[derive(Error, Debug)]
pub enum LlmFailure {
    #[error("rate limited by LLM API: {0}")]
    RateLimited(String),

    #[error("LLM API error: {0}")]
    Api(String),

    #[error("LLM call failed: {0}")]
    Unknown(String),
}

impl LlmFailure {
    pub fn kind(&self) -> AiFailureKind {
        match self {
            Self::RateLimited(_) => AiFailureKind::RateLimited,
            Self::Api(_) => AiFailureKind::Api,
            Self::Unknown(_) => AiFailureKind::Unknown,
        }
    }
}

/// Text-generation collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmFailure>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

/// OpenAI-compatible chat completion client
#[derive(Clone)]
pub struct LlmService {
    client: Client,
    config: LlmConfig,
}

impl LlmService {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config: LlmConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Generate completion without streaming (wait for full response)
    pub async fn generate_chat(&self, request: &CompletionRequest) -> Result<String, LlmFailure> {
        debug!(
            "Starting chat generation with {} messages (model={})",
            request.messages.len(),
            request.model
        );

        let mut builder = self
            .client
            .post(format!("{}/v1/chat/completions", self.config.base_url))
            .json(request);
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LlmFailure::Unknown(format!("Failed to call LLM API: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = format!("{} - {}", status, body);
            return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                LlmFailure::RateLimited(detail)
            } else {
                LlmFailure::Api(detail)
            });
        }

        let chat_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmFailure::Api(format!("Failed to parse LLM response: {}", e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LlmFailure::Api("No completion returned from LLM".to_string()))
    }
}

#[async_trait]
impl LlmProvider for LlmService {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmFailure> {
        self.generate_chat(request).await
    }
}
