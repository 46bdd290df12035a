#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use companion_api_server::config::MeetingConfig;
use companion_api_server::database::{InMemorySessionRepository, UserAccount};
use companion_api_server::logging::ActivityLogger;
use companion_api_server::services::companion::{
    ConversationStore, Language, ResponseGenerator, SessionCoordinator,
};
use companion_api_server::services::llm_service::{CompletionRequest, LlmFailure, LlmProvider};
use companion_api_server::services::voice::AudioFormat;
use companion_api_server::services::{
    LanguageDetector, MeetingIntegration, SpeechToText, TextToSpeech, VoiceProcessor,
};

pub const FREE_USER: i64 = 1;
pub const PREMIUM_USER: i64 = 2;

/// Replies with a fixed text, or fails every call when `failing` is set.
/// `delay` holds each call open before answering.
#[derive(Default)]
pub struct ScriptedLlm {
    pub reply: String,
    pub failing: bool,
    pub delay: Option<Duration>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            ..Default::default()
        }
    }

    pub fn slow(reply: &str, delay: Duration) -> Self {
        Self {
            reply: reply.to_string(),
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmFailure> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            return Err(LlmFailure::Api("upstream returned 500".to_string()));
        }
        Ok(self.reply.clone())
    }
}

pub struct FixedLanguage(pub Language);

impl LanguageDetector for FixedLanguage {
    fn detect(&self, _text: &str, _fallback: Language) -> Language {
        self.0
    }
}

pub struct EchoSpeech {
    pub transcript: String,
}

#[async_trait]
impl SpeechToText for EchoSpeech {
    async fn transcribe(&self, _audio: &[u8], _format: AudioFormat, _language: Language) -> Result<String> {
        Ok(self.transcript.clone())
    }

    fn provider_name(&self) -> &'static str {
        "echo"
    }
}

#[async_trait]
impl TextToSpeech for EchoSpeech {
    async fn synthesize(&self, text: &str, _language: Language) -> Result<Vec<u8>> {
        if text.is_empty() {
            return Err(anyhow!("nothing to say"));
        }
        Ok(vec![0u8; 32_000])
    }

    fn provider_name(&self) -> &'static str {
        "echo"
    }
}

/// RIFF/WAVE header padded with silence to exactly one second at 16 kB/s
pub fn wav_bytes() -> Vec<u8> {
    let mut bytes = b"RIFF\x24\x7d\x00\x00WAVEfmt ".to_vec();
    bytes.resize(16_000, 0);
    bytes
}

pub struct Harness {
    pub coordinator: Arc<SessionCoordinator>,
    pub llm: Arc<ScriptedLlm>,
    pub repo: Arc<InMemorySessionRepository>,
}

pub async fn harness(llm: ScriptedLlm, detected: Language) -> Harness {
    let repo = Arc::new(InMemorySessionRepository::new());
    repo.upsert_user(UserAccount {
        id: FREE_USER,
        is_active: true,
        is_premium: false,
        preferred_language: None,
    })
    .await;
    repo.upsert_user(UserAccount {
        id: PREMIUM_USER,
        is_active: true,
        is_premium: true,
        preferred_language: Some("es".to_string()),
    })
    .await;

    let llm = Arc::new(llm);
    let store = Arc::new(ConversationStore::new(20));
    let speech = Arc::new(EchoSpeech {
        transcript: "Estoy un poco cansado hoy".to_string(),
    });

    let coordinator = Arc::new(SessionCoordinator::new(
        repo.clone(),
        ResponseGenerator::new(llm.clone(), store, "test-model"),
        Arc::new(FixedLanguage(detected)),
        VoiceProcessor::new(speech.clone(), speech, 16_000),
        Arc::new(MeetingIntegration::new(&MeetingConfig::default())),
        ActivityLogger::disabled(),
        Language::En,
    ));

    Harness { coordinator, llm, repo }
}
