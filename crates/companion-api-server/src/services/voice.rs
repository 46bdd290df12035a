//! Speech collaborators (speech-to-text, text-to-speech) and the voice
//! message helpers built on top of them.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::VoiceConfig;
use crate::services::companion::{CompanionError, Language};

/// Audio container formats accepted for voice messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Flac,
    Aiff,
}

impl AudioFormat {
    /// Sniff the container from magic bytes
    pub fn detect(audio: &[u8]) -> Option<Self> {
        if infer::audio::is_wav(audio) {
            Some(Self::Wav)
        } else if infer::audio::is_flac(audio) {
            Some(Self::Flac)
        } else if infer::audio::is_aiff(audio) {
            Some(Self::Aiff)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Flac => "flac",
            Self::Aiff => "aiff",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Flac => "audio/flac",
            Self::Aiff => "audio/aiff",
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe audio to text. `language` is a hint, not a constraint.
    async fn transcribe(&self, audio_bytes: &[u8], format: AudioFormat, language: Language) -> Result<String>;

    fn provider_name(&self) -> &'static str;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>>;

    fn provider_name(&self) -> &'static str;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// OpenAI-compatible audio API client (`/v1/audio/transcriptions`, `/v1/audio/speech`)
#[derive(Clone)]
pub struct OpenAiSpeech {
    client: Client,
    config: VoiceConfig,
}

impl OpenAiSpeech {
    pub fn new(config: VoiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            config: VoiceConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
        })
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.config.api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.config.api_key)
        }
    }
}

#[async_trait]
impl SpeechToText for OpenAiSpeech {
    async fn transcribe(&self, audio_bytes: &[u8], format: AudioFormat, language: Language) -> Result<String> {
        let file = Part::bytes(audio_bytes.to_vec())
            .file_name(format!("voice.{}", format.extension()))
            .mime_str(format.mime_type())?;

        let form = Form::new()
            .part("file", file)
            .text("model", self.config.stt_model.clone())
            .text("language", language.code().to_string());

        let url = format!("{}/v1/audio/transcriptions", self.config.base_url);
        let response = self
            .authorized(self.client.post(&url))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Transcription API error ({status}): {error_text}");
        }

        let transcription: TranscriptionResponse = response.json().await?;
        debug!(
            "Transcribed {} bytes of {} audio into {} chars",
            audio_bytes.len(),
            format.extension(),
            transcription.text.len()
        );

        Ok(transcription.text)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

#[async_trait]
impl TextToSpeech for OpenAiSpeech {
    async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>> {
        // The voice is multilingual; the language only shows up in logs
        let body = serde_json::json!({
            "model": self.config.tts_model,
            "input": text,
            "voice": self.config.tts_voice,
            "response_format": "mp3"
        });

        let url = format!("{}/v1/audio/speech", self.config.base_url);
        let response = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Speech API error ({status}): {error_text}");
        }

        let bytes = response.bytes().await?;
        info!(
            "Synthesized {} chars ({}) into {} bytes",
            text.len(),
            language,
            bytes.len()
        );

        Ok(bytes.to_vec())
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Voice message pipeline pieces with user-facing error mapping
pub struct VoiceProcessor {
    stt: Arc<dyn SpeechToText>,
    tts: Arc<dyn TextToSpeech>,
    bytes_per_second: usize,
}

impl VoiceProcessor {
    pub fn new(stt: Arc<dyn SpeechToText>, tts: Arc<dyn TextToSpeech>, bytes_per_second: usize) -> Self {
        Self {
            stt,
            tts,
            bytes_per_second: bytes_per_second.max(1),
        }
    }

    pub fn validate_audio_format(&self, audio: &[u8]) -> Result<AudioFormat, CompanionError> {
        AudioFormat::detect(audio).ok_or(CompanionError::InvalidAudioFormat)
    }

    /// Rough length estimate from the byte count
    pub fn audio_duration_seconds(&self, audio: &[u8]) -> f64 {
        audio.len() as f64 / self.bytes_per_second as f64
    }

    pub async fn speech_to_text(
        &self,
        audio: &[u8],
        format: AudioFormat,
        language: Language,
    ) -> Result<String, CompanionError> {
        match self.stt.transcribe(audio, format, language).await {
            Ok(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            Ok(_) => {
                warn!("Transcription by {} came back empty", self.stt.provider_name());
                Err(CompanionError::VoiceProcessingFailed(
                    "Could not understand the audio. Please speak clearly.".to_string(),
                ))
            }
            Err(e) => {
                error!("Speech recognition via {} failed: {:#}", self.stt.provider_name(), e);
                Err(CompanionError::VoiceProcessingFailed(
                    "Speech recognition service is temporarily unavailable.".to_string(),
                ))
            }
        }
    }

    pub async fn text_to_speech(&self, text: &str, language: Language) -> Result<Vec<u8>, CompanionError> {
        match self.tts.synthesize(text, language).await {
            Ok(audio) if !audio.is_empty() => Ok(audio),
            Ok(_) => {
                error!("Speech synthesis via {} returned no audio", self.tts.provider_name());
                Err(CompanionError::VoiceProcessingFailed(
                    "Could not generate speech audio.".to_string(),
                ))
            }
            Err(e) => {
                error!("Speech synthesis via {} failed: {:#}", self.tts.provider_name(), e);
                Err(CompanionError::VoiceProcessingFailed(
                    "Could not generate speech audio.".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn wav_bytes(len: usize) -> Vec<u8> {
        let mut audio = b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec();
        audio.resize(len.max(audio.len()), 0);
        audio
    }

    fn config(base_url: String) -> VoiceConfig {
        VoiceConfig {
            base_url,
            api_key: "test-key".to_string(),
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            timeout_seconds: 5,
        }
    }

    fn processor(stt: MockSpeechToText, tts: MockTextToSpeech) -> VoiceProcessor {
        VoiceProcessor::new(Arc::new(stt), Arc::new(tts), 16_000)
    }

    fn named_stt() -> MockSpeechToText {
        let mut stt = MockSpeechToText::new();
        stt.expect_provider_name().return_const("mock");
        stt
    }

    fn named_tts() -> MockTextToSpeech {
        let mut tts = MockTextToSpeech::new();
        tts.expect_provider_name().return_const("mock");
        tts
    }

    #[test]
    fn test_audio_format_detection() {
        assert_eq!(AudioFormat::detect(&wav_bytes(64)), Some(AudioFormat::Wav));
        assert_eq!(AudioFormat::detect(b"fLaC\x00\x00\x00\x22"), Some(AudioFormat::Flac));
        assert_eq!(
            AudioFormat::detect(b"FORM\x00\x00\x00\x00AIFFCOMM"),
            Some(AudioFormat::Aiff)
        );
        assert_eq!(AudioFormat::detect(b"ID3\x03\x00\x00\x00\x00"), None);
        assert_eq!(AudioFormat::detect(b""), None);
    }

    #[test]
    fn test_validation_and_duration() {
        let voice = processor(MockSpeechToText::new(), MockTextToSpeech::new());
        assert!(matches!(
            voice.validate_audio_format(b"not audio at all"),
            Err(CompanionError::InvalidAudioFormat)
        ));
        assert_eq!(voice.validate_audio_format(&wav_bytes(32)).unwrap(), AudioFormat::Wav);
        assert_eq!(voice.audio_duration_seconds(&wav_bytes(48_000)), 3.0);
    }

    #[tokio::test]
    async fn test_empty_transcript_is_unintelligible() {
        let mut stt = named_stt();
        stt.expect_transcribe().returning(|_, _, _| Ok("   ".to_string()));

        let voice = processor(stt, MockTextToSpeech::new());
        let err = voice
            .speech_to_text(&wav_bytes(64), AudioFormat::Wav, Language::En)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Could not understand the audio. Please speak clearly.");
    }

    #[tokio::test]
    async fn test_stt_and_tts_failures_are_sanitized() {
        let mut stt = named_stt();
        stt.expect_transcribe()
            .returning(|_, _, _| Err(anyhow::anyhow!("connection reset by peer")));
        let mut tts = named_tts();
        tts.expect_synthesize()
            .returning(|_, _| Err(anyhow::anyhow!("quota exceeded")));

        let voice = processor(stt, tts);
        let err = voice
            .speech_to_text(&wav_bytes(64), AudioFormat::Wav, Language::En)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Speech recognition service is temporarily unavailable.");

        let err = voice.text_to_speech("hello", Language::En).await.unwrap_err();
        assert_eq!(err.to_string(), "Could not generate speech audio.");
    }

    #[tokio::test]
    async fn test_openai_transcription() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"text": "Ich bin müde"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let speech = OpenAiSpeech::new(config(server.uri())).unwrap();
        let text = speech
            .transcribe(&wav_bytes(64), AudioFormat::Wav, Language::De)
            .await
            .unwrap();
        assert_eq!(text, "Ich bin müde");
    }

    #[tokio::test]
    async fn test_openai_synthesis() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/speech"))
            .and(body_partial_json(serde_json::json!({
                "model": "tts-1",
                "voice": "alloy",
                "input": "Take a deep breath."
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xFB, 0x90, 0x00]))
            .expect(1)
            .mount(&server)
            .await;

        let speech = OpenAiSpeech::new(config(format!("{}/", server.uri()))).unwrap();
        let audio = speech.synthesize("Take a deep breath.", Language::En).await.unwrap();
        assert_eq!(audio, vec![0xFF, 0xFB, 0x90, 0x00]);
    }

    #[tokio::test]
    async fn test_openai_error_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/speech"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let speech = OpenAiSpeech::new(config(server.uri())).unwrap();
        assert!(speech.synthesize("hi", Language::En).await.is_err());
    }
}
