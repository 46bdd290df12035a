use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub llm: LlmConfig,
    pub voice: VoiceConfig,
    pub meeting: MeetingConfig,
    pub companion: CompanionConfig,
    #[serde(default)]
    pub activity_log: ActivityLogConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_max_size: u32,
    pub pool_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VoiceConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    pub stt_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct MeetingConfig {
    pub zoom_api_key: Option<String>,
    pub zoom_api_secret: Option<String>,
    pub google_meet_api_key: Option<String>,
    /// Rooms older than this are dropped by the hourly sweep
    pub max_room_age_hours: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CompanionConfig {
    pub default_language: String,
    pub history_cap: usize,
    /// Bytes per second assumed when estimating voice message length
    pub audio_bytes_per_second: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ActivityLogConfig {
    pub enabled: bool,
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub batch_timeout_ms: u64,
    pub worker_count: usize,
}

impl Default for ActivityLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_capacity: 10_000,
            batch_size: 100,
            batch_timeout_ms: 1000,
            worker_count: 2,
        }
    }
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            history_cap: 20,
            audio_bytes_per_second: 16_000,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(true))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }
}
