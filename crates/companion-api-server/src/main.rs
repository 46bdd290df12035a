use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use companion_api_server::auth::JwtManager;
use companion_api_server::build_router;
use companion_api_server::config::{Settings, StorageBackend};
use companion_api_server::database::{DbPool, InMemorySessionRepository, PgSessionRepository, SessionRepository};
use companion_api_server::logging::{ActivityLogger, LoggerConfig};
use companion_api_server::services::companion::{ConversationStore, Language, ResponseGenerator, SessionCoordinator};
use companion_api_server::services::{
    LlmService, MeetingIntegration, OpenAiSpeech, VoiceProcessor, WhatlangDetector,
};
use companion_api_server::AppState;

/// How often stale meeting rooms are swept
const MEETING_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,companion_api_server=debug".to_string()),
        )
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .init();

    info!("Starting Companion API Server...");

    // Load configuration
    let settings = Settings::load()?;
    info!("Configuration loaded (storage={:?})", settings.storage.backend);

    // Storage and activity log
    let activity_config = LoggerConfig::from(&settings.activity_log);
    let (repository, activity): (Arc<dyn SessionRepository>, ActivityLogger) =
        match settings.storage.backend {
            StorageBackend::Postgres => {
                let db_pool = DbPool::new(&settings.database).await?;
                info!("Database connection established");

                let activity = if settings.activity_log.enabled {
                    ActivityLogger::new(db_pool.get_pool().clone(), activity_config)
                } else {
                    ActivityLogger::disabled()
                };
                let repository: Arc<dyn SessionRepository> = Arc::new(PgSessionRepository::new(db_pool));
                (repository, activity)
            }
            StorageBackend::Memory => {
                warn!("Using in-memory storage: sessions are lost on restart");
                let activity = if settings.activity_log.enabled {
                    ActivityLogger::tracing_only()
                } else {
                    ActivityLogger::disabled()
                };
                let repository: Arc<dyn SessionRepository> =
                    Arc::new(InMemorySessionRepository::new().with_auto_provisioning());
                (repository, activity)
            }
        };

    // Collaborators
    let llm_service = Arc::new(LlmService::new(settings.llm.clone())?);
    let speech = Arc::new(OpenAiSpeech::new(settings.voice.clone())?);
    let meetings = Arc::new(MeetingIntegration::new(&settings.meeting));

    let store = Arc::new(ConversationStore::new(settings.companion.history_cap));
    let generator = ResponseGenerator::new(llm_service.clone(), store, llm_service.model());
    let voice = VoiceProcessor::new(
        speech.clone(),
        speech,
        settings.companion.audio_bytes_per_second,
    );

    let default_language = Language::resolve(&settings.companion.default_language);
    let coordinator = Arc::new(SessionCoordinator::new(
        repository,
        generator,
        Arc::new(WhatlangDetector::new()),
        voice,
        meetings.clone(),
        activity,
        default_language,
    ));

    // Hourly sweep of stale meeting rooms
    let max_room_age = chrono::Duration::hours(settings.meeting.max_room_age_hours as i64);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MEETING_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = meetings.cleanup_old(max_room_age);
            if removed > 0 {
                info!("Meeting sweep removed {} stale rooms", removed);
            }
        }
    });

    let state = AppState {
        coordinator,
        jwt: Arc::new(JwtManager::new(
            &settings.auth.jwt_secret,
            settings.auth.token_expiry_seconds,
        )),
    };

    let app = build_router(state, settings.server.max_body_bytes);

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
