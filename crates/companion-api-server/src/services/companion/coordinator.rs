use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::crisis::is_crisis_message;
use super::error::CompanionError;
use super::generator::ResponseGenerator;
use super::localization::{greeting_for_language, supported_languages, Language};
use super::store::{ConversationStore, ExchangeGuard, UserId};
use super::types::{Role, UserContext};
use crate::database::{MessageRecord, NewMessage, NewSession, SessionRecord, SessionRepository, UserAccount};
use crate::logging::{ActivityLog, ActivityLogger, ActivityType};
use crate::services::language_detector::LanguageDetector;
use crate::services::meeting::{MeetingPlatform, MeetingProvider};
use crate::services::voice::VoiceProcessor;

/// Most recent sessions returned by `list_sessions`
pub const SESSION_LIST_LIMIT: i64 = 50;

/// Whole minutes between start and end, rounded to nearest
pub fn duration_minutes(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> i32 {
    let millis = (ended_at - started_at).num_milliseconds().max(0);
    (millis as f64 / 60_000.0).round() as i32
}

#[derive(Debug, Clone)]
pub struct MessageExchange {
    pub message: MessageRecord,
    pub language: Language,
    pub crisis_detected: bool,
}

#[derive(Debug, Clone)]
pub struct VoiceExchange {
    pub session_id: String,
    pub user_message: String,
    pub ai_response: String,
    pub language: Language,
    pub response_audio: Vec<u8>,
    pub crisis_detected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndedSession {
    pub duration_minutes: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupportedLanguages {
    pub languages: BTreeMap<&'static str, &'static str>,
    pub meeting_platforms: BTreeMap<&'static str, bool>,
}

/// Drives a companion session from start to end.
///
/// States are `active -> completed`; nothing reopens a completed session.
pub struct SessionCoordinator {
    repo: Arc<dyn SessionRepository>,
    generator: ResponseGenerator,
    detector: Arc<dyn LanguageDetector>,
    voice: VoiceProcessor,
    meetings: Arc<dyn MeetingProvider>,
    activity: ActivityLogger,
    default_language: Language,
}

impl SessionCoordinator {
    pub fn new(
        repo: Arc<dyn SessionRepository>,
        generator: ResponseGenerator,
        detector: Arc<dyn LanguageDetector>,
        voice: VoiceProcessor,
        meetings: Arc<dyn MeetingProvider>,
        activity: ActivityLogger,
        default_language: Language,
    ) -> Self {
        Self {
            repo,
            generator,
            detector,
            voice,
            meetings,
            activity,
            default_language,
        }
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        self.generator.store()
    }

    pub fn repository(&self) -> &Arc<dyn SessionRepository> {
        &self.repo
    }

    async fn load_user(&self, user_id: UserId) -> Result<UserAccount, CompanionError> {
        let user = self
            .repo
            .find_user(user_id)
            .await?
            .ok_or(CompanionError::UnknownUser)?;

        if !user.is_active {
            return Err(CompanionError::InactiveUser);
        }
        Ok(user)
    }

    async fn active_session(&self, session_id: &str, user_id: UserId) -> Result<SessionRecord, CompanionError> {
        self.repo
            .find_active_session(session_id, user_id)
            .await?
            .ok_or(CompanionError::SessionNotFound)
    }

    async fn user_context(&self, user_id: UserId) -> Result<Option<UserContext>, CompanionError> {
        Ok(self
            .repo
            .find_profile(user_id)
            .await?
            .map(|profile| profile.to_context()))
    }

    fn resolve_language(&self, code: &str) -> Language {
        Language::from_code(code).unwrap_or(self.default_language)
    }

    fn flag_crisis(&self, session_id: &str, user_id: UserId, text: &str) -> bool {
        let crisis = is_crisis_message(text);
        if crisis {
            warn!("Crisis phrase detected in session {} (user {})", session_id, user_id);
            self.activity.log(
                ActivityLog::builder(session_id, user_id, ActivityType::CrisisDetected)
                    .message_length(text)
                    .build(),
            );
        }
        crisis
    }

    async fn generate(
        &self,
        exchange: &ExchangeGuard,
        session_id: &str,
        text: &str,
        language: Language,
    ) -> Result<String, CompanionError> {
        let user_id = exchange.user_id();
        let context = self.user_context(user_id).await?;

        match self.generator.generate(exchange, text, language, context.as_ref()).await {
            Ok(reply) => Ok(reply),
            Err(err) => {
                self.activity.log(
                    ActivityLog::builder(session_id, user_id, ActivityType::AiServiceError)
                        .language(language.code())
                        .error(err.to_string(), "ai_service_unavailable")
                        .build(),
                );
                Err(err)
            }
        }
    }

    /// Write both turns. A session closed behind our back discards the
    /// reply along with the in-memory window.
    async fn persist_exchange(
        &self,
        exchange: &ExchangeGuard,
        session: &SessionRecord,
        user_message: NewMessage,
        assistant_message: NewMessage,
    ) -> Result<MessageRecord, CompanionError> {
        match self
            .repo
            .record_exchange(session.id, user_message, assistant_message)
            .await?
        {
            Some((_, assistant)) => Ok(assistant),
            None => {
                warn!(
                    "Session {} was closed during the exchange, reply discarded",
                    session.session_id
                );
                self.store().clear(exchange.user_id());
                Err(CompanionError::SessionNotFound)
            }
        }
    }

    /// Open a session: meeting room, persisted session row and greeting
    pub async fn start_session(
        &self,
        user_id: UserId,
        preferred_language: Option<&str>,
        meeting_platform: MeetingPlatform,
    ) -> Result<SessionRecord, CompanionError> {
        let user = self.load_user(user_id).await?;

        let language = preferred_language
            .filter(|code| !code.trim().is_empty())
            .or(user.preferred_language.as_deref())
            .map(|code| self.resolve_language(code))
            .unwrap_or(self.default_language);

        let room = self
            .meetings
            .create_meeting(user_id, meeting_platform)
            .await
            .map_err(|e| {
                error!("Failed to create meeting for user {}: {:#}", user_id, e);
                CompanionError::MeetingServiceUnavailable("Could not create meeting room".to_string())
            })?;

        let new_session = NewSession {
            session_id: format!("sess_{}", Uuid::new_v4().simple()),
            user_id,
            language: language.code().to_string(),
            meeting_id: Some(room.id.clone()),
            meeting_platform: Some(room.platform.as_str().to_string()),
        };
        let greeting = NewMessage::text(Role::Assistant, greeting_for_language(language), language.code());

        let session = match self.repo.create_session(new_session, greeting).await {
            Ok(session) => session,
            Err(e) => {
                if let Err(end_err) = self.meetings.end_meeting(&room.id).await {
                    warn!("Could not release meeting {}: {:#}", room.id, end_err);
                }
                return Err(e.into());
            }
        };

        if !self.meetings.join_as_bot(&room.id).await {
            warn!("AI companion could not join meeting {}", room.id);
        }

        self.activity.log(
            ActivityLog::builder(&session.session_id, user_id, ActivityType::SessionStarted)
                .language(language.code())
                .detail("meeting_platform", room.platform.as_str())
                .build(),
        );
        info!("AI session started: {} for user {} ({})", session.session_id, user_id, language);

        Ok(session)
    }

    /// One text exchange inside an active session
    pub async fn send_message(
        &self,
        user_id: UserId,
        session_id: &str,
        content: &str,
    ) -> Result<MessageExchange, CompanionError> {
        let started = Instant::now();
        self.load_user(user_id).await?;

        let exchange = self.store().exchange_lock(user_id).await;
        let session = self.active_session(session_id, user_id).await?;

        let language = self
            .detector
            .detect(content, self.resolve_language(&session.language));
        let crisis_detected = self.flag_crisis(session_id, user_id, content);

        let reply = self.generate(&exchange, session_id, content, language).await?;

        let assistant = self
            .persist_exchange(
                &exchange,
                &session,
                NewMessage::text(Role::User, content, language.code()),
                NewMessage::text(Role::Assistant, reply.as_str(), language.code()),
            )
            .await?;
        drop(exchange);

        self.activity.log(
            ActivityLog::builder(session_id, user_id, ActivityType::MessageExchanged)
                .language(language.code())
                .message_length(content)
                .response_length(&reply)
                .processing_time(started.elapsed().as_millis() as i32)
                .detail("crisis_detected", crisis_detected)
                .build(),
        );

        Ok(MessageExchange {
            message: assistant,
            language,
            crisis_detected,
        })
    }

    /// One spoken exchange. Premium only.
    pub async fn send_voice_message(
        &self,
        user_id: UserId,
        session_id: &str,
        audio: &[u8],
    ) -> Result<VoiceExchange, CompanionError> {
        let started = Instant::now();
        let user = self.load_user(user_id).await?;
        if !user.is_premium {
            return Err(CompanionError::PremiumRequired);
        }

        let session = self.active_session(session_id, user_id).await?;
        let format = self.voice.validate_audio_format(audio)?;

        let hint = self.resolve_language(&session.language);
        let transcript = self.voice.speech_to_text(audio, format, hint).await?;

        // transcription ran unlocked; the session may have ended meanwhile
        let exchange = self.store().exchange_lock(user_id).await;
        let session = self.active_session(session_id, user_id).await?;

        let language = self.detector.detect(&transcript, hint);
        let crisis_detected = self.flag_crisis(session_id, user_id, &transcript);

        let reply = self.generate(&exchange, session_id, &transcript, language).await?;
        let response_audio = self.voice.text_to_speech(&reply, language).await?;

        self.persist_exchange(
            &exchange,
            &session,
            NewMessage::text(Role::User, transcript.as_str(), language.code())
                .with_audio_duration(self.voice.audio_duration_seconds(audio)),
            NewMessage::text(Role::Assistant, reply.as_str(), language.code())
                .with_audio_duration(self.voice.audio_duration_seconds(&response_audio)),
        )
        .await?;
        drop(exchange);

        self.activity.log(
            ActivityLog::builder(session_id, user_id, ActivityType::VoiceExchanged)
                .language(language.code())
                .message_length(&transcript)
                .response_length(&reply)
                .processing_time(started.elapsed().as_millis() as i32)
                .detail("audio_bytes", audio.len())
                .detail("crisis_detected", crisis_detected)
                .build(),
        );

        Ok(VoiceExchange {
            session_id: session.session_id,
            user_message: transcript,
            ai_response: reply,
            language,
            response_audio,
            crisis_detected,
        })
    }

    /// Complete an active session and forget the user's conversation window.
    /// Waits for a running exchange of the same user to finish first.
    pub async fn end_session(&self, user_id: UserId, session_id: &str) -> Result<EndedSession, CompanionError> {
        self.load_user(user_id).await?;

        let _exchange = self.store().exchange_lock(user_id).await;
        let session = self.active_session(session_id, user_id).await?;

        if let Some(meeting_id) = session.meeting_id.as_deref() {
            match self.meetings.end_meeting(meeting_id).await {
                Ok(true) => {}
                Ok(false) => warn!("Meeting {} was already gone", meeting_id),
                Err(e) => {
                    error!("Failed to end meeting {}: {:#}", meeting_id, e);
                    return Err(CompanionError::MeetingServiceUnavailable(
                        "Could not end meeting room".to_string(),
                    ));
                }
            }
        }

        let ended_at = Utc::now();
        let minutes = duration_minutes(session.created_at, ended_at);
        if self
            .repo
            .complete_session(session.id, ended_at, minutes)
            .await?
            .is_none()
        {
            return Err(CompanionError::SessionNotFound);
        }

        let summary = self.store().summary_for(user_id);
        self.store().clear(user_id);

        let mut log = ActivityLog::builder(session_id, user_id, ActivityType::SessionEnded)
            .detail("duration_minutes", minutes)
            .detail("message_count", session.message_count);
        if let Some(summary) = summary {
            log = log.detail("conversation", summary.to_string());
        }
        self.activity.log(log.build());
        info!("AI session ended: {} after {} minutes", session_id, minutes);

        Ok(EndedSession {
            duration_minutes: minutes,
        })
    }

    /// The user's most recent sessions, newest first
    pub async fn list_sessions(&self, user_id: UserId) -> Result<Vec<SessionRecord>, CompanionError> {
        self.load_user(user_id).await?;
        Ok(self.repo.list_sessions(user_id, SESSION_LIST_LIMIT).await?)
    }

    /// All messages of one of the user's sessions, any status, oldest first
    pub async fn session_messages(
        &self,
        user_id: UserId,
        session_id: &str,
    ) -> Result<Vec<MessageRecord>, CompanionError> {
        self.load_user(user_id).await?;
        let session = self
            .repo
            .find_session(session_id, user_id)
            .await?
            .ok_or(CompanionError::SessionNotFound)?;

        Ok(self.repo.list_messages(session.id).await?)
    }

    pub fn supported_languages(&self) -> SupportedLanguages {
        SupportedLanguages {
            languages: supported_languages(),
            meeting_platforms: self.meetings.platforms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MeetingConfig;
    use crate::database::{InMemorySessionRepository, UserProfile};
    use crate::services::language_detector::MockLanguageDetector;
    use crate::services::llm_service::{LlmFailure, MockLlmProvider};
    use crate::services::meeting::{MeetingIntegration, MockMeetingProvider};
    use crate::services::voice::{MockSpeechToText, MockTextToSpeech};
    use chrono::Duration;

    struct Fixture {
        repo: Arc<InMemorySessionRepository>,
        store: Arc<ConversationStore>,
        meetings: Arc<MeetingIntegration>,
    }

    fn wav(len: usize) -> Vec<u8> {
        let mut audio = b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec();
        audio.resize(len, 0);
        audio
    }

    fn account(id: i64, premium: bool) -> UserAccount {
        UserAccount {
            id,
            is_active: true,
            is_premium: premium,
            preferred_language: None,
        }
    }

    fn detector_for(language: Language) -> MockLanguageDetector {
        let mut detector = MockLanguageDetector::new();
        detector.expect_detect().return_const(language);
        detector
    }

    fn coordinator_with(
        llm: MockLlmProvider,
        detector: MockLanguageDetector,
        stt: MockSpeechToText,
        tts: MockTextToSpeech,
    ) -> (SessionCoordinator, Fixture) {
        let repo = Arc::new(InMemorySessionRepository::new());
        let store = Arc::new(ConversationStore::default());
        let meetings = Arc::new(MeetingIntegration::new(&MeetingConfig::default()));

        let coordinator = SessionCoordinator::new(
            repo.clone(),
            ResponseGenerator::new(Arc::new(llm), store.clone(), "gpt-4"),
            Arc::new(detector),
            VoiceProcessor::new(Arc::new(stt), Arc::new(tts), 16_000),
            meetings.clone(),
            ActivityLogger::disabled(),
            Language::En,
        );

        (coordinator, Fixture { repo, store, meetings })
    }

    fn coordinator(llm: MockLlmProvider, detector: MockLanguageDetector) -> (SessionCoordinator, Fixture) {
        coordinator_with(llm, detector, MockSpeechToText::new(), MockTextToSpeech::new())
    }

    fn replying(reply: &'static str) -> MockLlmProvider {
        let mut llm = MockLlmProvider::new();
        llm.expect_complete().returning(move |_| Ok(reply.to_string()));
        llm
    }

    #[test]
    fn test_duration_rounds_to_nearest_minute() {
        let start = Utc::now();
        assert_eq!(duration_minutes(start, start), 0);
        assert_eq!(duration_minutes(start, start + Duration::seconds(29)), 0);
        assert_eq!(duration_minutes(start, start + Duration::seconds(90)), 2);
        assert_eq!(duration_minutes(start, start + Duration::seconds(149)), 2);
        assert_eq!(duration_minutes(start, start + Duration::minutes(45)), 45);
        assert_eq!(duration_minutes(start, start - Duration::seconds(10)), 0);
    }

    #[tokio::test]
    async fn test_start_session_language_resolution() {
        let (coordinator, fx) = coordinator(MockLlmProvider::new(), MockLanguageDetector::new());
        fx.repo
            .upsert_user(UserAccount {
                preferred_language: Some("fr".to_string()),
                ..account(1, false)
            })
            .await;

        let explicit = coordinator
            .start_session(1, Some("de"), MeetingPlatform::WebRtc)
            .await
            .unwrap();
        assert_eq!(explicit.language, "de");

        let stored = coordinator.start_session(1, None, MeetingPlatform::WebRtc).await.unwrap();
        assert_eq!(stored.language, "fr");

        let unsupported = coordinator
            .start_session(1, Some("xx"), MeetingPlatform::WebRtc)
            .await
            .unwrap();
        assert_eq!(unsupported.language, "en");

        let messages = fx.repo.list_messages(explicit.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, greeting_for_language(Language::De));
        assert!(fx.store.is_empty());
    }

    #[tokio::test]
    async fn test_start_session_joins_fallback_room() {
        let (coordinator, fx) = coordinator(MockLlmProvider::new(), MockLanguageDetector::new());
        fx.repo.upsert_user(account(1, false)).await;

        let session = coordinator.start_session(1, None, MeetingPlatform::Zoom).await.unwrap();
        assert_eq!(session.meeting_platform.as_deref(), Some("webrtc"));
        assert!(session.is_active());

        let room = fx.meetings.meeting_info(session.meeting_id.as_deref().unwrap()).unwrap();
        assert_eq!(room.status, crate::services::meeting::MeetingStatus::AiJoined);
    }

    #[tokio::test]
    async fn test_unknown_and_inactive_users_are_rejected() {
        let (coordinator, fx) = coordinator(MockLlmProvider::new(), MockLanguageDetector::new());
        let err = coordinator.start_session(9, None, MeetingPlatform::WebRtc).await.unwrap_err();
        assert!(matches!(err, CompanionError::UnknownUser));

        fx.repo
            .upsert_user(UserAccount {
                is_active: false,
                ..account(9, false)
            })
            .await;
        let err = coordinator.list_sessions(9).await.unwrap_err();
        assert!(matches!(err, CompanionError::InactiveUser));
    }

    #[tokio::test]
    async fn test_send_message_persists_exchange() {
        let (coordinator, fx) = coordinator(replying("That sounds hard."), detector_for(Language::En));
        fx.repo.upsert_user(account(1, false)).await;
        let session = coordinator.start_session(1, None, MeetingPlatform::WebRtc).await.unwrap();

        let exchange = coordinator
            .send_message(1, &session.session_id, "My week was rough")
            .await
            .unwrap();

        assert_eq!(exchange.message.role, "assistant");
        assert_eq!(exchange.message.content, "That sounds hard.");
        assert!(!exchange.crisis_detected);

        let stored = fx.repo.find_active_session(&session.session_id, 1).await.unwrap().unwrap();
        assert_eq!(stored.message_count, 2);
        assert_eq!(fx.repo.list_messages(session.id).await.unwrap().len(), 3);
        assert_eq!(fx.store.history_for(1).len(), 2);
    }

    #[tokio::test]
    async fn test_crisis_message_is_flagged_and_answered() {
        let (coordinator, fx) = coordinator(replying("I'm here with you."), detector_for(Language::En));
        fx.repo.upsert_user(account(1, false)).await;
        let session = coordinator.start_session(1, None, MeetingPlatform::WebRtc).await.unwrap();

        let exchange = coordinator
            .send_message(1, &session.session_id, "Sometimes I want to die")
            .await
            .unwrap();
        assert!(exchange.crisis_detected);
        assert_eq!(exchange.message.content, "I'm here with you.");
    }

    #[tokio::test]
    async fn test_profile_context_reaches_prompt() {
        let mut llm = MockLlmProvider::new();
        llm.expect_complete()
            .withf(|req| {
                req.messages[0].content.contains("User prefers to be called: Robin")
                    && req.messages[0].content.contains("User interests: music")
            })
            .times(1)
            .returning(|_| Ok("Hi Robin".to_string()));

        let (coordinator, fx) = coordinator(llm, detector_for(Language::En));
        fx.repo.upsert_user(account(1, false)).await;
        fx.repo
            .upsert_profile(UserProfile {
                user_id: 1,
                display_name: Some("Robin".to_string()),
                interests: Some("music".to_string()),
                emotional_needs: None,
            })
            .await;
        let session = coordinator.start_session(1, None, MeetingPlatform::WebRtc).await.unwrap();

        coordinator.send_message(1, &session.session_id, "hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_ai_failure_persists_nothing() {
        let mut llm = MockLlmProvider::new();
        llm.expect_complete()
            .returning(|_| Err(LlmFailure::Api("502 bad gateway".to_string())));

        let (coordinator, fx) = coordinator(llm, detector_for(Language::En));
        fx.repo.upsert_user(account(1, false)).await;
        let session = coordinator.start_session(1, None, MeetingPlatform::WebRtc).await.unwrap();

        let err = coordinator
            .send_message(1, &session.session_id, "are you there?")
            .await
            .unwrap_err();
        assert!(matches!(err, CompanionError::AiServiceUnavailable(_)));

        assert_eq!(fx.repo.list_messages(session.id).await.unwrap().len(), 1);
        assert!(fx.store.history_for(1).is_empty());
    }

    #[tokio::test]
    async fn test_session_scoping() {
        let (coordinator, fx) = coordinator(MockLlmProvider::new(), MockLanguageDetector::new());
        fx.repo.upsert_user(account(1, false)).await;
        fx.repo.upsert_user(account(2, false)).await;
        let session = coordinator.start_session(1, None, MeetingPlatform::WebRtc).await.unwrap();

        let err = coordinator
            .send_message(2, &session.session_id, "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, CompanionError::SessionNotFound));

        let err = coordinator.session_messages(2, &session.session_id).await.unwrap_err();
        assert!(matches!(err, CompanionError::SessionNotFound));

        let err = coordinator.end_session(1, "sess_missing").await.unwrap_err();
        assert!(matches!(err, CompanionError::SessionNotFound));
    }

    #[tokio::test]
    async fn test_end_session_completes_and_clears_history() {
        let (coordinator, fx) = coordinator(replying("ok"), detector_for(Language::En));
        fx.repo.upsert_user(account(1, false)).await;
        let session = coordinator.start_session(1, None, MeetingPlatform::WebRtc).await.unwrap();
        coordinator.send_message(1, &session.session_id, "hi").await.unwrap();
        assert!(!fx.store.history_for(1).is_empty());

        let ended = coordinator.end_session(1, &session.session_id).await.unwrap();
        assert_eq!(ended.duration_minutes, 0);
        assert!(fx.store.history_for(1).is_empty());

        let stored = fx.repo.find_session(&session.session_id, 1).await.unwrap().unwrap();
        assert_eq!(stored.status, "completed");
        assert!(stored.ended_at.is_some());
        assert!(fx.meetings.active_meetings(1).is_empty());

        // completed sessions accept nothing but reads
        let err = coordinator.end_session(1, &session.session_id).await.unwrap_err();
        assert!(matches!(err, CompanionError::SessionNotFound));
        let err = coordinator.send_message(1, &session.session_id, "hi").await.unwrap_err();
        assert!(matches!(err, CompanionError::SessionNotFound));
        assert_eq!(coordinator.session_messages(1, &session.session_id).await.unwrap().len(), 3);
    }

    /// Completes the session right before the exchange lands, as another
    /// server instance sharing the database would.
    struct ClosingRepository(Arc<InMemorySessionRepository>);

    #[async_trait::async_trait]
    impl SessionRepository for ClosingRepository {
        async fn find_user(&self, user_id: i64) -> anyhow::Result<Option<UserAccount>> {
            self.0.find_user(user_id).await
        }

        async fn find_profile(&self, user_id: i64) -> anyhow::Result<Option<UserProfile>> {
            self.0.find_profile(user_id).await
        }

        async fn create_session(&self, session: NewSession, greeting: NewMessage) -> anyhow::Result<SessionRecord> {
            self.0.create_session(session, greeting).await
        }

        async fn find_active_session(&self, session_id: &str, user_id: i64) -> anyhow::Result<Option<SessionRecord>> {
            self.0.find_active_session(session_id, user_id).await
        }

        async fn find_session(&self, session_id: &str, user_id: i64) -> anyhow::Result<Option<SessionRecord>> {
            self.0.find_session(session_id, user_id).await
        }

        async fn record_exchange(
            &self,
            session_pk: i64,
            user_message: NewMessage,
            assistant_message: NewMessage,
        ) -> anyhow::Result<Option<(MessageRecord, MessageRecord)>> {
            self.0.complete_session(session_pk, Utc::now(), 1).await?;
            self.0.record_exchange(session_pk, user_message, assistant_message).await
        }

        async fn complete_session(
            &self,
            session_pk: i64,
            ended_at: DateTime<Utc>,
            duration_minutes: i32,
        ) -> anyhow::Result<Option<SessionRecord>> {
            self.0.complete_session(session_pk, ended_at, duration_minutes).await
        }

        async fn list_sessions(&self, user_id: i64, limit: i64) -> anyhow::Result<Vec<SessionRecord>> {
            self.0.list_sessions(user_id, limit).await
        }

        async fn list_messages(&self, session_pk: i64) -> anyhow::Result<Vec<MessageRecord>> {
            self.0.list_messages(session_pk).await
        }

        async fn health_check(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_reply_for_closed_session_is_discarded() {
        let inner = Arc::new(InMemorySessionRepository::new());
        inner.upsert_user(account(1, false)).await;
        let store = Arc::new(ConversationStore::default());

        let coordinator = SessionCoordinator::new(
            Arc::new(ClosingRepository(inner.clone())),
            ResponseGenerator::new(Arc::new(replying("too late")), store.clone(), "gpt-4"),
            Arc::new(detector_for(Language::En)),
            VoiceProcessor::new(
                Arc::new(MockSpeechToText::new()),
                Arc::new(MockTextToSpeech::new()),
                16_000,
            ),
            Arc::new(MeetingIntegration::new(&MeetingConfig::default())),
            ActivityLogger::disabled(),
            Language::En,
        );
        let session = coordinator.start_session(1, None, MeetingPlatform::WebRtc).await.unwrap();

        let err = coordinator
            .send_message(1, &session.session_id, "hello?")
            .await
            .unwrap_err();
        assert!(matches!(err, CompanionError::SessionNotFound));
        assert!(store.is_empty());

        let stored = inner.find_session(&session.session_id, 1).await.unwrap().unwrap();
        assert_eq!(stored.status, "completed");
        assert_eq!(stored.message_count, 0);
        assert_eq!(inner.list_messages(session.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_detection_falls_back_to_session_language() {
        let mut detector = MockLanguageDetector::new();
        detector
            .expect_detect()
            .withf(|text, fallback| text == "ok" && *fallback == Language::It)
            .times(1)
            .returning(|_, fallback| fallback);

        let (coordinator, fx) = coordinator(replying("Va bene."), detector);
        fx.repo.upsert_user(account(1, false)).await;
        let session = coordinator
            .start_session(1, Some("it"), MeetingPlatform::WebRtc)
            .await
            .unwrap();

        let exchange = coordinator.send_message(1, &session.session_id, "ok").await.unwrap();
        assert_eq!(exchange.language, Language::It);
        assert_eq!(exchange.message.language, "it");
    }

    #[tokio::test]
    async fn test_meeting_failure_keeps_session_active() {
        let repo = Arc::new(InMemorySessionRepository::new());
        repo.upsert_user(account(1, false)).await;
        let store = Arc::new(ConversationStore::default());

        let mut meetings = MockMeetingProvider::new();
        meetings.expect_create_meeting().returning(|user_id, _| {
            Ok(crate::services::meeting::MeetingRoom {
                id: format!("simple_{}_x", user_id),
                platform: MeetingPlatform::WebRtc,
                join_url: "/meeting/x".to_string(),
                user_id,
                status: crate::services::meeting::MeetingStatus::Created,
                password: None,
                ice_servers: Vec::new(),
                created_at: Utc::now(),
                ai_joined_at: None,
                ended_at: None,
            })
        });
        meetings.expect_join_as_bot().returning(|_| true);
        meetings
            .expect_end_meeting()
            .returning(|_| Err(anyhow::anyhow!("platform timeout")));

        let coordinator = SessionCoordinator::new(
            repo.clone(),
            ResponseGenerator::new(Arc::new(MockLlmProvider::new()), store, "gpt-4"),
            Arc::new(MockLanguageDetector::new()),
            VoiceProcessor::new(
                Arc::new(MockSpeechToText::new()),
                Arc::new(MockTextToSpeech::new()),
                16_000,
            ),
            Arc::new(meetings),
            ActivityLogger::disabled(),
            Language::En,
        );

        let session = coordinator.start_session(1, None, MeetingPlatform::WebRtc).await.unwrap();
        let err = coordinator.end_session(1, &session.session_id).await.unwrap_err();
        assert!(matches!(err, CompanionError::MeetingServiceUnavailable(_)));
        assert!(repo.find_active_session(&session.session_id, 1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_voice_requires_premium_before_anything_else() {
        // no expectations: any collaborator call would panic
        let (coordinator, fx) = coordinator(MockLlmProvider::new(), MockLanguageDetector::new());
        fx.repo.upsert_user(account(1, false)).await;

        let err = coordinator
            .send_voice_message(1, "sess_does_not_exist", &wav(64))
            .await
            .unwrap_err();
        assert!(matches!(err, CompanionError::PremiumRequired));
        assert!(fx.store.is_empty());
    }

    #[tokio::test]
    async fn test_voice_rejects_unknown_audio() {
        let (coordinator, fx) = coordinator(MockLlmProvider::new(), MockLanguageDetector::new());
        fx.repo.upsert_user(account(1, true)).await;
        let session = coordinator.start_session(1, None, MeetingPlatform::WebRtc).await.unwrap();

        let err = coordinator
            .send_voice_message(1, &session.session_id, b"ID3\x03 definitely an mp3")
            .await
            .unwrap_err();
        assert!(matches!(err, CompanionError::InvalidAudioFormat));
    }

    #[tokio::test]
    async fn test_voice_exchange() {
        let mut stt = MockSpeechToText::new();
        stt.expect_transcribe()
            .withf(|_, _, hint| *hint == Language::Es)
            .returning(|_, _, _| Ok("Estoy muy cansada hoy".to_string()));
        stt.expect_provider_name().return_const("mock");
        let mut tts = MockTextToSpeech::new();
        tts.expect_synthesize()
            .withf(|text, language| text.to_string() == "Descansa un poco." && *language == Language::Es)
            .returning(|_, _| Ok(vec![1u8; 8_000]));
        tts.expect_provider_name().return_const("mock");

        let (coordinator, fx) =
            coordinator_with(replying("Descansa un poco."), detector_for(Language::Es), stt, tts);
        fx.repo.upsert_user(account(1, true)).await;
        let session = coordinator
            .start_session(1, Some("es"), MeetingPlatform::WebRtc)
            .await
            .unwrap();

        let exchange = coordinator
            .send_voice_message(1, &session.session_id, &wav(32_000))
            .await
            .unwrap();

        assert_eq!(exchange.session_id, session.session_id);
        assert_eq!(exchange.user_message, "Estoy muy cansada hoy");
        assert_eq!(exchange.ai_response, "Descansa un poco.");
        assert_eq!(exchange.language, Language::Es);
        assert_eq!(exchange.response_audio.len(), 8_000);

        let messages = fx.repo.list_messages(session.id).await.unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].audio_duration, Some(2.0));
        assert_eq!(messages[2].audio_duration, Some(0.5));
    }

    #[tokio::test]
    async fn test_supported_languages() {
        let (coordinator, _) = coordinator(MockLlmProvider::new(), MockLanguageDetector::new());
        let supported = coordinator.supported_languages();
        assert_eq!(supported.languages.len(), 20);
        assert_eq!(supported.languages.get("ja"), Some(&"Japanese"));
        assert_eq!(supported.meeting_platforms.get("webrtc"), Some(&true));
    }
}
