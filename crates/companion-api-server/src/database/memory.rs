use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::models::{MessageRecord, NewMessage, NewSession, SessionRecord, SessionStatus, UserAccount, UserProfile};
use super::repository::SessionRepository;

#[derive(Default)]
struct Tables {
    users: HashMap<i64, UserAccount>,
    profiles: HashMap<i64, UserProfile>,
    sessions: Vec<SessionRecord>,
    messages: Vec<MessageRecord>,
    next_session_pk: i64,
    next_message_pk: i64,
}

impl Tables {
    fn push_message(&mut self, session_pk: i64, message: NewMessage) -> MessageRecord {
        self.next_message_pk += 1;
        let record = MessageRecord {
            id: self.next_message_pk,
            session_pk,
            role: message.role.as_str().to_string(),
            content: message.content,
            language: message.language,
            audio_duration: message.audio_duration,
            created_at: Utc::now(),
        };
        self.messages.push(record.clone());
        record
    }

    fn session_mut(&mut self, session_pk: i64) -> Result<&mut SessionRecord> {
        self.sessions
            .iter_mut()
            .find(|s| s.id == session_pk)
            .ok_or_else(|| anyhow!("session pk={} does not exist", session_pk))
    }
}

/// Process-local storage backend for development and tests.
/// Every operation runs under one lock, so multi-row writes are atomic.
#[derive(Default)]
pub struct InMemorySessionRepository {
    tables: RwLock<Tables>,
    provision_unknown_users: bool,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_user(&self, user: UserAccount) {
        self.tables.write().await.users.insert(user.id, user);
    }

    pub async fn upsert_profile(&self, profile: UserProfile) {
        self.tables.write().await.profiles.insert(profile.user_id, profile);
    }

    /// Unknown user ids resolve to an active, non-premium account.
    /// For setups where accounts live in another service.
    pub fn with_auto_provisioning(mut self) -> Self {
        self.provision_unknown_users = true;
        self
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find_user(&self, user_id: i64) -> Result<Option<UserAccount>> {
        let known = self.tables.read().await.users.get(&user_id).cloned();
        if known.is_some() || !self.provision_unknown_users {
            return Ok(known);
        }

        Ok(Some(UserAccount {
            id: user_id,
            is_active: true,
            is_premium: false,
            preferred_language: None,
        }))
    }

    async fn find_profile(&self, user_id: i64) -> Result<Option<UserProfile>> {
        Ok(self.tables.read().await.profiles.get(&user_id).cloned())
    }

    async fn create_session(&self, session: NewSession, greeting: NewMessage) -> Result<SessionRecord> {
        let mut tables = self.tables.write().await;
        if tables.sessions.iter().any(|s| s.session_id == session.session_id) {
            return Err(anyhow!("session id {} already exists", session.session_id));
        }

        tables.next_session_pk += 1;
        let record = SessionRecord {
            id: tables.next_session_pk,
            session_id: session.session_id,
            user_id: session.user_id,
            language: session.language,
            duration_minutes: 0,
            message_count: 0,
            meeting_id: session.meeting_id,
            meeting_platform: session.meeting_platform,
            status: SessionStatus::Active.as_str().to_string(),
            created_at: Utc::now(),
            ended_at: None,
        };
        tables.sessions.push(record.clone());
        tables.push_message(record.id, greeting);

        Ok(record)
    }

    async fn find_active_session(&self, session_id: &str, user_id: i64) -> Result<Option<SessionRecord>> {
        Ok(self
            .find_session(session_id, user_id)
            .await?
            .filter(SessionRecord::is_active))
    }

    async fn find_session(&self, session_id: &str, user_id: i64) -> Result<Option<SessionRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .sessions
            .iter()
            .find(|s| s.session_id == session_id && s.user_id == user_id)
            .cloned())
    }

    async fn record_exchange(
        &self,
        session_pk: i64,
        user_message: NewMessage,
        assistant_message: NewMessage,
    ) -> Result<Option<(MessageRecord, MessageRecord)>> {
        let mut tables = self.tables.write().await;
        let session = tables.session_mut(session_pk)?;
        if !session.is_active() {
            return Ok(None);
        }
        session.message_count += 2;

        let user = tables.push_message(session_pk, user_message);
        let assistant = tables.push_message(session_pk, assistant_message);
        Ok(Some((user, assistant)))
    }

    async fn complete_session(
        &self,
        session_pk: i64,
        ended_at: DateTime<Utc>,
        duration_minutes: i32,
    ) -> Result<Option<SessionRecord>> {
        let mut tables = self.tables.write().await;
        let session = tables.session_mut(session_pk)?;
        if !session.is_active() {
            return Ok(None);
        }
        session.status = SessionStatus::Completed.as_str().to_string();
        session.ended_at = Some(ended_at);
        session.duration_minutes = duration_minutes;
        Ok(Some(session.clone()))
    }

    async fn list_sessions(&self, user_id: i64, limit: i64) -> Result<Vec<SessionRecord>> {
        let tables = self.tables.read().await;
        let mut sessions: Vec<SessionRecord> = tables
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        sessions.truncate(limit.max(0) as usize);
        Ok(sessions)
    }

    async fn list_messages(&self, session_pk: i64) -> Result<Vec<MessageRecord>> {
        let tables = self.tables.read().await;
        // insertion order is creation order
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.session_pk == session_pk)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
