use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::models::{MessageRecord, NewMessage, NewSession, SessionRecord, SessionStatus, UserAccount, UserProfile};
use super::DbPool;

/// Persistence for users (read-only), sessions and session messages
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find_user(&self, user_id: i64) -> Result<Option<UserAccount>>;

    async fn find_profile(&self, user_id: i64) -> Result<Option<UserProfile>>;

    /// Insert an active session together with its opening message, atomically
    async fn create_session(&self, session: NewSession, greeting: NewMessage) -> Result<SessionRecord>;

    async fn find_active_session(&self, session_id: &str, user_id: i64) -> Result<Option<SessionRecord>>;

    /// Any status
    async fn find_session(&self, session_id: &str, user_id: i64) -> Result<Option<SessionRecord>>;

    /// Persist both turns of an exchange and bump the message counter by 2
    /// in one transaction. Returns (user, assistant) records, or `None` when
    /// the session is no longer active and nothing was written.
    async fn record_exchange(
        &self,
        session_pk: i64,
        user_message: NewMessage,
        assistant_message: NewMessage,
    ) -> Result<Option<(MessageRecord, MessageRecord)>>;

    /// `None` when the session was not active
    async fn complete_session(
        &self,
        session_pk: i64,
        ended_at: DateTime<Utc>,
        duration_minutes: i32,
    ) -> Result<Option<SessionRecord>>;

    /// Newest first
    async fn list_sessions(&self, user_id: i64, limit: i64) -> Result<Vec<SessionRecord>>;

    /// Oldest first
    async fn list_messages(&self, session_pk: i64) -> Result<Vec<MessageRecord>>;

    async fn health_check(&self) -> Result<()>;
}

const SESSION_COLUMNS: &str = "id, session_id, user_id, language, duration_minutes, message_count, \
     meeting_id, meeting_platform, status, created_at, ended_at";

const MESSAGE_COLUMNS: &str = "id, session_pk, role, content, language, audio_duration, created_at";

pub struct PgSessionRepository {
    pool: DbPool,
}

impl PgSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn insert_message<'c>(
        tx: &mut sqlx::Transaction<'c, sqlx::Postgres>,
        session_pk: i64,
        message: &NewMessage,
    ) -> Result<MessageRecord> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            "INSERT INTO session_messages (session_pk, role, content, language, audio_duration)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            MESSAGE_COLUMNS
        ))
        .bind(session_pk)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(&message.language)
        .bind(message.audio_duration)
        .fetch_one(&mut **tx)
        .await?;

        Ok(record)
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn find_user(&self, user_id: i64) -> Result<Option<UserAccount>> {
        let user = sqlx::query_as::<_, UserAccount>(
            "SELECT id, is_active, is_premium, preferred_language FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.pool.get_pool())
        .await?;

        Ok(user)
    }

    async fn find_profile(&self, user_id: i64) -> Result<Option<UserProfile>> {
        let profile = sqlx::query_as::<_, UserProfile>(
            "SELECT user_id, display_name, interests, emotional_needs
             FROM user_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.pool.get_pool())
        .await?;

        Ok(profile)
    }

    async fn create_session(&self, session: NewSession, greeting: NewMessage) -> Result<SessionRecord> {
        let mut tx = self.pool.get_pool().begin().await?;

        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "INSERT INTO ai_sessions (session_id, user_id, language, meeting_id, meeting_platform, status)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(&session.session_id)
        .bind(session.user_id)
        .bind(&session.language)
        .bind(&session.meeting_id)
        .bind(&session.meeting_platform)
        .bind(SessionStatus::Active.as_str())
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert session")?;

        Self::insert_message(&mut tx, record.id, &greeting)
            .await
            .context("Failed to insert greeting")?;

        tx.commit().await?;
        debug!("Created session {} (pk={})", record.session_id, record.id);

        Ok(record)
    }

    async fn find_active_session(&self, session_id: &str, user_id: i64) -> Result<Option<SessionRecord>> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM ai_sessions WHERE session_id = $1 AND user_id = $2 AND status = $3",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .bind(user_id)
        .bind(SessionStatus::Active.as_str())
        .fetch_optional(self.pool.get_pool())
        .await?;

        Ok(record)
    }

    async fn find_session(&self, session_id: &str, user_id: i64) -> Result<Option<SessionRecord>> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM ai_sessions WHERE session_id = $1 AND user_id = $2",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(self.pool.get_pool())
        .await?;

        Ok(record)
    }

    async fn record_exchange(
        &self,
        session_pk: i64,
        user_message: NewMessage,
        assistant_message: NewMessage,
    ) -> Result<Option<(MessageRecord, MessageRecord)>> {
        let mut tx = self.pool.get_pool().begin().await?;

        // row lock on the session keeps a concurrent completion out until commit
        let bumped = sqlx::query(
            "UPDATE ai_sessions SET message_count = message_count + 2 WHERE id = $1 AND status = $2",
        )
        .bind(session_pk)
        .bind(SessionStatus::Active.as_str())
        .execute(&mut *tx)
        .await?;

        if bumped.rows_affected() == 0 {
            debug!("Session pk={} is not active, exchange not recorded", session_pk);
            return Ok(None);
        }

        let user = Self::insert_message(&mut tx, session_pk, &user_message).await?;
        let assistant = Self::insert_message(&mut tx, session_pk, &assistant_message).await?;

        tx.commit().await?;
        debug!("Recorded exchange for session pk={}", session_pk);

        Ok(Some((user, assistant)))
    }

    async fn complete_session(
        &self,
        session_pk: i64,
        ended_at: DateTime<Utc>,
        duration_minutes: i32,
    ) -> Result<Option<SessionRecord>> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "UPDATE ai_sessions SET status = $2, ended_at = $3, duration_minutes = $4
             WHERE id = $1 AND status = $5
             RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(session_pk)
        .bind(SessionStatus::Completed.as_str())
        .bind(ended_at)
        .bind(duration_minutes)
        .bind(SessionStatus::Active.as_str())
        .fetch_optional(self.pool.get_pool())
        .await?;

        Ok(record)
    }

    async fn list_sessions(&self, user_id: i64, limit: i64) -> Result<Vec<SessionRecord>> {
        let sessions = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM ai_sessions WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool.get_pool())
        .await?;

        Ok(sessions)
    }

    async fn list_messages(&self, session_pk: i64) -> Result<Vec<MessageRecord>> {
        let messages = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {} FROM session_messages WHERE session_pk = $1 ORDER BY created_at ASC, id ASC",
            MESSAGE_COLUMNS
        ))
        .bind(session_pk)
        .fetch_all(self.pool.get_pool())
        .await?;

        Ok(messages)
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(self.pool.get_pool()).await?;
        Ok(())
    }
}
