use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use super::types::{ConversationEntry, ConversationSummary, Role};

pub type UserId = i64;

type LockTable = DashMap<UserId, Arc<Mutex<()>>>;

/// Default window: 20 entries = 10 exchanges
pub const DEFAULT_HISTORY_CAP: usize = 20;

/// Thread-safe in-memory conversation windows, one per user.
///
/// Each window is a FIFO capped at `cap` entries. Nothing is persisted;
/// windows live until `clear` or process exit.
pub struct ConversationStore {
    /// user_id -> bounded history
    storage: DashMap<UserId, VecDeque<ConversationEntry>>,

    /// user_id -> exchange lock, present only while someone holds or awaits it
    exchange_locks: Arc<LockTable>,

    cap: usize,
}

impl ConversationStore {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        info!("Initializing conversation store (cap={} entries per user)", cap);
        Self {
            storage: DashMap::new(),
            exchange_locks: Arc::new(DashMap::new()),
            cap,
        }
    }

    /// Append one entry, dropping the oldest ones beyond the cap
    pub fn append(&self, user_id: UserId, role: Role, content: impl Into<String>) {
        let mut history = self.storage.entry(user_id).or_default();
        history.push_back(ConversationEntry::new(role, content));

        while history.len() > self.cap {
            history.pop_front();
        }

        debug!("User {} history now has {} entries", user_id, history.len());
    }

    /// Chronological copy of the user's window (empty if none)
    pub fn history_for(&self, user_id: UserId) -> Vec<ConversationEntry> {
        self.storage
            .get(&user_id)
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Forget the user's window. No-op when there is none.
    pub fn clear(&self, user_id: UserId) {
        if self.storage.remove(&user_id).is_some() {
            info!("Cleared conversation history for user {}", user_id);
        }
    }

    pub fn summary_for(&self, user_id: UserId) -> Option<ConversationSummary> {
        let history = self.storage.get(&user_id)?;
        if history.is_empty() {
            return None;
        }

        let user_messages = history.iter().filter(|e| e.role() == Role::User).count();
        Some(ConversationSummary {
            user_messages,
            assistant_messages: history.len() - user_messages,
        })
    }

    /// Acquire the user's exchange lock. Held from session validation through
    /// the upstream call to persistence, so exchanges and session end of the
    /// same user never interleave.
    pub async fn exchange_lock(&self, user_id: UserId) -> ExchangeGuard {
        let lock = self
            .exchange_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        ExchangeGuard {
            user_id,
            guard: Some(lock.lock_owned().await),
            locks: self.exchange_locks.clone(),
        }
    }

    /// Number of users with a live window
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

/// Exclusive right to run one exchange (or end a session) for a user.
/// The lock entry is dropped from the table once nobody else is waiting.
pub struct ExchangeGuard {
    user_id: UserId,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockTable>,
}

impl ExchangeGuard {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl Drop for ExchangeGuard {
    fn drop(&mut self) {
        // release first so our clone of the lock no longer counts
        drop(self.guard.take());
        self.locks
            .remove_if(&self.user_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}
