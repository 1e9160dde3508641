//! Conversation sessions and their storage.
//!
//! A session is a client-chosen id plus its ordered message history. The
//! [`SessionStore`] trait is the storage seam; [`InMemorySessionStore`]
//! bounds memory with an idle time-to-live and a session cap.

use crate::error::SessionError;
use crate::message::Message;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use feedback_relay_core::SessionId;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// The state of a live conversation session.
///
/// Ended sessions are removed from the store rather than kept in a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Session has messages or has just been started.
    Active,
    /// History was cleared; the session still accepts messages.
    Cleared,
}

/// A conversation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub state: SessionState,
    /// Changes whenever the session is created, reset or cleared.
    pub generation: u64,
    /// Messages in arrival order.
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    /// Creates an empty session.
    #[must_use]
    pub fn new(id: SessionId, generation: u64, now: DateTime<Utc>) -> Self {
        Self {
            id,
            state: SessionState::Active,
            generation,
            messages: Vec::new(),
            created_at: now,
            last_active_at: now,
        }
    }

    /// Appends a message.
    pub fn push(&mut self, message: Message, now: DateTime<Utc>) {
        self.messages.push(message);
        self.state = SessionState::Active;
        self.last_active_at = now;
    }

    /// Empties the history, keeping the session under a new generation.
    pub fn clear(&mut self, generation: u64, now: DateTime<Utc>) {
        self.messages.clear();
        self.state = SessionState::Cleared;
        self.generation = generation;
        self.last_active_at = now;
    }

    /// Returns the last `count` messages, oldest first.
    #[must_use]
    pub fn trailing(&self, count: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(count);
        &self.messages[start..]
    }

    /// Returns true if the session has been idle longer than `ttl`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_active_at > ttl
    }
}

/// Storage for conversation sessions.
///
/// Every method is atomic with respect to the others for a given store.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns a live session, or `None` if absent or expired.
    async fn get(&self, id: &SessionId) -> Result<Option<Session>, Report<SessionError>>;

    /// Creates the session, or resets an existing one, holding `messages`.
    async fn reset(
        &self,
        id: &SessionId,
        messages: Vec<Message>,
    ) -> Result<Session, Report<SessionError>>;

    /// Appends a message, creating the session if needed, and returns the
    /// session as it stands after the append.
    async fn append(&self, id: &SessionId, message: Message)
    -> Result<Session, Report<SessionError>>;

    /// Appends a message only if the session is still live at `generation`.
    ///
    /// Returns `None`, storing nothing, when the session was ended, cleared,
    /// reset or expired since that generation was observed.
    async fn append_if_current(
        &self,
        id: &SessionId,
        generation: u64,
        message: Message,
    ) -> Result<Option<Session>, Report<SessionError>>;

    /// Empties a session's history. Returns false if there was no session.
    async fn clear(&self, id: &SessionId) -> Result<bool, Report<SessionError>>;

    /// Removes a session. Returns false if there was no session.
    async fn remove(&self, id: &SessionId) -> Result<bool, Report<SessionError>>;

    /// Drops every expired session and returns how many were dropped.
    async fn purge_expired(&self) -> Result<usize, Report<SessionError>>;

    /// Returns the number of live sessions.
    async fn len(&self) -> Result<usize, Report<SessionError>>;
}

/// Limits for [`InMemorySessionStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStoreConfig {
    /// Maximum live sessions; the least recently active is evicted beyond it.
    pub max_sessions: usize,
    /// Idle time after which a session expires.
    pub ttl: Duration,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            max_sessions: 10_000,
            ttl: Duration::minutes(60),
        }
    }
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Process-local session store.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
    config: SessionStoreConfig,
    generations: AtomicU64,
    clock: Clock,
}

impl std::fmt::Debug for InMemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySessionStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(SessionStoreConfig::default())
    }
}

impl InMemorySessionStore {
    /// Creates a store with the given limits. A cap of zero is raised to one.
    #[must_use]
    pub fn new(config: SessionStoreConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config: SessionStoreConfig {
                max_sessions: config.max_sessions.max(1),
                ..config
            },
            generations: AtomicU64::new(0),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<SessionId, Session>>, Report<SessionError>> {
        self.sessions
            .read()
            .map_err(|_| SessionError::LockPoisoned.into())
    }

    fn write(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<SessionId, Session>>, Report<SessionError>> {
        self.sessions
            .write()
            .map_err(|_| SessionError::LockPoisoned.into())
    }

    /// Makes room for one more session: expired sessions go first, then the
    /// least recently active ones.
    fn make_room(&self, sessions: &mut HashMap<SessionId, Session>, now: DateTime<Utc>) {
        if sessions.len() < self.config.max_sessions {
            return;
        }

        sessions.retain(|_, session| !session.is_expired(now, self.config.ttl));

        while sessions.len() >= self.config.max_sessions {
            let Some(oldest) = sessions
                .values()
                .min_by_key(|session| session.last_active_at)
                .map(|session| session.id.clone())
            else {
                break;
            };
            sessions.remove(&oldest);
            debug!(session_id = %oldest, "Evicted least recently active session");
        }
    }

    /// Returns the live session for `id`, creating or renewing it as needed.
    fn live_entry<'a>(
        &self,
        sessions: &'a mut HashMap<SessionId, Session>,
        id: &SessionId,
        now: DateTime<Utc>,
    ) -> &'a mut Session {
        let expired = sessions
            .get(id)
            .is_some_and(|session| session.is_expired(now, self.config.ttl));
        if expired {
            debug!(session_id = %id, "Replacing expired session");
            sessions.remove(id);
        }
        if !sessions.contains_key(id) {
            self.make_room(sessions, now);
        }
        sessions
            .entry(id.clone())
            .or_insert_with(|| Session::new(id.clone(), self.next_generation(), now))
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<Session>, Report<SessionError>> {
        let now = self.now();
        let sessions = self.read()?;
        Ok(sessions
            .get(id)
            .filter(|session| !session.is_expired(now, self.config.ttl))
            .cloned())
    }

    async fn reset(
        &self,
        id: &SessionId,
        messages: Vec<Message>,
    ) -> Result<Session, Report<SessionError>> {
        let now = self.now();
        let mut sessions = self.write()?;
        if !sessions.contains_key(id) {
            self.make_room(&mut sessions, now);
        }

        let mut session = Session::new(id.clone(), self.next_generation(), now);
        for message in messages {
            session.push(message, now);
        }
        sessions.insert(id.clone(), session.clone());
        Ok(session)
    }

    async fn append(
        &self,
        id: &SessionId,
        message: Message,
    ) -> Result<Session, Report<SessionError>> {
        let now = self.now();
        let mut sessions = self.write()?;
        let session = self.live_entry(&mut sessions, id, now);
        session.push(message, now);
        Ok(session.clone())
    }

    async fn append_if_current(
        &self,
        id: &SessionId,
        generation: u64,
        message: Message,
    ) -> Result<Option<Session>, Report<SessionError>> {
        let now = self.now();
        let mut sessions = self.write()?;
        let Some(session) = sessions
            .get_mut(id)
            .filter(|session| session.generation == generation)
            .filter(|session| !session.is_expired(now, self.config.ttl))
        else {
            return Ok(None);
        };
        session.push(message, now);
        Ok(Some(session.clone()))
    }

    async fn clear(&self, id: &SessionId) -> Result<bool, Report<SessionError>> {
        let now = self.now();
        let mut sessions = self.write()?;
        let ttl = self.config.ttl;
        if sessions.get(id).is_some_and(|session| session.is_expired(now, ttl)) {
            sessions.remove(id);
            return Ok(false);
        }
        let generation = self.next_generation();
        Ok(sessions
            .get_mut(id)
            .map(|session| session.clear(generation, now))
            .is_some())
    }

    async fn remove(&self, id: &SessionId) -> Result<bool, Report<SessionError>> {
        let now = self.now();
        let mut sessions = self.write()?;
        Ok(sessions
            .remove(id)
            .is_some_and(|session| !session.is_expired(now, self.config.ttl)))
    }

    async fn purge_expired(&self) -> Result<usize, Report<SessionError>> {
        let now = self.now();
        let mut sessions = self.write()?;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now, self.config.ttl));
        let purged = before - sessions.len();
        if purged > 0 {
            debug!(purged, remaining = sessions.len(), "Purged expired sessions");
        }
        Ok(purged)
    }

    async fn len(&self) -> Result<usize, Report<SessionError>> {
        let now = self.now();
        let sessions = self.read()?;
        Ok(sessions
            .values()
            .filter(|session| !session.is_expired(now, self.config.ttl))
            .count())
    }
}
