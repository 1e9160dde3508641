//! Conversation lifecycle: start, message, clear, end, history.

use crate::error::SessionError;
use crate::message::{ChatContext, Message};
use crate::responder::{Reply, Responder};
use crate::session::SessionStore;
use crate::welcome::PageType;
use feedback_relay_core::SessionId;
use rootcause::prelude::Report;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as TurnLock, OwnedMutexGuard};
use tracing::{debug, info, instrument};

/// Number of earlier messages the responder sees on each turn.
pub const RESPONDER_WINDOW: usize = 5;

/// One turn lock per session with a chat turn in flight.
#[derive(Debug, Default)]
struct TurnLocks {
    locks: Mutex<HashMap<SessionId, Arc<TurnLock<()>>>>,
}

impl TurnLocks {
    /// Waits until no other turn is running for `id`.
    async fn acquire(self: &Arc<Self>, id: &SessionId) -> Result<TurnPermit, Report<SessionError>> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| Report::from(SessionError::LockPoisoned))?;
            locks.entry(id.clone()).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        Ok(TurnPermit {
            owner: self.clone(),
            id: id.clone(),
            guard: Some(guard),
        })
    }
}

/// Held for the length of a chat turn.
struct TurnPermit {
    owner: Arc<TurnLocks>,
    id: SessionId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TurnPermit {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Forget the lock once nobody holds or waits on it.
        if let Ok(mut locks) = self.owner.locks.lock()
            && locks
                .get(&self.id)
                .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.id);
        }
    }
}

/// Drives conversations over a session store and a responder.
///
/// Chat turns on one session run one at a time. A reply is stored only if
/// the session was not ended, cleared or restarted while it was generated.
#[derive(Clone)]
pub struct ConversationManager {
    store: Arc<dyn SessionStore>,
    responder: Arc<dyn Responder>,
    turns: Arc<TurnLocks>,
}

impl std::fmt::Debug for ConversationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationManager")
            .field("model_backed", &self.responder.is_model_backed())
            .finish_non_exhaustive()
    }
}

impl ConversationManager {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, responder: Arc<dyn Responder>) -> Self {
        Self {
            store,
            responder,
            turns: Arc::default(),
        }
    }

    /// Returns true if replies can come from a language model.
    #[must_use]
    pub fn is_model_backed(&self) -> bool {
        self.responder.is_model_backed()
    }

    /// Returns the session store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Creates or resets a session holding only the welcome message, and
    /// returns that message.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    #[instrument(skip(self, context), fields(session_id = %session_id))]
    pub async fn start(
        &self,
        session_id: &SessionId,
        context: Option<&ChatContext>,
    ) -> Result<Message, Report<SessionError>> {
        let page_type = PageType::from_context(context);
        let welcome = Message::assistant(page_type.welcome_message());
        self.store.reset(session_id, vec![welcome.clone()]).await?;
        info!(page_type = ?page_type, "Conversation started");
        Ok(welcome)
    }

    /// Records a user message and the assistant's reply.
    ///
    /// Unknown sessions are created on the fly. The reply is still returned
    /// when the session went away mid-turn, but it is not stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    #[instrument(skip(self, text, context), fields(session_id = %session_id))]
    pub async fn message(
        &self,
        session_id: &SessionId,
        text: impl Into<String>,
        context: Option<ChatContext>,
    ) -> Result<Reply, Report<SessionError>> {
        let _turn = self.turns.acquire(session_id).await?;
        let user = Message::user(text).with_context(context);
        let session = self.store.append(session_id, user).await?;

        let window = session.trailing(RESPONDER_WINDOW + 1);
        debug!(window = window.len(), "Requesting reply");
        let reply = self.responder.respond(window).await;

        let stored = self
            .store
            .append_if_current(
                session_id,
                session.generation,
                Message::assistant(reply.content.clone()),
            )
            .await?;
        if stored.is_none() {
            info!("Session ended or cleared during the turn, reply not stored");
        }
        info!(source = ?reply.source, "Replied to chat message");
        Ok(reply)
    }

    /// Empties a session's history. Unknown sessions are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn clear(&self, session_id: &SessionId) -> Result<(), Report<SessionError>> {
        let existed = self.store.clear(session_id).await?;
        debug!(existed, "Conversation cleared");
        Ok(())
    }

    /// Removes a session. Unknown sessions are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn end(&self, session_id: &SessionId) -> Result<(), Report<SessionError>> {
        let existed = self.store.remove(session_id).await?;
        info!(existed, "Conversation ended");
        Ok(())
    }

    /// Returns a session's messages, or nothing for unknown sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn history(&self, session_id: &SessionId) -> Result<Vec<Message>, Report<SessionError>> {
        Ok(self
            .store
            .get(session_id)
            .await?
            .map(|session| session.messages)
            .unwrap_or_default())
    }
}
