//! In-memory conversation store with per-session serialization.
//!
//! Every session key owns one `Conversation` behind its own async mutex. A
//! request holds that mutex for its whole multi-round exchange, so two
//! requests on the same key can never interleave their turns, while requests
//! on different keys proceed independently.
//!
//! There is no eviction: memory grows with the number of sessions and with
//! conversation length until a session is reset.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::conversation::error::{ConversationError, ConversationResult};
use crate::conversation::session::SessionKey;
use crate::conversation::turn::{Role, Turn};

/// Ordered, alternating sequence of turns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Create an empty conversation.
    #[must_use]
    pub const fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Borrow the turns in order.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the conversation has no turns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Role the next turn must carry.
    #[must_use]
    pub fn next_role(&self) -> Role {
        match self.turns.last() {
            Some(turn) if turn.role == Role::User => Role::Assistant,
            _ => Role::User,
        }
    }

    /// Append a turn.
    ///
    /// # Errors
    /// Returns an error if the turn would break user/assistant alternation.
    pub fn push(&mut self, turn: Turn) -> ConversationResult<()> {
        let expected = self.next_role();
        if turn.role != expected {
            return Err(ConversationError::OutOfOrder {
                expected,
                found: turn.role,
            });
        }
        self.turns.push(turn);
        Ok(())
    }

    /// Drop every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    fn truncate(&mut self, len: usize) {
        self.turns.truncate(len);
    }
}

/// Exclusive handle on one session's conversation.
pub type ConversationGuard = OwnedMutexGuard<Conversation>;

/// Turns appended during one request, rolled back unless committed.
///
/// Dropping an uncommitted exchange (error path or cancelled request future)
/// truncates the conversation to where the exchange began, which keeps the
/// stored sequence alternating.
pub struct Exchange<'a> {
    conversation: &'a mut Conversation,
    checkpoint: usize,
    committed: bool,
}

impl<'a> Exchange<'a> {
    /// Start an exchange at the conversation's current length.
    #[must_use]
    pub fn begin(conversation: &'a mut Conversation) -> Self {
        let checkpoint = conversation.len();
        Self {
            conversation,
            checkpoint,
            committed: false,
        }
    }

    /// Append a turn to the underlying conversation.
    ///
    /// # Errors
    /// Returns an error if the turn would break user/assistant alternation.
    pub fn push(&mut self, turn: Turn) -> ConversationResult<()> {
        self.conversation.push(turn)
    }

    /// Full turn sequence, including turns appended by this exchange.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        self.conversation.turns()
    }

    /// Number of turns appended so far.
    #[must_use]
    pub fn appended(&self) -> usize {
        self.conversation.len().saturating_sub(self.checkpoint)
    }

    /// Keep the appended turns and return a snapshot of the whole sequence.
    #[must_use]
    pub fn commit(mut self) -> Vec<Turn> {
        self.committed = true;
        self.conversation.turns().to_vec()
    }
}

impl Drop for Exchange<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let appended = self.appended();
        if appended > 0 {
            warn!(appended, "rolling back uncommitted conversation turns");
            self.conversation.truncate(self.checkpoint);
        }
    }
}

/// Conversation store keyed by session.
#[derive(Default)]
pub struct ConversationStore {
    sessions: DashMap<SessionKey, Arc<Mutex<Conversation>>>,
}

impl ConversationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &SessionKey) -> Arc<Mutex<Conversation>> {
        if let Some(slot) = self.sessions.get(key) {
            return Arc::clone(&slot);
        }
        Arc::clone(&self.sessions.entry(key.clone()).or_default())
    }

    /// Lock a session's conversation, creating it on first use.
    ///
    /// The guard must be held across an entire exchange.
    pub async fn lock(&self, key: &SessionKey) -> ConversationGuard {
        self.slot(key).lock_owned().await
    }

    /// Snapshot of a session's turns; creates an empty conversation on first access.
    pub async fn get_or_create(&self, key: &SessionKey) -> Vec<Turn> {
        self.lock(key).await.turns().to_vec()
    }

    /// Append one turn to a session.
    ///
    /// # Errors
    /// Returns an error if the turn would break user/assistant alternation.
    pub async fn append(&self, key: &SessionKey, turn: Turn) -> ConversationResult<()> {
        self.lock(key).await.push(turn)
    }

    /// Clear a session back to an empty sequence.
    ///
    /// Waits for any in-flight exchange on the session to finish first.
    pub async fn reset(&self, key: &SessionKey) {
        let mut conversation = self.lock(key).await;
        debug!(session = %key, turns = conversation.len(), "resetting conversation");
        conversation.clear();
    }
}
