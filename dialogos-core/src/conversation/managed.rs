//! A single conversation and its lock

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;

use crate::error::{ConversationError, Result};

#[derive(Debug)]
struct ConversationState {
    id: Option<String>,
    transient: bool,
    timeout: Duration,
    last_used: DateTime<Utc>,
}

/// Point-in-time view of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    /// Conversation id, absent until the conversation is begun
    pub id: Option<String>,
    /// Whether the conversation is transient
    pub transient: bool,
    /// Idle timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Last time a request finished with this conversation
    pub last_used: DateTime<Utc>,
    /// Whether a request currently holds the conversation lock
    pub locked: bool,
}

/// Exclusive use of a conversation by one request.
///
/// Only the request that acquired the lock can release it, by dropping this value.
#[derive(Debug)]
pub struct ConversationLock {
    _guard: OwnedMutexGuard<()>,
}

/// A conversation shared between the session registry and the request using it.
///
/// A new conversation is transient and has no id. [`begin`](Self::begin) makes it
/// long-running, [`end`](Self::end) makes it transient again so the next sweep
/// destroys it.
#[derive(Debug)]
pub struct ManagedConversation {
    state: Mutex<ConversationState>,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl ManagedConversation {
    /// Create a transient conversation with the given idle timeout
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: Mutex::new(ConversationState {
                id: None,
                transient: true,
                timeout,
                last_used: Utc::now(),
            }),
            lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Conversation id, if one has been assigned
    pub fn id(&self) -> Option<String> {
        self.state.lock().id.clone()
    }

    /// Whether the conversation is transient
    pub fn is_transient(&self) -> bool {
        self.state.lock().transient
    }

    /// Idle timeout
    pub fn timeout(&self) -> Duration {
        self.state.lock().timeout
    }

    /// Change the idle timeout
    pub fn set_timeout(&self, timeout: Duration) {
        self.state.lock().timeout = timeout;
    }

    /// Last time the conversation was touched
    pub fn last_used(&self) -> DateTime<Utc> {
        self.state.lock().last_used
    }

    /// Record use of the conversation
    pub fn touch(&self) {
        let mut state = self.state.lock();
        let now = Utc::now();
        if now > state.last_used {
            state.last_used = now;
        }
    }

    /// Make the conversation long-running.
    ///
    /// With `None` an id assigned earlier is kept; a conversation that never had an
    /// id needs one.
    ///
    /// # Errors
    ///
    /// `IllegalState` if the conversation is already long-running or ends up without
    /// an id.
    pub fn begin(&self, id: Option<String>) -> Result<String> {
        let mut state = self.state.lock();
        if !state.transient {
            return Err(ConversationError::illegal_state(
                "begin() called on a long-running conversation",
            ));
        }
        if let Some(id) = id {
            state.id = Some(id);
        }
        let Some(id) = state.id.clone() else {
            return Err(ConversationError::illegal_state(
                "a conversation cannot be begun without an id",
            ));
        };
        state.transient = false;
        Ok(id)
    }

    /// Mark the conversation ended so it is destroyed at the next sweep.
    ///
    /// # Errors
    ///
    /// `IllegalState` if the conversation is already transient.
    pub fn end(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.transient {
            return Err(ConversationError::illegal_state(
                "end() called on a transient conversation",
            ));
        }
        state.transient = true;
        Ok(())
    }

    /// End a long-running conversation. Returns `false` if it was already transient.
    pub(crate) fn mark_ended(&self) -> bool {
        let mut state = self.state.lock();
        let was_long_running = !state.transient;
        state.transient = true;
        was_long_running
    }

    /// Whether `last_used + timeout` lies before `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let state = self.state.lock();
        let timeout = TimeDelta::from_std(state.timeout).unwrap_or(TimeDelta::MAX);
        match state.last_used.checked_add_signed(timeout) {
            Some(deadline) => now > deadline,
            None => false,
        }
    }

    /// Whether the conversation has been idle longer than its timeout
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Acquire the conversation lock, waiting at most `timeout`.
    ///
    /// Returns `None` if another holder kept the lock for the whole wait. Acquiring
    /// a lock this conversation already holds also waits and fails: the lock is not
    /// reentrant.
    pub async fn lock(&self, timeout: Duration) -> Option<ConversationLock> {
        tokio::time::timeout(timeout, Arc::clone(&self.lock).lock_owned())
            .await
            .ok()
            .map(|guard| ConversationLock { _guard: guard })
    }

    /// Acquire the conversation lock if nobody holds it
    pub fn try_lock(&self) -> Option<ConversationLock> {
        Arc::clone(&self.lock)
            .try_lock_owned()
            .ok()
            .map(|guard| ConversationLock { _guard: guard })
    }

    /// Whether a request holds the conversation lock
    pub fn is_locked(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    /// Point-in-time view of the conversation
    pub fn snapshot(&self) -> ConversationSnapshot {
        let locked = self.is_locked();
        let state = self.state.lock();
        ConversationSnapshot {
            id: state.id.clone(),
            transient: state.transient,
            timeout: state.timeout,
            last_used: state.last_used,
            locked,
        }
    }
}
