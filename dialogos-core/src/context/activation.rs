//! Outcome of activating the conversation context

use serde::{Deserialize, Serialize};

use crate::error::{ConversationError, Result};

/// Why a requested conversation could not be restored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The session does not know the id
    Nonexistent,
    /// Another request held the conversation lock for the whole wait
    Busy,
}

/// Result of [`activate`](super::ConversationContext::activate).
///
/// Every variant leaves the context active. A fallback has already bound a fresh
/// transient conversation; the caller decides whether to report the failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActivationOutcome {
    /// No id was requested, a new transient conversation was started
    Started,
    /// The requested conversation was restored and locked
    Restored {
        /// Restored conversation id
        cid: String,
    },
    /// The requested conversation could not be restored
    Fallback {
        /// Requested conversation id
        requested: String,
        /// Why restoring failed
        reason: FallbackReason,
    },
}

impl ActivationOutcome {
    pub(crate) fn fallback(requested: &str, reason: FallbackReason) -> Self {
        ActivationOutcome::Fallback {
            requested: requested.to_string(),
            reason,
        }
    }

    /// Whether a transient conversation replaced the requested one
    pub fn is_fallback(&self) -> bool {
        matches!(self, ActivationOutcome::Fallback { .. })
    }

    /// The error describing a fallback
    pub fn error(&self) -> Option<ConversationError> {
        match self {
            ActivationOutcome::Fallback { requested, reason } => Some(match reason {
                FallbackReason::Nonexistent => ConversationError::NonexistentConversation {
                    cid: requested.clone(),
                },
                FallbackReason::Busy => ConversationError::BusyConversation {
                    cid: requested.clone(),
                },
            }),
            _ => None,
        }
    }

    /// Turn a fallback into its error
    pub fn into_result(self) -> Result<()> {
        match self.error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
