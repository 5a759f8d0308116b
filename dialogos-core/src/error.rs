//! Error types for conversation scope operations

/// Result type for conversation scope operations
pub type Result<T> = std::result::Result<T, ConversationError>;

/// Error types for the conversation scope
#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    /// Operation invoked out of sequence (activate before associate, double activate, ...)
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// The requested conversation is not known to the session
    #[error("No conversation found to restore for id {cid}")]
    NonexistentConversation {
        /// Requested conversation id
        cid: String,
    },

    /// The requested conversation is locked by another request
    #[error("Conversation lock timed out for id {cid}")]
    BusyConversation {
        /// Requested conversation id
        cid: String,
    },

    /// A lifecycle callback failed
    #[error("Failed to invoke {method} on {instance}: {source}")]
    Invocation {
        /// Name of the failing callback
        method: String,
        /// Description of the instance the callback ran against
        instance: String,
        /// Underlying failure
        #[source]
        source: anyhow::Error,
    },

    /// Conversation scoped state was accessed without an active context
    #[error("Conversation context is not active")]
    ContextNotActive,

    /// `begin` was called with an id another conversation already uses
    #[error("Conversation id is already in use: {0}")]
    ConversationIdInUse(String),

    /// Storage collaborator failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ConversationError {
    pub(crate) fn illegal_state(message: impl Into<String>) -> Self {
        ConversationError::IllegalState(message.into())
    }

    /// Whether the caller can keep using the context after this error.
    ///
    /// Nonexistent and busy conversations leave the context bound to a transient
    /// fallback conversation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConversationError::NonexistentConversation { .. }
                | ConversationError::BusyConversation { .. }
        )
    }
}

impl From<String> for ConversationError {
    fn from(s: String) -> Self {
        ConversationError::Other(s)
    }
}

impl From<&str> for ConversationError {
    fn from(s: &str) -> Self {
        ConversationError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for ConversationError {
    fn from(err: anyhow::Error) -> Self {
        ConversationError::Other(err.to_string())
    }
}

impl From<figment::Error> for ConversationError {
    fn from(err: figment::Error) -> Self {
        ConversationError::Configuration(err.to_string())
    }
}
