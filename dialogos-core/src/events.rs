//! Conversation lifecycle events
//!
//! Observers are notified leniently: a failing observer is logged and skipped, it
//! never fails the operation that fired the event.
//!
//! # Example
//!
//! ```rust,ignore
//! use dialogos_core::events::{LoggingObserver, ObserverRegistry};
//!
//! let mut observers = ObserverRegistry::new();
//! observers.register(Arc::new(LoggingObserver));
//!
//! observers.notify_destroyed("7").await;
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

/// Kind of conversation event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationEventKind {
    /// A conversation and its bean store were destroyed
    Destroyed,
}

/// Event emitted by the conversation context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEvent {
    /// Event kind
    pub kind: ConversationEventKind,

    /// Conversation id
    pub conversation_id: String,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl ConversationEvent {
    /// Event for a destroyed conversation
    pub fn destroyed(conversation_id: impl Into<String>) -> Self {
        Self {
            kind: ConversationEventKind::Destroyed,
            conversation_id: conversation_id.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Trait for conversation lifecycle observers
#[async_trait]
pub trait ConversationObserver: Send + Sync {
    /// Called after a conversation has been destroyed
    async fn on_conversation_destroyed(&self, _event: &ConversationEvent) -> Result<()> {
        Ok(())
    }
}

/// Registry of conversation observers
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Vec<Arc<dyn ConversationObserver>>,
}

impl ObserverRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer
    pub fn register(&mut self, observer: Arc<dyn ConversationObserver>) {
        self.observers.push(observer);
    }

    /// Number of registered observers
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether no observer is registered
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Notify every observer that a conversation was destroyed
    pub async fn notify_destroyed(&self, conversation_id: &str) {
        let event = ConversationEvent::destroyed(conversation_id);
        for observer in &self.observers {
            if let Err(e) = observer.on_conversation_destroyed(&event).await {
                tracing::warn!(
                    cid = %conversation_id,
                    error = %e,
                    "Conversation observer failed"
                );
            }
        }
    }
}

/// Observer logging every event
pub struct LoggingObserver;

#[async_trait]
impl ConversationObserver for LoggingObserver {
    async fn on_conversation_destroyed(&self, event: &ConversationEvent) -> Result<()> {
        tracing::info!(
            cid = %event.conversation_id,
            "Conversation destroyed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConversationError;

    struct CollectingObserver {
        seen: Arc<tokio::sync::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ConversationObserver for CollectingObserver {
        async fn on_conversation_destroyed(&self, event: &ConversationEvent) -> Result<()> {
            self.seen.lock().await.push(event.conversation_id.clone());
            Ok(())
        }
    }

    struct FailingObserver;

    #[async_trait]
    impl ConversationObserver for FailingObserver {
        async fn on_conversation_destroyed(&self, _event: &ConversationEvent) -> Result<()> {
            Err(ConversationError::Other("observer down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failing_observer_does_not_stop_notification() {
        let seen = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let mut registry = ObserverRegistry::new();
        registry.register(Arc::new(FailingObserver));
        registry.register(Arc::new(LoggingObserver));
        registry.register(Arc::new(CollectingObserver { seen: seen.clone() }));
        assert_eq!(registry.len(), 3);

        registry.notify_destroyed("3").await;
        registry.notify_destroyed("4").await;

        assert_eq!(*seen.lock().await, vec!["3".to_string(), "4".to_string()]);
    }

    #[test]
    fn test_event_serialization() {
        let event = ConversationEvent::destroyed("9");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "destroyed");
        assert_eq!(json["conversation_id"], "9");
    }
}
