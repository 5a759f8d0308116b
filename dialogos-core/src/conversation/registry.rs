//! Session scoped registry of known conversations

use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use super::managed::ManagedConversation;

/// Known conversations of one session, keyed by id.
///
/// The session and the request currently associated with it share the same
/// registry, so every mutation is visible to both.
#[derive(Debug, Default)]
pub struct ConversationRegistry {
    conversations: Mutex<HashMap<String, Arc<ManagedConversation>>>,
}

impl ConversationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a conversation by id
    pub fn get(&self, id: &str) -> Option<Arc<ManagedConversation>> {
        self.conversations.lock().get(id).cloned()
    }

    /// Whether a conversation with this id is known
    pub fn contains(&self, id: &str) -> bool {
        self.conversations.lock().contains_key(id)
    }

    /// Register a conversation under `id`, returning the one it replaced
    pub fn insert(
        &self,
        id: impl Into<String>,
        conversation: Arc<ManagedConversation>,
    ) -> Option<Arc<ManagedConversation>> {
        self.conversations.lock().insert(id.into(), conversation)
    }

    /// Register a conversation under `id` unless the id is taken.
    ///
    /// On a clash nothing changes and the registered conversation is returned.
    pub fn try_insert(
        &self,
        id: impl Into<String>,
        conversation: Arc<ManagedConversation>,
    ) -> Result<(), Arc<ManagedConversation>> {
        match self.conversations.lock().entry(id.into()) {
            Entry::Occupied(existing) => Err(Arc::clone(existing.get())),
            Entry::Vacant(slot) => {
                slot.insert(conversation);
                Ok(())
            }
        }
    }

    /// Forget a conversation
    pub fn remove(&self, id: &str) -> Option<Arc<ManagedConversation>> {
        self.conversations.lock().remove(id)
    }

    /// Snapshot of all known conversations
    pub fn conversations(&self) -> Vec<Arc<ManagedConversation>> {
        self.conversations.lock().values().cloned().collect()
    }

    /// Snapshot of all known ids
    pub fn ids(&self) -> Vec<String> {
        self.conversations.lock().keys().cloned().collect()
    }

    /// Number of known conversations
    pub fn len(&self) -> usize {
        self.conversations.lock().len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.conversations.lock().is_empty()
    }

    /// Remove every transient conversation and return them with their ids
    pub fn drain_transient(&self) -> Vec<(String, Arc<ManagedConversation>)> {
        let mut conversations = self.conversations.lock();
        let ids: Vec<String> = conversations
            .iter()
            .filter(|(_, conversation)| conversation.is_transient())
            .map(|(id, _)| id.clone())
            .collect();

        ids.into_iter()
            .filter_map(|id| conversations.remove(&id).map(|c| (id, c)))
            .collect()
    }

    /// Merge `other` into this registry.
    ///
    /// Entries whose id is already present here are kept out and returned.
    pub fn absorb(&self, other: &ConversationRegistry) -> Vec<(String, Arc<ManagedConversation>)> {
        let incoming: Vec<(String, Arc<ManagedConversation>)> = other
            .conversations
            .lock()
            .iter()
            .map(|(id, c)| (id.clone(), Arc::clone(c)))
            .collect();

        let mut conversations = self.conversations.lock();
        let mut clashes = Vec::new();
        for (id, conversation) in incoming {
            match conversations.get(&id) {
                Some(existing) if Arc::ptr_eq(existing, &conversation) => {}
                Some(_) => clashes.push((id, conversation)),
                None => {
                    conversations.insert(id, conversation);
                }
            }
        }
        clashes
    }
}
