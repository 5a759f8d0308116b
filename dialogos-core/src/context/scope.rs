//! Per-request execution state

use crate::beanstore::BoundBeanStore;
use crate::conversation::ConversationLock;

/// State of one chain of execution handling a request.
///
/// Holds the associated request, the bean store bound for the current conversation,
/// the lock of a restored conversation and the active flag. Each worker owns its own scope, so a single
/// [`ConversationContext`](super::ConversationContext) can be shared by all of them.
pub struct ExecutionScope<R> {
    pub(crate) request: Option<R>,
    pub(crate) bean_store: Option<Box<dyn BoundBeanStore>>,
    pub(crate) conversation_lock: Option<ConversationLock>,
    pub(crate) active: bool,
}

impl<R> Default for ExecutionScope<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> ExecutionScope<R> {
    /// Create an unassociated, inactive scope
    pub fn new() -> Self {
        Self {
            request: None,
            bean_store: None,
            conversation_lock: None,
            active: false,
        }
    }

    /// Whether a request is associated
    pub fn is_associated(&self) -> bool {
        self.request.is_some()
    }

    /// Whether the conversation context is active for this scope
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The associated request
    pub fn request(&self) -> Option<&R> {
        self.request.as_ref()
    }

    /// Whether a bean store is bound
    pub fn has_bean_store(&self) -> bool {
        self.bean_store.is_some()
    }

    /// Whether the bound bean store is attached to its backing storage
    pub fn is_bean_store_attached(&self) -> bool {
        self.bean_store
            .as_deref()
            .is_some_and(|store| store.is_attached())
    }

    /// Whether this scope holds the lock of the conversation it restored
    pub fn holds_conversation_lock(&self) -> bool {
        self.conversation_lock.is_some()
    }

    pub(crate) fn cleanup(&mut self) {
        self.bean_store = None;
        self.conversation_lock = None;
        self.active = false;
    }
}

impl<R> std::fmt::Debug for ExecutionScope<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionScope")
            .field("associated", &self.request.is_some())
            .field("bean_store", &self.bean_store.is_some())
            .field("locked", &self.conversation_lock.is_some())
            .field("active", &self.active)
            .finish()
    }
}
