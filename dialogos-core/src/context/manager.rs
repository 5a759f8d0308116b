//! The conversation context

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use super::activation::{ActivationOutcome, FallbackReason};
use super::bean::ConversationScopedBean;
use super::scope::ExecutionScope;
use crate::beanstore::{BoundBeanStore, ContextualInstance, ConversationNamingScheme};
use crate::config::ConversationConfig;
use crate::conversation::{ConversationIdGenerator, ConversationRegistry, ManagedConversation};
use crate::error::{ConversationError, Result};
use crate::events::{ConversationObserver, ObserverRegistry};
use crate::storage::{
    BEAN_STORE_PREFIX, CONVERSATION_ID_GENERATOR_ATTRIBUTE, CONVERSATIONS_ATTRIBUTE,
    CURRENT_CONVERSATION_ATTRIBUTE, ConversationStorage, NAMING_SCHEME_ATTRIBUTE, ScopeAttribute,
};

/// Manages conversation scoped state across requests.
///
/// One context serves every request of an application. The per-request state lives
/// in the [`ExecutionScope`] each caller passes in, so the context itself is shared
/// behind an `Arc`.
///
/// A request goes through `associate`, `activate`, `deactivate` and `dissociate`, in
/// that order. Between activation and deactivation it may begin or end the current
/// conversation and read or create conversation scoped instances.
pub struct ConversationContext<S: ConversationStorage> {
    storage: Arc<S>,
    config: RwLock<ConversationConfig>,
    observers: ObserverRegistry,
}

impl<S: ConversationStorage> ConversationContext<S> {
    /// Create a context over `storage`
    pub fn new(storage: Arc<S>, config: ConversationConfig) -> Self {
        Self {
            storage,
            config: RwLock::new(config),
            observers: ObserverRegistry::new(),
        }
    }

    /// Notify `observer` of conversation events
    pub fn with_observer(mut self, observer: Arc<dyn ConversationObserver>) -> Self {
        self.observers.register(observer);
        self
    }

    /// Storage the context works on
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Current configuration
    pub fn config(&self) -> ConversationConfig {
        self.config.read().clone()
    }

    /// Name of the request parameter carrying the conversation id
    pub fn parameter_name(&self) -> String {
        self.config.read().parameter_name.clone()
    }

    /// Change the conversation id parameter name
    pub fn set_parameter_name(&self, name: impl Into<String>) {
        self.config.write().parameter_name = name.into();
    }

    /// Idle timeout given to new conversations
    pub fn default_timeout(&self) -> Duration {
        self.config.read().default_timeout
    }

    /// Change the idle timeout given to new conversations
    pub fn set_default_timeout(&self, timeout: Duration) {
        self.config.write().default_timeout = timeout;
    }

    /// How long `activate` waits for a conversation locked by another request
    pub fn concurrent_access_timeout(&self) -> Duration {
        self.config.read().concurrent_access_timeout
    }

    /// Change how long `activate` waits for a locked conversation
    pub fn set_concurrent_access_timeout(&self, timeout: Duration) {
        self.config.write().concurrent_access_timeout = timeout;
    }

    /// Conversation id carried by `request`, read from the configured parameter
    pub fn requested_conversation_id(&self, request: &S::Request) -> Option<String> {
        let name = self.parameter_name();
        self.storage
            .request_parameter(request, &name)
            .filter(|cid| !cid.is_empty())
    }

    /// Bind `request` to the scope and load the session's conversation state into it.
    ///
    /// Returns `false` without touching anything if a request is already associated.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn associate(&self, scope: &mut ExecutionScope<S::Request>, request: S::Request) -> Result<bool> {
        if scope.request.is_some() {
            return Ok(false);
        }

        let generator = self.load_session_attribute(&request, CONVERSATION_ID_GENERATOR_ATTRIBUTE, || {
            ScopeAttribute::IdGenerator(Arc::new(ConversationIdGenerator::new()))
        })?;
        let registry = self.load_session_attribute(&request, CONVERSATIONS_ATTRIBUTE, || {
            ScopeAttribute::Registry(Arc::new(ConversationRegistry::new()))
        })?;

        self.storage
            .set_request_attribute(&request, CONVERSATION_ID_GENERATOR_ATTRIBUTE, generator);
        self.storage
            .set_request_attribute(&request, CONVERSATIONS_ATTRIBUTE, registry);
        scope.request = Some(request);

        debug!("Request associated with conversation context");
        Ok(true)
    }

    fn load_session_attribute(
        &self,
        request: &S::Request,
        name: &str,
        create: impl FnOnce() -> ScopeAttribute,
    ) -> Result<ScopeAttribute> {
        if let Some(existing) = self.storage.session_attribute(request, name, false)? {
            return Ok(existing);
        }
        let created = create();
        self.storage
            .set_session_attribute(request, name, created.clone(), false)?;
        Ok(created)
    }

    /// Write the request's conversation state back to the session and unbind it.
    ///
    /// State is only written to a session that already exists. If the session gained
    /// its own registry meanwhile, the request's conversations are merged into it. The
    /// scope is unbound even if writing back fails.
    ///
    /// Returns `false` if no request was associated.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn dissociate(&self, scope: &mut ExecutionScope<S::Request>, request: &S::Request) -> Result<bool> {
        if scope.request.is_none() {
            return Ok(false);
        }
        let _cleanup = DissociateCleanup {
            storage: self.storage.as_ref(),
            scope,
            request,
        };
        self.write_back(request)?;
        debug!("Request dissociated from conversation context");
        Ok(true)
    }

    fn write_back(&self, request: &S::Request) -> Result<()> {
        let session_generator =
            self.storage
                .session_attribute(request, CONVERSATION_ID_GENERATOR_ATTRIBUTE, false)?;
        match (
            session_generator,
            self.storage
                .request_attribute(request, CONVERSATION_ID_GENERATOR_ATTRIBUTE),
        ) {
            (None, Some(generator)) => self.storage.set_session_attribute(
                request,
                CONVERSATION_ID_GENERATOR_ATTRIBUTE,
                generator,
                false,
            )?,
            (
                Some(ScopeAttribute::IdGenerator(existing)),
                Some(ScopeAttribute::IdGenerator(ours)),
            ) if !Arc::ptr_eq(&existing, &ours) => existing.advance_past(&ours),
            _ => {}
        }

        let session_registry = self
            .storage
            .session_attribute(request, CONVERSATIONS_ATTRIBUTE, false)?;
        match (
            session_registry,
            self.storage.request_attribute(request, CONVERSATIONS_ATTRIBUTE),
        ) {
            (None, Some(registry)) => {
                self.storage
                    .set_session_attribute(request, CONVERSATIONS_ATTRIBUTE, registry, false)?
            }
            (Some(ScopeAttribute::Registry(existing)), Some(ScopeAttribute::Registry(ours)))
                if !Arc::ptr_eq(&existing, &ours) =>
            {
                for (cid, _) in existing.absorb(&ours) {
                    warn!(
                        cid = %cid,
                        "Conversation id clash while merging into the session, keeping the session's conversation"
                    );
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Activate the context, restoring the conversation `cid` or starting a transient one.
    ///
    /// An empty `cid` counts as none. A conversation the session does not know, or
    /// one another request keeps locked for longer than the concurrent access timeout,
    /// is replaced by a new transient conversation and reported as a fallback.
    ///
    /// # Errors
    ///
    /// `IllegalState` if the context is already active for this scope or no request
    /// is associated.
    pub async fn activate(
        &self,
        scope: &mut ExecutionScope<S::Request>,
        cid: Option<&str>,
    ) -> Result<ActivationOutcome> {
        if scope.bean_store.is_some() {
            return Err(ConversationError::illegal_state("Context is already active"));
        }
        let request = scope.request.clone().ok_or_else(|| {
            ConversationError::illegal_state("Must call associate() before calling activate()")
        })?;

        let Some(cid) = cid.filter(|cid| !cid.is_empty()) else {
            self.associate_transient(scope, &request);
            debug!("Activated a new transient conversation");
            return Ok(ActivationOutcome::Started);
        };

        let Some(conversation) = self.registry(&request)?.get(cid) else {
            self.associate_transient(scope, &request);
            warn!(cid = %cid, "No conversation found to restore, using a transient conversation");
            return Ok(ActivationOutcome::fallback(cid, FallbackReason::Nonexistent));
        };

        let timeout = self.concurrent_access_timeout();
        let Some(held) = conversation.lock(timeout).await else {
            self.associate_transient(scope, &request);
            warn!(
                cid = %cid,
                timeout_ms = timeout.as_millis() as u64,
                "Conversation lock timed out, using a transient conversation"
            );
            return Ok(ActivationOutcome::fallback(cid, FallbackReason::Busy));
        };

        conversation.touch();
        scope.conversation_lock = Some(held);
        self.associate_restored(scope, &request, cid, conversation);
        debug!(cid = %cid, "Restored conversation");
        Ok(ActivationOutcome::Restored {
            cid: cid.to_string(),
        })
    }

    fn associate_transient(&self, scope: &mut ExecutionScope<S::Request>, request: &S::Request) {
        let conversation = Arc::new(ManagedConversation::new(self.default_timeout()));
        self.storage.set_request_attribute(
            request,
            CURRENT_CONVERSATION_ATTRIBUTE,
            ScopeAttribute::Conversation(conversation),
        );

        let naming = Arc::new(ConversationNamingScheme::transient(BEAN_STORE_PREFIX));
        scope.bean_store = Some(
            self.storage
                .create_request_bean_store(Arc::clone(&naming), request),
        );
        self.storage.set_request_attribute(
            request,
            NAMING_SCHEME_ATTRIBUTE,
            ScopeAttribute::NamingScheme(naming),
        );
        scope.active = true;
    }

    fn associate_restored(
        &self,
        scope: &mut ExecutionScope<S::Request>,
        request: &S::Request,
        cid: &str,
        conversation: Arc<ManagedConversation>,
    ) {
        self.storage.set_request_attribute(
            request,
            CURRENT_CONVERSATION_ATTRIBUTE,
            ScopeAttribute::Conversation(conversation),
        );
        self.storage
            .remove_request_attribute(request, NAMING_SCHEME_ATTRIBUTE);

        let naming = Arc::new(ConversationNamingScheme::new(BEAN_STORE_PREFIX, cid));
        let mut store = self.storage.create_request_bean_store(naming, request);
        store.attach();
        scope.bean_store = Some(store);
        scope.active = true;
    }

    /// Finish the request's use of its conversation and deactivate the context.
    ///
    /// A transient conversation has its instances destroyed. A long-running one is
    /// touched and, if it was begun during this request, published to the session.
    /// The lock taken by `activate` is released either way. Afterwards every
    /// conversation of the session that has become transient is destroyed.
    ///
    /// The scope is deactivated even if publishing fails.
    ///
    /// # Errors
    ///
    /// `IllegalState` if no bean store is bound or the request lost the state
    /// `activate` put into it. `ConversationIdInUse` if another request of the
    /// session published a conversation under the same id first; the instances of
    /// this request's conversation are destroyed in that case.
    pub async fn deactivate(&self, scope: &mut ExecutionScope<S::Request>) -> Result<()> {
        if scope.bean_store.is_none() {
            return Err(ConversationError::illegal_state("Context is not active"));
        }
        let request = scope.request.clone().ok_or_else(|| {
            ConversationError::illegal_state("Must call associate() before calling deactivate()")
        })?;
        let held = scope.conversation_lock.take();
        let conversation = self.current_conversation(scope)?;
        let registry = self.registry(&request)?;

        let finished = if conversation.is_transient() {
            if let Some(store) = scope.bean_store.as_deref_mut() {
                let destroyed = destroy_bean_store(store);
                debug!(instances = destroyed, "Transient conversation cleaned up");
            }
            Ok(())
        } else {
            conversation.touch();
            match scope.bean_store.as_deref_mut() {
                Some(store) if !store.is_attached() => {
                    self.publish(&request, &registry, &conversation, store)
                }
                _ => Ok(()),
            }
        };
        drop(held);

        scope.bean_store = None;

        let session = self.storage.session_from_request(&request, false);
        for (cid, _) in registry.drain_transient() {
            self.destroy_conversation(session.as_ref(), &cid).await;
        }

        scope.active = false;
        debug!("Conversation context deactivated");
        finished
    }

    fn publish(
        &self,
        request: &S::Request,
        registry: &ConversationRegistry,
        conversation: &Arc<ManagedConversation>,
        store: &mut dyn BoundBeanStore,
    ) -> Result<()> {
        let Some(ScopeAttribute::NamingScheme(naming)) = self
            .storage
            .request_attribute(request, NAMING_SCHEME_ATTRIBUTE)
        else {
            return Err(ConversationError::illegal_state(
                "Unable to find the naming scheme of the conversation bean store",
            ));
        };
        let cid = conversation.id().ok_or_else(|| {
            ConversationError::illegal_state("A long-running conversation must have an id")
        })?;

        // a long-running conversation outlives the request only through its session
        if self.storage.session_from_request(request, true).is_none() {
            return Err(ConversationError::Storage(
                "Unable to create a session for a long-running conversation".to_string(),
            ));
        }

        // keeps other requests out until the instances are written through
        let _held = conversation.try_lock().ok_or_else(|| {
            ConversationError::illegal_state("A new conversation is locked by another request")
        })?;
        if registry
            .try_insert(cid.as_str(), Arc::clone(conversation))
            .is_err()
        {
            conversation.mark_ended();
            let destroyed = destroy_bean_store(store);
            warn!(
                cid = %cid,
                instances = destroyed,
                "Conversation id taken by another request, conversation discarded"
            );
            return Err(ConversationError::ConversationIdInUse(cid));
        }
        naming.set_cid(cid.as_str());
        store.attach();
        info!(cid = %cid, "Conversation promoted to long-running");
        Ok(())
    }

    /// End every long-running conversation that has been idle past its timeout.
    ///
    /// Ended conversations are destroyed by the next `deactivate` of any request in
    /// the session. Returns how many conversations were ended.
    ///
    /// # Errors
    ///
    /// `IllegalState` if no request is associated.
    pub fn invalidate(&self, scope: &ExecutionScope<S::Request>) -> Result<usize> {
        let request = associated_request(scope, "invalidate")?;
        let now = Utc::now();
        let mut ended = 0;
        for conversation in self.registry(request)?.conversations() {
            if conversation.is_expired_at(now) && conversation.mark_ended() {
                ended += 1;
            }
        }
        if ended > 0 {
            info!(ended, "Expired conversations ended");
        }
        Ok(ended)
    }

    /// Destroy every conversation of `session`, typically when the session ends.
    ///
    /// The conversation bound to the scope survives: it is only ended, and its bean
    /// store is reattached afterwards so the running request can finish with it.
    /// Returns `true` once done.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn destroy(
        &self,
        scope: &mut ExecutionScope<S::Request>,
        session: &S::Session,
    ) -> Result<bool> {
        let mut previous = scope.bean_store.take();
        if let Some(store) = previous.as_deref_mut() {
            store.detach();
        }
        let guard = ScopeRestore {
            scope,
            store: previous,
        };

        let Some(ScopeAttribute::Registry(registry)) = self
            .storage
            .session_attribute_from_session(session, CONVERSATIONS_ATTRIBUTE)
        else {
            return Ok(true);
        };

        guard.scope.active = true;
        let mut destroyed = 0usize;
        for conversation in registry.conversations() {
            conversation.mark_ended();
            let Some(cid) = conversation.id() else {
                continue;
            };
            if self.is_current_conversation(&*guard.scope, &cid) {
                continue;
            }
            self.destroy_conversation(Some(session), &cid).await;
            destroyed += 1;
        }

        info!(destroyed, "Session conversations destroyed");
        Ok(true)
    }

    fn is_current_conversation(&self, scope: &ExecutionScope<S::Request>, cid: &str) -> bool {
        let Some(request) = scope.request.as_ref() else {
            return false;
        };
        match self
            .storage
            .request_attribute(request, CURRENT_CONVERSATION_ATTRIBUTE)
        {
            Some(ScopeAttribute::Conversation(current)) => current.id().as_deref() == Some(cid),
            _ => false,
        }
    }

    async fn destroy_conversation(&self, session: Option<&S::Session>, cid: &str) {
        let Some(session) = session else {
            return;
        };
        let destroyed = {
            let naming = Arc::new(ConversationNamingScheme::new(BEAN_STORE_PREFIX, cid));
            let mut store = self.storage.create_session_bean_store(naming, session);
            store.attach();
            let destroyed = destroy_bean_store(store.as_mut());
            store.detach();
            destroyed
        };
        debug!(cid = %cid, instances = destroyed, "Conversation destroyed");
        self.observers.notify_destroyed(cid).await;
    }

    /// Draw the next conversation id from the session's generator.
    ///
    /// # Errors
    ///
    /// `IllegalState` if no request is associated.
    pub fn generate_conversation_id(&self, scope: &ExecutionScope<S::Request>) -> Result<String> {
        let request = associated_request(scope, "generate a conversation id")?;
        match self
            .storage
            .request_attribute(request, CONVERSATION_ID_GENERATOR_ATTRIBUTE)
        {
            Some(ScopeAttribute::IdGenerator(generator)) => Ok(generator.next_id()),
            _ => Err(ConversationError::illegal_state(
                "Unable to find the conversation id generator",
            )),
        }
    }

    /// Whether the context is active for `scope`
    pub fn is_active(&self, scope: &ExecutionScope<S::Request>) -> bool {
        scope.active
    }

    /// The conversation the scope's request is bound to.
    ///
    /// # Errors
    ///
    /// `IllegalState` if no request is associated or none was activated.
    pub fn current_conversation(
        &self,
        scope: &ExecutionScope<S::Request>,
    ) -> Result<Arc<ManagedConversation>> {
        let request = associated_request(scope, "load the current conversation")?;
        match self
            .storage
            .request_attribute(request, CURRENT_CONVERSATION_ATTRIBUTE)
        {
            Some(ScopeAttribute::Conversation(conversation)) => Ok(conversation),
            _ => Err(ConversationError::illegal_state(
                "Unable to find the current conversation",
            )),
        }
    }

    /// Look up a long-running conversation of the session
    pub fn conversation(
        &self,
        scope: &ExecutionScope<S::Request>,
        cid: &str,
    ) -> Result<Option<Arc<ManagedConversation>>> {
        let request = associated_request(scope, "load the known conversations")?;
        Ok(self.registry(request)?.get(cid))
    }

    /// Every conversation the session knows
    pub fn conversations(
        &self,
        scope: &ExecutionScope<S::Request>,
    ) -> Result<Vec<Arc<ManagedConversation>>> {
        let request = associated_request(scope, "load the known conversations")?;
        Ok(self.registry(request)?.conversations())
    }

    /// Make the current conversation long-running.
    ///
    /// Without an id the conversation keeps the id it had or gets a generated one.
    ///
    /// # Errors
    ///
    /// `ContextNotActive` outside an active context, `IllegalState` if the current
    /// conversation is already long-running or already carries a different id, and
    /// `ConversationIdInUse` if another conversation of the session uses `cid`.
    pub fn begin_conversation(
        &self,
        scope: &ExecutionScope<S::Request>,
        cid: Option<&str>,
    ) -> Result<String> {
        if !scope.active {
            return Err(ConversationError::ContextNotActive);
        }
        let current = self.current_conversation(scope)?;
        if !current.is_transient() {
            return Err(ConversationError::illegal_state(
                "begin() called on a long-running conversation",
            ));
        }

        let id = match (cid, current.id()) {
            (Some(cid), Some(existing)) if cid == existing => Some(existing),
            (Some(cid), Some(existing)) => {
                return Err(ConversationError::illegal_state(format!(
                    "Conversation {existing} cannot be renamed to {cid}"
                )));
            }
            (Some(cid), None) => {
                if self.conversation(scope, cid)?.is_some() {
                    return Err(ConversationError::ConversationIdInUse(cid.to_string()));
                }
                Some(cid.to_string())
            }
            (None, None) => Some(self.generate_conversation_id(scope)?),
            (None, Some(_)) => None,
        };

        let cid = current.begin(id)?;
        debug!(cid = %cid, "Conversation begun");
        Ok(cid)
    }

    /// Mark the current conversation ended so it is destroyed at deactivation.
    ///
    /// # Errors
    ///
    /// `ContextNotActive` outside an active context and `IllegalState` if the current
    /// conversation is transient.
    pub fn end_conversation(&self, scope: &ExecutionScope<S::Request>) -> Result<()> {
        if !scope.active {
            return Err(ConversationError::ContextNotActive);
        }
        let current = self.current_conversation(scope)?;
        current.end()?;
        debug!(cid = ?current.id(), "Conversation ended");
        Ok(())
    }

    /// The instance of `bean_id` in the current conversation, if one exists.
    ///
    /// # Errors
    ///
    /// `ContextNotActive` outside an active context and `IllegalState` if the stored
    /// instance is not a `T`.
    pub fn get<T: Send + Sync + 'static>(
        &self,
        scope: &ExecutionScope<S::Request>,
        bean_id: &str,
    ) -> Result<Option<Arc<T>>> {
        let store = active_store(scope)?;
        store.get(bean_id).map(downcast::<T>).transpose()
    }

    /// The instance of `bean` in the current conversation, created on first use.
    ///
    /// # Errors
    ///
    /// `ContextNotActive` outside an active context, `Invocation` if construction or
    /// a post-construct callback fails.
    pub fn get_or_create<T: Send + Sync + 'static>(
        &self,
        scope: &mut ExecutionScope<S::Request>,
        bean: &ConversationScopedBean<T>,
    ) -> Result<Arc<T>> {
        let store = active_store_mut(scope)?;
        if let Some(existing) = store.get(bean.id()) {
            return downcast(existing);
        }
        let instance = bean.create()?;
        let value = instance.value();
        store.put(bean.id(), Arc::new(instance));
        Ok(value)
    }

    /// Remove and destroy the instance of `bean_id`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// `ContextNotActive` outside an active context, `Invocation` if a pre-destroy
    /// callback fails. The instance is removed either way.
    pub fn remove(&self, scope: &mut ExecutionScope<S::Request>, bean_id: &str) -> Result<bool> {
        let store = active_store_mut(scope)?;
        match store.remove(bean_id) {
            Some(instance) => {
                instance.destroy()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn registry(&self, request: &S::Request) -> Result<Arc<ConversationRegistry>> {
        match self.storage.request_attribute(request, CONVERSATIONS_ATTRIBUTE) {
            Some(ScopeAttribute::Registry(registry)) => Ok(registry),
            _ => Err(ConversationError::illegal_state(
                "Unable to load current conversations from the associated request",
            )),
        }
    }
}

impl<S: ConversationStorage> std::fmt::Debug for ConversationContext<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationContext")
            .field("config", &*self.config.read())
            .field("observers", &self.observers.len())
            .finish()
    }
}

fn associated_request<'a, R>(scope: &'a ExecutionScope<R>, operation: &str) -> Result<&'a R> {
    scope.request.as_ref().ok_or_else(|| {
        ConversationError::illegal_state(format!(
            "A request must be associated with the context in order to {operation}"
        ))
    })
}

fn active_store<R>(scope: &ExecutionScope<R>) -> Result<&dyn BoundBeanStore> {
    match scope.bean_store.as_deref() {
        Some(store) if scope.active => Ok(store),
        _ => Err(ConversationError::ContextNotActive),
    }
}

fn active_store_mut<R>(scope: &mut ExecutionScope<R>) -> Result<&mut dyn BoundBeanStore> {
    if !scope.active {
        return Err(ConversationError::ContextNotActive);
    }
    match scope.bean_store.as_deref_mut() {
        Some(store) => Ok(store),
        None => Err(ConversationError::ContextNotActive),
    }
}

fn downcast<T: Send + Sync + 'static>(instance: Arc<dyn ContextualInstance>) -> Result<Arc<T>> {
    instance.instance().downcast::<T>().map_err(|_| {
        ConversationError::illegal_state(format!(
            "Instance of {} is not a {}",
            instance.bean_id(),
            std::any::type_name::<T>()
        ))
    })
}

/// Remove and destroy every instance in `store`, logging failures
fn destroy_bean_store(store: &mut dyn BoundBeanStore) -> usize {
    let mut destroyed = 0;
    for id in store.ids() {
        if let Some(instance) = store.remove(&id) {
            if let Err(e) = instance.destroy() {
                error!(bean = %id, error = %e, "Failed to destroy conversation scoped instance");
            }
            destroyed += 1;
        }
    }
    destroyed
}

/// Puts the scope's bean store back after `destroy`
struct ScopeRestore<'a, R> {
    scope: &'a mut ExecutionScope<R>,
    store: Option<Box<dyn BoundBeanStore>>,
}

impl<R> Drop for ScopeRestore<'_, R> {
    fn drop(&mut self) {
        match self.store.take() {
            Some(mut store) => {
                store.attach();
                self.scope.bean_store = Some(store);
                self.scope.active = true;
            }
            None => self.scope.cleanup(),
        }
    }
}

/// Clears the request's conversation state once `dissociate` is done with it
struct DissociateCleanup<'a, S: ConversationStorage> {
    storage: &'a S,
    scope: &'a mut ExecutionScope<S::Request>,
    request: &'a S::Request,
}

impl<S: ConversationStorage> Drop for DissociateCleanup<'_, S> {
    fn drop(&mut self) {
        for name in [
            CONVERSATION_ID_GENERATOR_ATTRIBUTE,
            CONVERSATIONS_ATTRIBUTE,
            CURRENT_CONVERSATION_ATTRIBUTE,
            NAMING_SCHEME_ATTRIBUTE,
        ] {
            self.storage.remove_request_attribute(self.request, name);
        }
        self.scope.request = None;
        self.scope.cleanup();
    }
}
