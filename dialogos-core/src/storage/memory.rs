//! In-memory storage for testing and single-process deployments
//!
//! Sessions live in a map owned by [`InMemoryStorage`]. A [`MemoryRequest`] either
//! joins an existing session or starts without one; its session is created lazily
//! the first time something has to be written into it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{ConversationStorage, ScopeAttribute};
use crate::beanstore::{AttributeBacking, AttributeBeanStore, BoundBeanStore, ConversationNamingScheme};
use crate::error::Result;

type SessionMap = Arc<RwLock<HashMap<String, MemorySession>>>;

/// An in-memory session
#[derive(Clone, Debug)]
pub struct MemorySession {
    id: String,
    attributes: Arc<RwLock<HashMap<String, ScopeAttribute>>>,
}

impl MemorySession {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            attributes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Session id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Read an attribute
    pub fn attribute(&self, name: &str) -> Option<ScopeAttribute> {
        self.attributes.read().get(name).cloned()
    }

    /// Write an attribute
    pub fn set_attribute(&self, name: &str, value: ScopeAttribute) {
        self.attributes.write().insert(name.to_string(), value);
    }

    /// Remove an attribute
    pub fn remove_attribute(&self, name: &str) -> Option<ScopeAttribute> {
        self.attributes.write().remove(name)
    }

    /// Names of all attributes
    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.read().keys().cloned().collect()
    }
}

#[derive(Debug)]
struct MemoryRequestInner {
    id: String,
    attributes: RwLock<HashMap<String, ScopeAttribute>>,
    parameters: RwLock<HashMap<String, String>>,
    session: RwLock<Option<MemorySession>>,
    sessions: SessionMap,
}

/// An in-memory request. Clones share state.
#[derive(Clone, Debug)]
pub struct MemoryRequest {
    inner: Arc<MemoryRequestInner>,
}

impl MemoryRequest {
    fn new(sessions: SessionMap, session: Option<MemorySession>) -> Self {
        Self {
            inner: Arc::new(MemoryRequestInner {
                id: Uuid::new_v4().to_string(),
                attributes: RwLock::new(HashMap::new()),
                parameters: RwLock::new(HashMap::new()),
                session: RwLock::new(session),
                sessions,
            }),
        }
    }

    /// Request id
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Add a request parameter
    pub fn with_parameter(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner
            .parameters
            .write()
            .insert(name.into(), value.into());
        self
    }

    /// Read a request parameter
    pub fn parameter(&self, name: &str) -> Option<String> {
        self.inner.parameters.read().get(name).cloned()
    }

    /// Read a request attribute
    pub fn attribute(&self, name: &str) -> Option<ScopeAttribute> {
        self.inner.attributes.read().get(name).cloned()
    }

    /// Names of all request attributes
    pub fn attribute_names(&self) -> Vec<String> {
        self.inner.attributes.read().keys().cloned().collect()
    }

    /// Session the request is bound to, if any
    pub fn session(&self) -> Option<MemorySession> {
        self.inner.session.read().clone()
    }

    /// Id of the session the request is bound to, if any
    pub fn session_id(&self) -> Option<String> {
        self.inner.session.read().as_ref().map(|s| s.id.clone())
    }

    fn session_or_create(&self) -> MemorySession {
        let mut slot = self.inner.session.write();
        if let Some(session) = slot.as_ref() {
            return session.clone();
        }
        let session = MemorySession::new();
        debug!(session_id = %session.id, request_id = %self.inner.id, "Session created");
        self.inner
            .sessions
            .write()
            .insert(session.id.clone(), session.clone());
        *slot = Some(session.clone());
        session
    }
}

/// Backing reaching the session through a request, creating it on first write
struct LazySessionBacking {
    request: MemoryRequest,
}

impl AttributeBacking for LazySessionBacking {
    fn attribute(&self, name: &str) -> Option<ScopeAttribute> {
        self.request.session()?.attribute(name)
    }

    fn set_attribute(&self, name: &str, value: ScopeAttribute) {
        self.request.session_or_create().set_attribute(name, value);
    }

    fn remove_attribute(&self, name: &str) {
        if let Some(session) = self.request.session() {
            session.remove_attribute(name);
        }
    }

    fn attribute_names(&self) -> Vec<String> {
        self.request
            .session()
            .map(|s| s.attribute_names())
            .unwrap_or_default()
    }
}

/// Backing writing straight into a session
struct EagerSessionBacking {
    session: MemorySession,
}

impl AttributeBacking for EagerSessionBacking {
    fn attribute(&self, name: &str) -> Option<ScopeAttribute> {
        self.session.attribute(name)
    }

    fn set_attribute(&self, name: &str, value: ScopeAttribute) {
        self.session.set_attribute(name, value);
    }

    fn remove_attribute(&self, name: &str) {
        self.session.remove_attribute(name);
    }

    fn attribute_names(&self) -> Vec<String> {
        self.session.attribute_names()
    }
}

/// In-memory [`ConversationStorage`]
#[derive(Clone, Debug, Default)]
pub struct InMemoryStorage {
    sessions: SessionMap,
}

impl InMemoryStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request without a session
    pub fn request(&self) -> MemoryRequest {
        MemoryRequest::new(Arc::clone(&self.sessions), None)
    }

    /// Start a request joining the session `session_id`.
    ///
    /// An unknown id yields a request without a session.
    pub fn request_for_session(&self, session_id: &str) -> MemoryRequest {
        let session = self.session(session_id);
        MemoryRequest::new(Arc::clone(&self.sessions), session)
    }

    /// Look up a session
    pub fn session(&self, session_id: &str) -> Option<MemorySession> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Remove a session, typically right before destroying its conversations
    pub fn remove_session(&self, session_id: &str) -> Option<MemorySession> {
        self.sessions.write().remove(session_id)
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}

impl ConversationStorage for InMemoryStorage {
    type Request = MemoryRequest;
    type Session = MemorySession;

    fn request_attribute(&self, request: &MemoryRequest, name: &str) -> Option<ScopeAttribute> {
        request.attribute(name)
    }

    fn set_request_attribute(&self, request: &MemoryRequest, name: &str, value: ScopeAttribute) {
        request
            .inner
            .attributes
            .write()
            .insert(name.to_string(), value);
    }

    fn remove_request_attribute(&self, request: &MemoryRequest, name: &str) {
        request.inner.attributes.write().remove(name);
    }

    fn session_attribute(
        &self,
        request: &MemoryRequest,
        name: &str,
        create: bool,
    ) -> Result<Option<ScopeAttribute>> {
        Ok(self
            .session_from_request(request, create)
            .and_then(|session| session.attribute(name)))
    }

    fn set_session_attribute(
        &self,
        request: &MemoryRequest,
        name: &str,
        value: ScopeAttribute,
        create: bool,
    ) -> Result<()> {
        if let Some(session) = self.session_from_request(request, create) {
            session.set_attribute(name, value);
        }
        Ok(())
    }

    fn session_attribute_from_session(
        &self,
        session: &MemorySession,
        name: &str,
    ) -> Option<ScopeAttribute> {
        session.attribute(name)
    }

    fn create_request_bean_store(
        &self,
        naming: Arc<ConversationNamingScheme>,
        request: &MemoryRequest,
    ) -> Box<dyn BoundBeanStore> {
        Box::new(AttributeBeanStore::new(
            naming,
            LazySessionBacking {
                request: request.clone(),
            },
        ))
    }

    fn create_session_bean_store(
        &self,
        naming: Arc<ConversationNamingScheme>,
        session: &MemorySession,
    ) -> Box<dyn BoundBeanStore> {
        Box::new(AttributeBeanStore::new(
            naming,
            EagerSessionBacking {
                session: session.clone(),
            },
        ))
    }

    fn session_from_request(&self, request: &MemoryRequest, create: bool) -> Option<MemorySession> {
        if create {
            Some(request.session_or_create())
        } else {
            request.session()
        }
    }

    fn request_parameter(&self, request: &MemoryRequest, name: &str) -> Option<String> {
        request.parameter(name)
    }
}
