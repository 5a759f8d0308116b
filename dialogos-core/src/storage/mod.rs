//! Request and session storage consumed by the conversation context
//!
//! The context never talks to a transport directly. Everything it needs from the
//! environment (request attributes, session attributes, bean store partitions and
//! session lookup) goes through [`ConversationStorage`]. [`memory`] provides an
//! in-process implementation.

pub mod memory;

use std::sync::Arc;

use crate::beanstore::{BoundBeanStore, ContextualInstance, ConversationNamingScheme};
use crate::conversation::{ConversationIdGenerator, ConversationRegistry, ManagedConversation};
use crate::error::Result;

/// Request/session attribute holding the session's id generator
pub const CONVERSATION_ID_GENERATOR_ATTRIBUTE: &str = "dialogos::conversation::id_generator";

/// Request/session attribute holding the session's conversation registry
pub const CONVERSATIONS_ATTRIBUTE: &str = "dialogos::conversation::conversations";

/// Request attribute holding the conversation the request is bound to
pub const CURRENT_CONVERSATION_ATTRIBUTE: &str = "dialogos::conversation::current";

/// Request attribute holding the naming scheme of a transient conversation's bean store
pub const NAMING_SCHEME_ATTRIBUTE: &str = "dialogos::conversation::naming_scheme";

/// Prefix of bean store attribute names
pub const BEAN_STORE_PREFIX: &str = "dialogos::conversation";

/// Value stored in a request or session attribute
#[derive(Clone)]
pub enum ScopeAttribute {
    /// A session's id generator
    IdGenerator(Arc<ConversationIdGenerator>),
    /// A session's conversation registry
    Registry(Arc<ConversationRegistry>),
    /// The conversation a request is bound to
    Conversation(Arc<ManagedConversation>),
    /// Naming scheme of a request's bean store
    NamingScheme(Arc<ConversationNamingScheme>),
    /// A conversation scoped instance
    Instance(Arc<dyn ContextualInstance>),
}

impl ScopeAttribute {
    /// Short name of the attribute kind
    pub fn kind(&self) -> &'static str {
        match self {
            ScopeAttribute::IdGenerator(_) => "id_generator",
            ScopeAttribute::Registry(_) => "registry",
            ScopeAttribute::Conversation(_) => "conversation",
            ScopeAttribute::NamingScheme(_) => "naming_scheme",
            ScopeAttribute::Instance(_) => "instance",
        }
    }
}

impl std::fmt::Debug for ScopeAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeAttribute::Instance(instance) => f
                .debug_tuple("Instance")
                .field(&instance.bean_id())
                .finish(),
            other => f.debug_tuple(other.kind()).finish(),
        }
    }
}

/// Storage operations the conversation context needs from its environment.
///
/// `create` flags follow one rule: with `false` nothing is written and nothing is
/// read unless the session already exists; with `true` the session is created on
/// demand.
pub trait ConversationStorage: Send + Sync + 'static {
    /// Request handle
    type Request: Clone + Send + Sync + 'static;
    /// Session handle
    type Session: Clone + Send + Sync + 'static;

    /// Read a request attribute
    fn request_attribute(&self, request: &Self::Request, name: &str) -> Option<ScopeAttribute>;

    /// Write a request attribute
    fn set_request_attribute(&self, request: &Self::Request, name: &str, value: ScopeAttribute);

    /// Remove a request attribute
    fn remove_request_attribute(&self, request: &Self::Request, name: &str);

    /// Read a session attribute through the request's session
    ///
    /// # Errors
    ///
    /// Returns an error if `create` is set and the session cannot be created.
    fn session_attribute(
        &self,
        request: &Self::Request,
        name: &str,
        create: bool,
    ) -> Result<Option<ScopeAttribute>>;

    /// Write a session attribute through the request's session
    ///
    /// # Errors
    ///
    /// Returns an error if `create` is set and the session cannot be created.
    fn set_session_attribute(
        &self,
        request: &Self::Request,
        name: &str,
        value: ScopeAttribute,
        create: bool,
    ) -> Result<()>;

    /// Read a session attribute directly from a session handle
    fn session_attribute_from_session(
        &self,
        session: &Self::Session,
        name: &str,
    ) -> Option<ScopeAttribute>;

    /// Create a bean store whose backing storage is reached through the request
    fn create_request_bean_store(
        &self,
        naming: Arc<ConversationNamingScheme>,
        request: &Self::Request,
    ) -> Box<dyn BoundBeanStore>;

    /// Create a bean store backed directly by a session
    fn create_session_bean_store(
        &self,
        naming: Arc<ConversationNamingScheme>,
        session: &Self::Session,
    ) -> Box<dyn BoundBeanStore>;

    /// Resolve the request's session, creating it if `create` is set
    fn session_from_request(&self, request: &Self::Request, create: bool) -> Option<Self::Session>;

    /// Read a request parameter such as the conversation id
    fn request_parameter(&self, _request: &Self::Request, _name: &str) -> Option<String> {
        None
    }
}
