//! # Dialogos - Conversation Scope Lifecycle Management
//!
//! Dialogos manages conversation scoped state for request/session based applications:
//! - Transient conversations that live for a single request
//! - Long-running conversations that survive across requests of a session
//! - Exclusive access to a conversation through a timed lock
//! - Expiry of idle conversations and cleanup when a session ends
//! - Post-construct and pre-destroy callbacks for conversation scoped instances
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dialogos_core::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let storage = Arc::new(InMemoryStorage::new());
//!     let context = ConversationContext::new(Arc::clone(&storage), ConversationConfig::load()?);
//!
//!     let request = storage.request().with_parameter("cid", "1");
//!     let mut scope = ExecutionScope::new();
//!     context.associate(&mut scope, request.clone())?;
//!
//!     let cid = context.requested_conversation_id(&request);
//!     let outcome = context.activate(&mut scope, cid.as_deref()).await?;
//!     if let Some(err) = outcome.error() {
//!         tracing::warn!(error = %err, "Continuing in a transient conversation");
//!     }
//!
//!     context.deactivate(&mut scope).await?;
//!     context.dissociate(&mut scope, &request)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Context**: [`context::ConversationContext`] drives association, activation,
//!   deactivation and session destruction
//! - **Storage**: [`storage::ConversationStorage`] abstracts requests and sessions
//! - **Bean stores**: per-conversation partitions of the session holding instances
//! - **Events**: observers hear about destroyed conversations

pub mod beanstore;
pub mod config;
pub mod context;
pub mod conversation;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod storage;

pub use error::{ConversationError, Result};

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::beanstore::{BoundBeanStore, ContextualInstance, ConversationNamingScheme};
    pub use crate::config::{ConfigBuilder, ConversationConfig};
    pub use crate::context::{
        ActivationOutcome, ConversationContext, ConversationScopedBean, ExecutionScope,
        FallbackReason,
    };
    pub use crate::conversation::{
        ConversationIdGenerator, ConversationLock, ConversationRegistry, ConversationSnapshot,
        ManagedConversation,
    };
    pub use crate::error::{ConversationError, Result};
    pub use crate::events::{
        ConversationEvent, ConversationEventKind, ConversationObserver, LoggingObserver,
        ObserverRegistry,
    };
    pub use crate::lifecycle::{
        DefaultLifecycleCallbackInvoker, FnInstantiator, Instantiator, LifecycleCallbackInvoker,
        LifecycleInterceptor, LifecycleMethod,
    };
    pub use crate::storage::memory::{InMemoryStorage, MemoryRequest, MemorySession};
    pub use crate::storage::{ConversationStorage, ScopeAttribute};
}
