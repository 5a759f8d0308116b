//! The conversation context and the per-request state it works on
//!
//! # Example
//!
//! ```rust,no_run
//! use dialogos_core::config::ConversationConfig;
//! use dialogos_core::context::{ConversationContext, ExecutionScope};
//! use dialogos_core::storage::memory::InMemoryStorage;
//! use std::sync::Arc;
//!
//! # async fn run() -> dialogos_core::Result<()> {
//! let storage = Arc::new(InMemoryStorage::new());
//! let context = ConversationContext::new(Arc::clone(&storage), ConversationConfig::default());
//!
//! let request = storage.request();
//! let mut scope = ExecutionScope::new();
//! context.associate(&mut scope, request.clone())?;
//! context.activate(&mut scope, None).await?;
//!
//! let cid = context.begin_conversation(&scope, None)?;
//!
//! context.deactivate(&mut scope).await?;
//! context.dissociate(&mut scope, &request)?;
//!
//! // a later request in the same session picks the conversation up again
//! let next = storage.request_for_session(&request.session_id().unwrap_or_default());
//! context.associate(&mut scope, next)?;
//! let outcome = context.activate(&mut scope, Some(&cid)).await?;
//! assert!(!outcome.is_fallback());
//! # Ok(())
//! # }
//! ```

mod activation;
mod bean;
mod manager;
mod scope;


pub use activation::{ActivationOutcome, FallbackReason};
pub use bean::ConversationScopedBean;
pub use manager::ConversationContext;
pub use scope::ExecutionScope;
