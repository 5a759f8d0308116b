//! Conversations, their registry and id generation
//!
//! A conversation starts transient, becomes long-running once begun and survives its
//! first request, and is destroyed once ended or expired.
//!
//! # Example
//!
//! ```rust
//! use dialogos_core::conversation::{ConversationIdGenerator, ConversationRegistry, ManagedConversation};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let generator = ConversationIdGenerator::new();
//! let registry = ConversationRegistry::new();
//!
//! let conversation = Arc::new(ManagedConversation::new(Duration::from_secs(600)));
//! let id = conversation.begin(Some(generator.next_id())).unwrap();
//! registry.insert(id.clone(), conversation);
//!
//! assert!(registry.contains(&id));
//! ```

mod id_generator;
mod managed;
mod registry;

pub use id_generator::ConversationIdGenerator;
pub use managed::{ConversationLock, ConversationSnapshot, ManagedConversation};
pub use registry::ConversationRegistry;
