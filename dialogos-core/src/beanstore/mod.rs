//! Bean stores: the storage partitions holding conversation scoped instances
//!
//! A bound bean store starts detached, holding its instances locally. Attaching it
//! publishes the instances under names derived from its
//! [`ConversationNamingScheme`] so that later requests naming the same conversation
//! find them again.

mod attribute;
mod naming;

pub use attribute::{AttributeBacking, AttributeBeanStore};
pub use naming::{ConversationNamingScheme, TRANSIENT_CID};

use std::any::Any;
use std::sync::Arc;

use crate::error::Result;

/// A type-erased instance living in a bean store
pub trait ContextualInstance: Send + Sync {
    /// Id of the bean the instance belongs to
    fn bean_id(&self) -> &str;

    /// The instance itself, for downcasting
    fn instance(&self) -> Arc<dyn Any + Send + Sync>;

    /// Run the instance's destruction callbacks. Repeated calls are no-ops.
    fn destroy(&self) -> Result<()>;
}

/// A bean store that can be attached to and detached from its backing storage
pub trait BoundBeanStore: Send {
    /// Look up an instance by bean id
    fn get(&self, id: &str) -> Option<Arc<dyn ContextualInstance>>;

    /// Store an instance
    fn put(&mut self, id: &str, instance: Arc<dyn ContextualInstance>);

    /// Remove an instance
    fn remove(&mut self, id: &str) -> Option<Arc<dyn ContextualInstance>>;

    /// Ids of all stored instances
    fn ids(&self) -> Vec<String>;

    /// Bind the store to its backing storage. Returns `false` if already attached.
    fn attach(&mut self) -> bool;

    /// Unbind the store from its backing storage. Returns `false` if not attached.
    fn detach(&mut self) -> bool;

    /// Whether the store is bound to its backing storage
    fn is_attached(&self) -> bool;
}
