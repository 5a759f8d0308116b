//! Conversation scoped beans and their instances

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::beanstore::ContextualInstance;
use crate::error::{ConversationError, Result};
use crate::lifecycle::{DefaultLifecycleCallbackInvoker, Instantiator, LifecycleCallbackInvoker};

/// Definition of a bean whose instances live in the current conversation.
///
/// The bean id names the instance inside a conversation's bean store, so two beans
/// sharing an id share an instance.
pub struct ConversationScopedBean<T> {
    id: String,
    instantiator: Arc<dyn Instantiator<T>>,
    invoker: Arc<dyn LifecycleCallbackInvoker<T>>,
}

impl<T: Send + Sync + 'static> ConversationScopedBean<T> {
    /// Define a bean without lifecycle callbacks
    pub fn new(id: impl Into<String>, instantiator: impl Instantiator<T> + 'static) -> Self {
        Self {
            id: id.into(),
            instantiator: Arc::new(instantiator),
            invoker: Arc::new(DefaultLifecycleCallbackInvoker::new()),
        }
    }

    /// Run the given callbacks after construction and before destruction
    pub fn with_callbacks(mut self, invoker: impl LifecycleCallbackInvoker<T> + 'static) -> Self {
        self.invoker = Arc::new(invoker);
        self
    }

    /// Bean id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Construct an instance and run its post-construct callbacks
    pub(crate) fn create(&self) -> Result<ManagedInstance<T>> {
        let instance =
            self.instantiator
                .new_instance()
                .map_err(|source| ConversationError::Invocation {
                    method: "new_instance".to_string(),
                    instance: self.id.clone(),
                    source,
                })?;
        self.invoker
            .post_construct(&instance, self.instantiator.as_ref())?;

        Ok(ManagedInstance {
            bean_id: self.id.clone(),
            instance: Arc::new(instance),
            instantiator: Arc::clone(&self.instantiator),
            invoker: Arc::clone(&self.invoker),
            destroyed: AtomicBool::new(false),
        })
    }
}

impl<T> std::fmt::Debug for ConversationScopedBean<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationScopedBean")
            .field("id", &self.id)
            .finish()
    }
}

/// A constructed instance together with what it needs to be destroyed
pub(crate) struct ManagedInstance<T> {
    bean_id: String,
    instance: Arc<T>,
    instantiator: Arc<dyn Instantiator<T>>,
    invoker: Arc<dyn LifecycleCallbackInvoker<T>>,
    destroyed: AtomicBool,
}

impl<T> ManagedInstance<T> {
    pub(crate) fn value(&self) -> Arc<T> {
        Arc::clone(&self.instance)
    }
}

impl<T: Send + Sync + 'static> ContextualInstance for ManagedInstance<T> {
    fn bean_id(&self) -> &str {
        &self.bean_id
    }

    fn instance(&self) -> Arc<dyn Any + Send + Sync> {
        self.instance.clone()
    }

    fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.invoker
            .pre_destroy(&self.instance, self.instantiator.as_ref())
    }
}
