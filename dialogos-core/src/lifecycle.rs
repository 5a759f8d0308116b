//! Post-construct and pre-destroy callbacks for conversation scoped instances
//!
//! Instances that are not intercepted get their callbacks invoked directly, in
//! registration order. When the instantiator carries a [`LifecycleInterceptor`] the
//! whole callback chain is delegated to it instead.

use std::sync::Arc;

use crate::error::{ConversationError, Result};

type Callback<T> = Arc<dyn Fn(&T) -> anyhow::Result<()> + Send + Sync>;

/// A named lifecycle callback
pub struct LifecycleMethod<T> {
    name: String,
    callback: Callback<T>,
}

impl<T> LifecycleMethod<T> {
    /// Create a named callback
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            callback: Arc::new(callback),
        }
    }

    /// Callback name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Clone for LifecycleMethod<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<T> std::fmt::Debug for LifecycleMethod<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleMethod")
            .field("name", &self.name)
            .finish()
    }
}

/// Interception chain that owns lifecycle callbacks of intercepted instances
pub trait LifecycleInterceptor<T>: Send + Sync {
    /// Run the intercepted post-construct chain
    fn execute_post_construct(&self, instance: &T) -> anyhow::Result<()>;

    /// Run the intercepted pre-destroy chain
    fn execute_pre_destroy(&self, instance: &T) -> anyhow::Result<()>;
}

/// Produces instances of a bean
pub trait Instantiator<T>: Send + Sync {
    /// Create a new instance
    fn new_instance(&self) -> anyhow::Result<T>;

    /// Interception chain for instances of this bean, if any
    fn interceptor(&self) -> Option<&dyn LifecycleInterceptor<T>> {
        None
    }

    /// Whether instances are intercepted
    fn has_interceptor_support(&self) -> bool {
        self.interceptor().is_some()
    }
}

/// Instantiator backed by a closure
pub struct FnInstantiator<T> {
    factory: Box<dyn Fn() -> anyhow::Result<T> + Send + Sync>,
    interceptor: Option<Arc<dyn LifecycleInterceptor<T>>>,
}

impl<T> FnInstantiator<T> {
    /// Create an instantiator from a factory closure
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            interceptor: None,
        }
    }

    /// Delegate lifecycle callbacks to an interception chain
    pub fn with_interceptor(mut self, interceptor: Arc<dyn LifecycleInterceptor<T>>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }
}

impl<T> Instantiator<T> for FnInstantiator<T> {
    fn new_instance(&self) -> anyhow::Result<T> {
        (self.factory)()
    }

    fn interceptor(&self) -> Option<&dyn LifecycleInterceptor<T>> {
        self.interceptor.as_deref()
    }
}

/// Invokes lifecycle callbacks on an instance
pub trait LifecycleCallbackInvoker<T>: Send + Sync {
    /// Run post-construct callbacks once after construction
    fn post_construct(&self, instance: &T, instantiator: &dyn Instantiator<T>) -> Result<()>;

    /// Run pre-destroy callbacks once before destruction
    fn pre_destroy(&self, instance: &T, instantiator: &dyn Instantiator<T>) -> Result<()>;

    /// Whether any post-construct callbacks are registered
    fn has_post_construct_methods(&self) -> bool;

    /// Whether any pre-destroy callbacks are registered
    fn has_pre_destroy_methods(&self) -> bool;
}

/// Invoker holding ordered post-construct and pre-destroy callbacks
pub struct DefaultLifecycleCallbackInvoker<T> {
    post_construct: Vec<LifecycleMethod<T>>,
    pre_destroy: Vec<LifecycleMethod<T>>,
}

impl<T> Default for DefaultLifecycleCallbackInvoker<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DefaultLifecycleCallbackInvoker<T> {
    /// Create an invoker without callbacks
    pub fn new() -> Self {
        Self {
            post_construct: Vec::new(),
            pre_destroy: Vec::new(),
        }
    }

    /// Append a post-construct callback
    pub fn on_post_construct<F>(mut self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.post_construct.push(LifecycleMethod::new(name, callback));
        self
    }

    /// Append a pre-destroy callback
    pub fn on_pre_destroy<F>(mut self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.pre_destroy.push(LifecycleMethod::new(name, callback));
        self
    }

    fn invoke_methods(methods: &[LifecycleMethod<T>], instance: &T) -> Result<()> {
        for method in methods {
            (method.callback)(instance).map_err(|source| ConversationError::Invocation {
                method: method.name.clone(),
                instance: std::any::type_name::<T>().to_string(),
                source,
            })?;
        }
        Ok(())
    }
}

impl<T> LifecycleCallbackInvoker<T> for DefaultLifecycleCallbackInvoker<T>
where
    T: Send + Sync,
{
    fn post_construct(&self, instance: &T, instantiator: &dyn Instantiator<T>) -> Result<()> {
        match instantiator.interceptor() {
            Some(interceptor) => interceptor.execute_post_construct(instance).map_err(|source| {
                ConversationError::Invocation {
                    method: "post_construct".to_string(),
                    instance: std::any::type_name::<T>().to_string(),
                    source,
                }
            }),
            None => Self::invoke_methods(&self.post_construct, instance),
        }
    }

    fn pre_destroy(&self, instance: &T, instantiator: &dyn Instantiator<T>) -> Result<()> {
        match instantiator.interceptor() {
            Some(interceptor) => interceptor.execute_pre_destroy(instance).map_err(|source| {
                ConversationError::Invocation {
                    method: "pre_destroy".to_string(),
                    instance: std::any::type_name::<T>().to_string(),
                    source,
                }
            }),
            None => Self::invoke_methods(&self.pre_destroy, instance),
        }
    }

    fn has_post_construct_methods(&self) -> bool {
        !self.post_construct.is_empty()
    }

    fn has_pre_destroy_methods(&self) -> bool {
        !self.pre_destroy.is_empty()
    }
}
