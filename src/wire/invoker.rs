//! Dispatch from a wire into a scope container

use std::sync::Arc;

use log::warn;

use crate::{
    core::{Instance, RuntimeResult, ScopedComponent},
    scope::ScopeContainer,
};

use super::{
    attacher::ObjectFactory,
    chain::{Interceptor, Next},
    message::Message,
};

/// A target operation invoked on a live component instance.
///
/// Business faults are returned as `Ok` fault messages; `Err` is reserved
/// for infrastructure failures.
pub trait TargetOperation: Send + Sync {
    fn invoke(&self, instance: &Instance, message: Message) -> RuntimeResult<Message>;
}

/// Tail interceptor: obtains an instance from the component's scope
/// container, invokes the operation on it and releases it again.
pub struct ScopedInvoker {
    component: Arc<dyn ScopedComponent>,
    container: Arc<dyn ScopeContainer>,
    operation: Arc<dyn TargetOperation>,
}

impl ScopedInvoker {
    pub fn new(
        component: Arc<dyn ScopedComponent>,
        container: Arc<dyn ScopeContainer>,
        operation: Arc<dyn TargetOperation>,
    ) -> Self {
        Self {
            component,
            container,
            operation,
        }
    }
}

impl Interceptor for ScopedInvoker {
    fn invoke(&self, message: Message, _next: Next<'_>) -> RuntimeResult<Message> {
        let instance = self.container.get_instance(&self.component)?;
        let result = self.operation.invoke(&instance, message);
        if let Err(e) = self
            .container
            .release_instance(self.component.as_ref(), instance)
        {
            warn!("Failed to release instance of {}: {}", self.component.uri(), e);
        }
        result
    }
}

/// Object factory backed by a scope container
pub struct ScopedObjectFactory {
    component: Arc<dyn ScopedComponent>,
    container: Arc<dyn ScopeContainer>,
}

impl ScopedObjectFactory {
    pub fn new(component: Arc<dyn ScopedComponent>, container: Arc<dyn ScopeContainer>) -> Self {
        Self {
            component,
            container,
        }
    }
}

impl ObjectFactory for ScopedObjectFactory {
    fn get_instance(&self) -> RuntimeResult<Instance> {
        self.container.get_instance(&self.component)
    }

    fn release_instance(&self, instance: Instance) -> RuntimeResult<()> {
        self.container
            .release_instance(self.component.as_ref(), instance)
    }
}
