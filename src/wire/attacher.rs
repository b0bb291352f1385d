//! Extension points the connector dispatches to

use std::sync::Arc;

use crate::core::{Instance, RuntimeResult};

use super::{
    chain::{Interceptor, Wire},
    definition::{InterceptorDefinition, WireSourceDefinition, WireTargetDefinition},
};

/// Hands out target instances directly on the optimizable path
pub trait ObjectFactory: Send + Sync {
    fn get_instance(&self) -> RuntimeResult<Instance>;

    /// Return an instance once the caller is done with it
    fn release_instance(&self, _instance: Instance) -> RuntimeResult<()> {
        Ok(())
    }
}

/// Attaches the reference side of a wire
pub trait SourceWireAttacher: Send + Sync {
    /// Take ownership of a finished, sealed wire
    fn attach(
        &self,
        source: &dyn WireSourceDefinition,
        target: &dyn WireTargetDefinition,
        wire: Arc<Wire>,
    ) -> RuntimeResult<()>;

    fn detach(
        &self,
        source: &dyn WireSourceDefinition,
        target: &dyn WireTargetDefinition,
    ) -> RuntimeResult<()>;

    /// Take a direct object factory instead of a wire
    fn attach_object_factory(
        &self,
        source: &dyn WireSourceDefinition,
        factory: Arc<dyn ObjectFactory>,
        target: &dyn WireTargetDefinition,
    ) -> RuntimeResult<()>;

    fn detach_object_factory(
        &self,
        source: &dyn WireSourceDefinition,
        target: &dyn WireTargetDefinition,
    ) -> RuntimeResult<()>;
}

/// Attaches the service side of a wire
pub trait TargetWireAttacher: Send + Sync {
    /// Install the dispatch to the target, normally by appending a tail
    /// interceptor to every chain. Runs before the wire is sealed.
    fn attach(
        &self,
        source: &dyn WireSourceDefinition,
        target: &dyn WireTargetDefinition,
        wire: &mut Wire,
    ) -> RuntimeResult<()>;

    fn detach(
        &self,
        source: &dyn WireSourceDefinition,
        target: &dyn WireTargetDefinition,
    ) -> RuntimeResult<()>;

    /// Factory for the optimizable path
    fn create_object_factory(
        &self,
        target: &dyn WireTargetDefinition,
    ) -> RuntimeResult<Arc<dyn ObjectFactory>>;
}

pub trait InterceptorBuilder: Send + Sync {
    fn build(&self, definition: &dyn InterceptorDefinition) -> RuntimeResult<Arc<dyn Interceptor>>;
}
