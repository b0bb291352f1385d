//! Stateless scope: a new instance for every request

use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, warn};

use crate::core::{Instance, RuntimeResult, ScopedComponent};

use super::{ContextState, Scope, ScopeContainer};

/// Creates and starts an instance on every `get_instance` and stops it on
/// release. Nothing is cached, so contexts carry no state.
#[derive(Default)]
pub struct StatelessScopeContainer {
    components: RwLock<Vec<Arc<dyn ScopedComponent>>>,
}

impl StatelessScopeContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn component_count(&self) -> usize {
        self.components
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ScopeContainer for StatelessScopeContainer {
    fn scope(&self) -> Scope {
        Scope::Stateless
    }

    fn start(&self) -> RuntimeResult<()> {
        Ok(())
    }

    fn stop(&self) -> RuntimeResult<()> {
        Ok(())
    }

    fn register(&self, component: Arc<dyn ScopedComponent>) {
        let mut components = self
            .components
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if components.iter().any(|c| c.uri() == component.uri()) {
            warn!("{} already registered in STATELESS scope", component.uri());
            return;
        }
        debug!("Registering {} in STATELESS scope", component.uri());
        components.push(component);
    }

    fn unregister(&self, component: &dyn ScopedComponent) {
        self.components
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|c| c.uri() != component.uri());
    }

    fn start_context(&self, _group_id: &str) -> RuntimeResult<()> {
        Ok(())
    }

    fn stop_context(&self, _group_id: &str) -> RuntimeResult<()> {
        Ok(())
    }

    fn context_state(&self, _group_id: &str) -> ContextState {
        // every request is its own context
        ContextState::Started
    }

    fn get_instance(&self, component: &Arc<dyn ScopedComponent>) -> RuntimeResult<Instance> {
        let instance = component.create_instance()?;
        component.start_instance(&instance)?;
        Ok(instance)
    }

    fn release_instance(
        &self,
        component: &dyn ScopedComponent,
        instance: Instance,
    ) -> RuntimeResult<()> {
        component.stop_instance(&instance).inspect_err(|e| {
            warn!("Failed to stop stateless instance of {}: {}", component.uri(), e);
        })
    }

    fn get_active_instances(&self, _component: &dyn ScopedComponent) -> Vec<Instance> {
        Vec::new()
    }

    fn reinject(&self) -> RuntimeResult<()> {
        Ok(())
    }
}
