//! Composite scope: one instance per component per deployment-group context

use std::sync::Arc;

use log::info;

use crate::core::{Instance, RuntimeResult, ScopedComponent};

use super::{cache::InstanceCache, ContextState, Scope, ScopeContainer};

pub struct CompositeScopeContainer {
    cache: InstanceCache,
}

impl Default for CompositeScopeContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeScopeContainer {
    pub fn new() -> Self {
        Self {
            cache: InstanceCache::new(Scope::Composite),
        }
    }
}

impl ScopeContainer for CompositeScopeContainer {
    fn scope(&self) -> Scope {
        Scope::Composite
    }

    fn start(&self) -> RuntimeResult<()> {
        info!("Starting COMPOSITE scope container");
        Ok(())
    }

    fn stop(&self) -> RuntimeResult<()> {
        info!("Stopping COMPOSITE scope container");
        self.cache.stop_all()
    }

    fn register(&self, component: Arc<dyn ScopedComponent>) {
        self.cache.register(component);
    }

    fn unregister(&self, component: &dyn ScopedComponent) {
        self.cache.unregister(component);
    }

    fn start_context(&self, group_id: &str) -> RuntimeResult<()> {
        if !self.cache.activate(group_id) {
            return Ok(());
        }
        self.cache.initialize_eager(group_id)
    }

    fn stop_context(&self, group_id: &str) -> RuntimeResult<()> {
        self.cache.stop_context(group_id)
    }

    fn context_state(&self, group_id: &str) -> ContextState {
        self.cache.context_state(group_id)
    }

    fn get_instance(&self, component: &Arc<dyn ScopedComponent>) -> RuntimeResult<Instance> {
        self.cache.get_instance(component)
    }

    fn release_instance(
        &self,
        _component: &dyn ScopedComponent,
        _instance: Instance,
    ) -> RuntimeResult<()> {
        Ok(())
    }

    fn get_active_instances(&self, component: &dyn ScopedComponent) -> Vec<Instance> {
        self.cache.active_instances(component)
    }

    fn reinject(&self) -> RuntimeResult<()> {
        self.cache.reinject()
    }
}
