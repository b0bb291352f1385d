//! Lookup of scope containers by scope or scope name

use std::sync::Arc;

use dashmap::DashMap;
use log::{info, warn};

use super::{Scope, ScopeContainer};

#[derive(Default)]
pub struct ScopeRegistry {
    containers: DashMap<Scope, Arc<dyn ScopeContainer>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a container under the scope it reports. A container already
    /// registered for that scope is replaced.
    pub fn register(&self, container: Arc<dyn ScopeContainer>) {
        let scope = container.scope();
        if self.containers.insert(scope, container).is_some() {
            warn!("Replacing scope container for {}", scope);
        } else {
            info!("Registered scope container for {}", scope);
        }
    }

    pub fn unregister(&self, scope: Scope) -> Option<Arc<dyn ScopeContainer>> {
        self.containers.remove(&scope).map(|(_, container)| container)
    }

    pub fn get_scope_container(&self, scope: Scope) -> Option<Arc<dyn ScopeContainer>> {
        self.containers.get(&scope).map(|c| c.value().clone())
    }

    /// Look a container up by scope name, ignoring case
    pub fn get_scope_container_by_name(&self, name: &str) -> Option<Arc<dyn ScopeContainer>> {
        name.parse::<Scope>()
            .ok()
            .and_then(|scope| self.get_scope_container(scope))
    }

    pub fn scopes(&self) -> Vec<Scope> {
        self.containers.iter().map(|entry| *entry.key()).collect()
    }

    pub fn containers(&self) -> Vec<Arc<dyn ScopeContainer>> {
        self.containers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}
