//! Runtime lifecycle management
//!
//! This module starts the scope containers and tears the runtime down in the
//! reverse order: channels first, then domain, composite and stateless scopes,
//! then the worker pool.

use std::sync::Arc;

use log::{info, warn};

use crate::{
    core::{RuntimeContainer, RuntimeResult},
    scope::Scope,
};

/// Scopes in start order; shutdown walks them backwards
const SCOPE_ORDER: [Scope; 3] = [Scope::Stateless, Scope::Composite, Scope::Domain];

/// Manages the lifecycle of the runtime's components
pub struct RuntimeLifecycle {
    container: Arc<RuntimeContainer>,
}

impl RuntimeLifecycle {
    /// Create a new lifecycle manager
    pub fn new(container: Arc<RuntimeContainer>) -> Self {
        Self { container }
    }

    pub fn container(&self) -> &Arc<RuntimeContainer> {
        &self.container
    }

    /// Start every registered scope container
    pub fn start(&self) -> RuntimeResult<()> {
        info!("Starting runtime...");

        for scope in SCOPE_ORDER {
            if let Some(container) = self.container.scope_container(scope) {
                info!("Starting {} scope container...", scope);
                container.start()?;
            }
        }

        info!("Runtime started");
        Ok(())
    }

    /// Shutdown all components in reverse order. Every phase runs even if an
    /// earlier one failed; the first error is returned.
    pub fn shutdown(&self) -> RuntimeResult<()> {
        info!("Starting graceful shutdown...");
        let mut first_error = None;

        // Phase 1: channels, so no event reaches a stopping component
        info!("Disposing channels...");
        if let Err(e) = self.container.channel_builder().dispose_all() {
            warn!("Failed to dispose channels: {}", e);
            first_error.get_or_insert(e);
        }

        // Phase 2: scope containers
        for scope in SCOPE_ORDER.iter().rev() {
            let Some(container) = self.container.scope_container(*scope) else {
                continue;
            };
            info!("Stopping {} scope container...", scope);
            if let Err(e) = container.stop() {
                warn!("Failed to stop {} scope container: {}", scope, e);
                first_error.get_or_insert(e);
            }
        }

        // Phase 3: worker pool
        info!("Shutting down worker pool...");
        self.container.pool().shutdown();

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("Graceful shutdown completed");
                Ok(())
            }
        }
    }
}
