//! Handler registry keyed by definition kind
//!
//! Attachers, interceptor builders and filter builders are all looked up by the
//! stable kind tag of the definition they handle. Extensions populate the
//! registry; the connectors only dispatch through it.

use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, warn};

use super::error::{RuntimeError, RuntimeResult};

/// Which error a failed lookup reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerRole {
    Attacher,
    Builder,
}

/// Concurrent map from a definition kind to its handler
pub struct KindRegistry<H: ?Sized> {
    name: &'static str,
    role: HandlerRole,
    handlers: DashMap<&'static str, Arc<H>>,
}

impl<H: ?Sized> KindRegistry<H> {
    /// Create a new empty registry
    pub fn new(name: &'static str, role: HandlerRole) -> Self {
        Self {
            name,
            role,
            handlers: DashMap::new(),
        }
    }

    /// Insert or replace the handler for `kind`
    pub fn register(&self, kind: &'static str, handler: Arc<H>) {
        debug!("Registering {} for kind: {}", self.name, kind);
        if self.handlers.insert(kind, handler).is_some() {
            warn!("Replaced existing {} for kind: {}", self.name, kind);
        }
    }

    /// Remove the handler for `kind`
    pub fn unregister(&self, kind: &str) -> Option<Arc<H>> {
        debug!("Unregistering {} for kind: {}", self.name, kind);
        self.handlers.remove(kind).map(|(_, handler)| handler)
    }

    /// Get the handler for `kind`
    pub fn get(&self, kind: &str) -> Option<Arc<H>> {
        self.handlers.get(kind).map(|entry| entry.value().clone())
    }

    /// Get the handler for `kind` or the matching "not found" error
    pub fn resolve(&self, kind: &str) -> RuntimeResult<Arc<H>> {
        self.get(kind).ok_or_else(|| match self.role {
            HandlerRole::Attacher => RuntimeError::AttacherNotFound(kind.to_string()),
            HandlerRole::Builder => RuntimeError::BuilderNotFound(kind.to_string()),
        })
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Get all registered kinds
    pub fn kinds(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
