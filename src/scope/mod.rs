//! Component lifecycle scopes
//!
//! A scope container owns the creation and caching policy for one scope kind:
//! a fresh instance per call (`Stateless`), one instance per deployment-group
//! context (`Composite`), or one process-wide instance gated by zone
//! leadership (`Domain`).

pub mod cache;
pub mod composite;
pub mod domain;
pub mod registry;
pub mod stateless;

use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::core::{Instance, RuntimeResult, ScopedComponent};

pub use composite::CompositeScopeContainer;
pub use domain::DomainScopeContainer;
pub use registry::ScopeRegistry;
pub use stateless::StatelessScopeContainer;

/// Scope identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Stateless,
    Composite,
    Domain,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Stateless => "STATELESS",
            Scope::Composite => "COMPOSITE",
            Scope::Domain => "DOMAIN",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STATELESS" => Ok(Scope::Stateless),
            "COMPOSITE" => Ok(Scope::Composite),
            "DOMAIN" => Ok(Scope::Domain),
            _ => Err(format!("unknown scope: {s}")),
        }
    }
}

/// Lifecycle state of one context. A stopped context may be started again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    Uninitialized,
    Started,
    Stopped,
}

/// Manages component instances under one lifecycle policy
pub trait ScopeContainer: Send + Sync {
    /// The scope this container implements
    fn scope(&self) -> Scope;

    /// Start the container
    fn start(&self) -> RuntimeResult<()>;

    /// Stop every live context, most recently started first
    fn stop(&self) -> RuntimeResult<()>;

    /// Add a component to this container's management
    fn register(&self, component: Arc<dyn ScopedComponent>);

    /// Remove a component from this container's management
    fn unregister(&self, component: &dyn ScopedComponent);

    /// Start a context, eagerly initializing its eager components.
    ///
    /// Every eager component is attempted; failures are reported together in
    /// one aggregate error and successful instances stay started.
    fn start_context(&self, group_id: &str) -> RuntimeResult<()>;

    /// Stop a context and discard the instances created in it.
    /// Unknown contexts are a no-op.
    fn stop_context(&self, group_id: &str) -> RuntimeResult<()>;

    /// Current state of a context
    fn context_state(&self, group_id: &str) -> ContextState;

    /// Get a started instance of `component`
    fn get_instance(&self, component: &Arc<dyn ScopedComponent>) -> RuntimeResult<Instance>;

    /// Return an instance obtained from [`ScopeContainer::get_instance`]
    fn release_instance(&self, component: &dyn ScopedComponent, instance: Instance)
        -> RuntimeResult<()>;

    /// Snapshot of live instances of `component`
    fn get_active_instances(&self, component: &dyn ScopedComponent) -> Vec<Instance>;

    /// Reinject every live, reinjectable instance
    fn reinject(&self) -> RuntimeResult<()>;
}
