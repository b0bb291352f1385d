//! Domain scope: process-wide singletons gated by zone leadership
//!
//! In a multi-node deployment only the zone leader may eagerly instantiate
//! domain components. Contexts started while the node is not leader are kept
//! pending and initialized when a leadership-acquired notification arrives.

use std::sync::Arc;

use dashmap::DashSet;
use log::{error, info};

use crate::{
    config::RuntimeMode,
    core::{Instance, LeadershipListener, RuntimeResult, ScopedComponent, TopologyService},
};

use super::{cache::InstanceCache, ContextState, Scope, ScopeContainer};

pub struct DomainScopeContainer {
    cache: InstanceCache,
    mode: RuntimeMode,
    topology: Option<Arc<dyn TopologyService>>,
    pending: DashSet<String>,
}

impl DomainScopeContainer {
    pub fn new(mode: RuntimeMode, topology: Option<Arc<dyn TopologyService>>) -> Self {
        Self {
            cache: InstanceCache::new(Scope::Domain),
            mode,
            topology,
            pending: DashSet::new(),
        }
    }

    /// True if eager initialization may run on this node right now
    fn may_initialize(&self) -> bool {
        match (&self.mode, &self.topology) {
            (RuntimeMode::Node, Some(topology)) => topology.is_zone_leader(),
            _ => true,
        }
    }

    /// Contexts waiting for leadership before eager initialization
    pub fn pending_contexts(&self) -> Vec<String> {
        self.pending.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Initialize every pending context that is still started.
    fn initialize_pending(&self) {
        let pending = self.pending_contexts();
        for group_id in pending {
            if self.pending.remove(&group_id).is_none() {
                continue;
            }
            if !self.cache.is_started(&group_id) {
                continue;
            }
            info!("Initializing deferred domain context {}", group_id);
            if let Err(e) = self.cache.initialize_eager(&group_id) {
                error!("Deferred initialization of {} failed: {}", group_id, e);
            }
        }
    }
}

impl ScopeContainer for DomainScopeContainer {
    fn scope(&self) -> Scope {
        Scope::Domain
    }

    fn start(&self) -> RuntimeResult<()> {
        info!("Starting DOMAIN scope container in {} mode", self.mode);
        Ok(())
    }

    fn stop(&self) -> RuntimeResult<()> {
        info!("Stopping DOMAIN scope container");
        self.pending.clear();
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
        if self.may_initialize() {
            self.cache.initialize_eager(group_id)
        } else {
            info!(
                "Not zone leader, deferring eager initialization of context {}",
                group_id
            );
            self.pending.insert(group_id.to_string());
            // leadership may have arrived between the check and the insert
            if self.may_initialize() {
                self.initialize_pending();
            }
            Ok(())
        }
    }

    fn stop_context(&self, group_id: &str) -> RuntimeResult<()> {
        self.pending.remove(group_id);
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

impl LeadershipListener for DomainScopeContainer {
    fn on_leadership_acquired(&self, zone: &str) {
        info!("Zone leadership acquired for {}", zone);
        self.initialize_pending();
    }
}
