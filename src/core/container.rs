//! Dependency injection container
//!
//! This module wires the scope containers, connectors and channel services of
//! one runtime together and eliminates the need for global singletons.

use std::sync::Arc;

use log::{debug, info};

use super::{error::RuntimeResult, pool::WorkerPool, traits::TopologyService};
use crate::{
    channel::{
        ChannelBuilder, ChannelConnector, ChannelManager, ChannelSourceAttacher,
        ChannelTargetAttacher, TransformerRegistry, TypeFilterBuilder, CHANNEL_SOURCE_KIND,
        CHANNEL_TARGET_KIND, TYPE_FILTER_KIND,
    },
    config::{Config, Runtime},
    scope::{
        CompositeScopeContainer, DomainScopeContainer, Scope, ScopeContainer, ScopeRegistry,
        StatelessScopeContainer,
    },
    wire::Connector,
};

/// Main dependency injection container
pub struct RuntimeContainer {
    /// Runtime section of the configuration the container was built from
    settings: Runtime,

    /// Worker pool for async delivery and replication sends
    pool: Arc<WorkerPool>,

    topology: Option<Arc<dyn TopologyService>>,

    /// Scope containers by scope
    scopes: Arc<ScopeRegistry>,

    /// Typed handle on the domain container, also registered in `scopes`
    domain: Arc<DomainScopeContainer>,

    /// Wire connector for request/response wiring
    connector: Arc<Connector>,

    channel_manager: Arc<ChannelManager>,
    channel_builder: Arc<ChannelBuilder>,
    channel_connector: Arc<ChannelConnector>,
}

impl RuntimeContainer {
    /// Create a container with its own worker pool
    pub fn new(config: &Config, topology: Option<Arc<dyn TopologyService>>) -> RuntimeResult<Self> {
        let pool = Arc::new(WorkerPool::new(config.runtime.async_workers)?);
        Ok(Self::with_pool(config, topology, pool))
    }

    /// Create a container on top of an existing worker pool
    pub fn with_pool(
        config: &Config,
        topology: Option<Arc<dyn TopologyService>>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        let settings = config.runtime.clone();
        info!(
            "Building runtime container (mode: {}, zone: {})",
            settings.mode, settings.zone
        );

        let domain = Arc::new(DomainScopeContainer::new(settings.mode, topology.clone()));
        if let Some(topology) = &topology {
            topology.register_listener(domain.clone());
        }

        let scopes = Arc::new(ScopeRegistry::new());
        scopes.register(Arc::new(StatelessScopeContainer::new()));
        scopes.register(Arc::new(CompositeScopeContainer::new()));
        scopes.register(domain.clone());

        let channel_manager = Arc::new(ChannelManager::new());
        let channel_builder = Arc::new(ChannelBuilder::new(
            channel_manager.clone(),
            pool.clone(),
            topology.clone(),
        ));

        let channel_connector = Arc::new(ChannelConnector::new(Arc::new(
            TransformerRegistry::new(),
        )));
        channel_connector.register_source_attacher(
            CHANNEL_SOURCE_KIND,
            Arc::new(ChannelSourceAttacher::new(channel_manager.clone())),
        );
        channel_connector.register_target_attacher(
            CHANNEL_TARGET_KIND,
            Arc::new(ChannelTargetAttacher::new(channel_manager.clone())),
        );
        channel_connector.register_filter_builder(TYPE_FILTER_KIND, Arc::new(TypeFilterBuilder));
        debug!("Registered built-in channel attachers and filter builders");

        Self {
            settings,
            pool,
            topology,
            scopes,
            domain,
            connector: Arc::new(Connector::new()),
            channel_manager,
            channel_builder,
            channel_connector,
        }
    }

    /// Get the runtime settings
    pub fn settings(&self) -> &Runtime {
        &self.settings
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn topology(&self) -> Option<&Arc<dyn TopologyService>> {
        self.topology.as_ref()
    }

    /// Get the scope registry
    pub fn scopes(&self) -> &Arc<ScopeRegistry> {
        &self.scopes
    }

    /// Get the scope container for `scope`, if one is registered
    pub fn scope_container(&self, scope: Scope) -> Option<Arc<dyn ScopeContainer>> {
        self.scopes.get_scope_container(scope)
    }

    pub fn domain_container(&self) -> &Arc<DomainScopeContainer> {
        &self.domain
    }

    /// Get the wire connector
    pub fn connector(&self) -> &Arc<Connector> {
        &self.connector
    }

    pub fn channel_manager(&self) -> &Arc<ChannelManager> {
        &self.channel_manager
    }

    pub fn channel_builder(&self) -> &Arc<ChannelBuilder> {
        &self.channel_builder
    }

    /// Get the channel connector
    pub fn channel_connector(&self) -> &Arc<ChannelConnector> {
        &self.channel_connector
    }
}
