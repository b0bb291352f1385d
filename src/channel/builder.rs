//! Builds channels on deployment and tears them down on undeployment

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use log::{debug, info, warn};
use validator::Validate;

use crate::core::{RuntimeResult, TopologyService, WorkerPool};

use super::{
    bus::Channel,
    definition::{ChannelDefinition, DeliveryMode},
    fanout::{AsyncFanOutHandler, FanOutHandler, SyncFanOutHandler},
    manager::ChannelManager,
    replication::{ReplicatedEventReceiver, ReplicationHandler},
};

pub struct ChannelBuilder {
    manager: Arc<ChannelManager>,
    pool: Arc<WorkerPool>,
    topology: Option<Arc<dyn TopologyService>>,
    /// Definitions of the channels this builder created, by URI
    built: DashMap<String, ChannelDefinition>,
    /// Per-URI locks serializing build and dispose of the same channel
    claims: DashMap<String, Arc<Mutex<()>>>,
}

impl ChannelBuilder {
    pub fn new(
        manager: Arc<ChannelManager>,
        pool: Arc<WorkerPool>,
        topology: Option<Arc<dyn TopologyService>>,
    ) -> Self {
        Self {
            manager,
            pool,
            topology,
            built: DashMap::new(),
            claims: DashMap::new(),
        }
    }

    /// Lock for `uri`. The map guard is released before locking, so the
    /// topology may call back into the builder.
    fn claim(&self, uri: &str) -> Arc<Mutex<()>> {
        self.claims
            .entry(uri.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Build and register the channel for `definition`, or return the
    /// channel already registered under its URI.
    pub fn build(&self, definition: &ChannelDefinition) -> RuntimeResult<Arc<Channel>> {
        definition.validate()?;

        let claim = self.claim(&definition.uri);
        let _claimed = hold(&claim);
        if let Some(existing) = self.manager.get(&definition.uri) {
            debug!("Channel {} already built", definition.uri);
            return Ok(existing);
        }

        let fan_out: Arc<dyn FanOutHandler> = match definition.delivery {
            DeliveryMode::Sync => Arc::new(SyncFanOutHandler::new()),
            DeliveryMode::Async => Arc::new(AsyncFanOutHandler::new(self.pool.clone())),
        };
        let replication = self.open_replication(definition, &fan_out)?;
        let channel = Arc::new(Channel::new(definition, fan_out, replication));

        if let Err(e) = self.manager.register(channel.clone()) {
            self.close_replication(&channel);
            return Err(e);
        }
        self.built
            .insert(definition.uri.clone(), definition.clone());

        info!(
            "Built channel {} ({:?} delivery, replicated: {})",
            definition.uri,
            definition.delivery,
            channel.is_replicated()
        );
        Ok(channel)
    }

    fn open_replication(
        &self,
        definition: &ChannelDefinition,
        fan_out: &Arc<dyn FanOutHandler>,
    ) -> RuntimeResult<Option<Arc<ReplicationHandler>>> {
        if !definition.replicate {
            return Ok(None);
        }
        match &self.topology {
            Some(topology) if topology.supports_replication() => {
                let receiver = Arc::new(ReplicatedEventReceiver::new(
                    &definition.name,
                    fan_out.clone(),
                ));
                topology.open_channel(&definition.name, receiver)?;
                debug!("Opened replication channel {}", definition.name);
                Ok(Some(Arc::new(ReplicationHandler::new(
                    &definition.name,
                    topology.clone(),
                    self.pool.clone(),
                ))))
            }
            _ => {
                info!(
                    "Replication unavailable, channel {} stays local",
                    definition.uri
                );
                Ok(None)
            }
        }
    }

    fn close_replication(&self, channel: &Channel) -> Option<crate::core::RuntimeError> {
        if !channel.is_replicated() {
            return None;
        }
        let topology = self.topology.as_ref()?;
        match topology.close_channel(channel.name()) {
            Ok(()) => {
                debug!("Closed replication channel {}", channel.name());
                None
            }
            Err(e) => {
                warn!(
                    "Failed to close replication channel {}: {}",
                    channel.name(),
                    e
                );
                Some(e)
            }
        }
    }

    /// Tear down the channel for `definition`: unsubscribe its consumers,
    /// close its replication transport, then unregister it. Unknown channels
    /// are a no-op.
    pub fn dispose(&self, definition: &ChannelDefinition) -> RuntimeResult<()> {
        let claim = self.claim(&definition.uri);
        let _claimed = hold(&claim);
        self.built.remove(&definition.uri);
        let Some(channel) = self.manager.get(&definition.uri) else {
            debug!("Channel {} not found, nothing to dispose", definition.uri);
            return Ok(());
        };

        let removed = channel.unsubscribe_all();
        let close_error = self.close_replication(&channel);
        self.manager.unregister(&definition.uri);
        info!(
            "Disposed channel {} ({} consumers detached)",
            definition.uri, removed
        );

        match close_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Definitions of every channel built and not yet disposed
    pub fn built_channels(&self) -> Vec<ChannelDefinition> {
        self.built.iter().map(|d| d.value().clone()).collect()
    }

    /// Dispose every channel this builder created. All are attempted; the
    /// first failure is returned.
    pub fn dispose_all(&self) -> RuntimeResult<()> {
        let mut first_error = None;
        for definition in self.built_channels() {
            if let Err(e) = self.dispose(&definition) {
                warn!("Failed to dispose channel {}: {}", definition.uri, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn hold(claim: &Mutex<()>) -> MutexGuard<'_, ()> {
    claim.lock().unwrap_or_else(PoisonError::into_inner)
}
