//! Cross-node replication of channel events
//!
//! Outbound events are serialized and sent through the topology service on
//! the worker pool; the publisher never waits for the send and a failure is
//! only logged. Inbound events go to local fan-out only, so an event is never
//! replicated twice.

use std::sync::Arc;

use bytes::Bytes;
use log::{debug, warn};

use crate::core::{ReplicationReceiver, RuntimeResult, TopologyService, WorkerPool};

use super::{
    event::Event,
    fanout::FanOutHandler,
    stream::{EventStreamHandler, HandlerKind, NextHandler},
};

pub struct ReplicationHandler {
    channel_name: String,
    topology: Arc<dyn TopologyService>,
    pool: Arc<WorkerPool>,
}

impl ReplicationHandler {
    pub fn new(
        channel_name: impl Into<String>,
        topology: Arc<dyn TopologyService>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            channel_name: channel_name.into(),
            topology,
            pool,
        }
    }

    /// Send `event` to the other nodes, best effort
    pub fn replicate(&self, event: &Event) {
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => Bytes::from(payload),
            Err(e) => {
                warn!("Unable to serialize event {} for replication: {}", event.id, e);
                return;
            }
        };

        let topology = self.topology.clone();
        let name = self.channel_name.clone();
        let id = event.id;
        self.pool.spawn(async move {
            match topology.send(&name, payload).await {
                Ok(()) => debug!("Replicated event {} on {}", id, name),
                Err(e) => warn!("Replication of event {} on {} failed: {}", id, name, e),
            }
        });
    }
}

impl EventStreamHandler for ReplicationHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Replication
    }

    fn handle(&self, event: Event, next: NextHandler<'_>) -> RuntimeResult<()> {
        self.replicate(&event);
        next.handle(event)
    }
}

/// Delivers events replicated from other nodes to the local fan-out
pub struct ReplicatedEventReceiver {
    channel_name: String,
    fan_out: Arc<dyn FanOutHandler>,
}

impl ReplicatedEventReceiver {
    pub fn new(channel_name: impl Into<String>, fan_out: Arc<dyn FanOutHandler>) -> Self {
        Self {
            channel_name: channel_name.into(),
            fan_out,
        }
    }
}

impl ReplicationReceiver for ReplicatedEventReceiver {
    fn on_message(&self, payload: Bytes) {
        let event: Event = match serde_json::from_slice(&payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    "Discarding malformed replicated event on {}: {}",
                    self.channel_name, e
                );
                return;
            }
        };
        debug!("Received replicated event {} on {}", event.id, self.channel_name);
        if let Err(e) = self.fan_out.deliver(event) {
            warn!("Local delivery of replicated event failed: {}", e);
        }
    }
}
