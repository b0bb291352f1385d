//! Core traits for runtime collaborators
//!
//! These interfaces are implemented outside this crate: the component manager
//! supplies [`ScopedComponent`]s, and the topology layer supplies
//! [`TopologyService`]. Everything here is `Send + Sync` since scope containers
//! and channels are shared across caller threads.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::{error::RuntimeResult, instance::Instance};

/// A named, addressable runtime unit
pub trait Component: Send + Sync {
    /// Unique component URI
    fn uri(&self) -> &str;

    /// Deployment group the component belongs to; doubles as its context id
    fn group_id(&self) -> &str;

    /// Contribution the component was deployed from
    fn contribution_uri(&self) -> &str;

    /// Name used when reporting about this component
    fn monitor_name(&self) -> &str {
        self.uri()
    }
}

/// A component whose instances are managed by a scope container.
///
/// A scoped component is registered with exactly one scope container for its
/// whole lifetime.
pub trait ScopedComponent: Component {
    /// Instantiate eagerly when the component's context starts
    fn is_eager_init(&self) -> bool;

    /// Whether live instances accept reinjection of updated wiring
    fn is_reinjectable(&self) -> bool;

    fn create_instance(&self) -> RuntimeResult<Instance>;

    fn start_instance(&self, instance: &Instance) -> RuntimeResult<()>;

    fn stop_instance(&self, instance: &Instance) -> RuntimeResult<()>;

    /// Re-apply current wiring to a live instance
    fn reinject(&self, instance: &Instance) -> RuntimeResult<()>;
}

/// Notification interface for zone leadership changes
pub trait LeadershipListener: Send + Sync {
    /// The local node became zone leader
    fn on_leadership_acquired(&self, zone: &str);

    /// The local node lost zone leadership
    fn on_leadership_lost(&self, _zone: &str) {}
}

/// Receives payloads replicated from other nodes on a named transport channel
pub trait ReplicationReceiver: Send + Sync {
    fn on_message(&self, payload: Bytes);
}

/// Cluster topology as seen by the local node.
///
/// Leadership is an external fact; this crate only consumes it.
#[async_trait]
pub trait TopologyService: Send + Sync {
    /// True if the local node currently holds leadership of its zone
    fn is_zone_leader(&self) -> bool;

    /// True if the topology layer can replicate channel events between nodes
    fn supports_replication(&self) -> bool;

    /// Subscribe to leadership notifications
    fn register_listener(&self, listener: Arc<dyn LeadershipListener>);

    /// Open a named replication transport channel
    fn open_channel(&self, name: &str, receiver: Arc<dyn ReplicationReceiver>)
        -> RuntimeResult<()>;

    /// Close a named replication transport channel
    fn close_channel(&self, name: &str) -> RuntimeResult<()>;

    /// Broadcast a payload on a named transport channel, best effort
    async fn send(&self, name: &str, payload: Bytes) -> RuntimeResult<()>;
}
