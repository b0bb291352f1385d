//! Event channels
//!
//! A [`Channel`] publishes events through its own stream into a fan-out of
//! consumer connections, optionally replicating them to the other nodes of the
//! zone. The [`ChannelConnector`] builds the stream of each connection
//! (transformer first, then filters) and hands it to the attachers of both
//! ends.

pub mod attacher;
pub mod builder;
pub mod bus;
pub mod connector;
pub mod definition;
pub mod event;
pub mod fanout;
pub mod filter;
pub mod manager;
pub mod replication;
pub mod stream;
pub mod transform;

pub use attacher::{
    ChannelSourceAttacher, ChannelTargetAttacher, SourceConnectionAttacher,
    TargetConnectionAttacher,
};
pub use builder::ChannelBuilder;
pub use bus::{Channel, PublishHandler};
pub use connector::ChannelConnector;
pub use definition::{
    ChannelConnectionDefinition, ChannelDefinition, ChannelSourceDefinition,
    ChannelTargetDefinition, DeliveryMode, EventStreamDefinition, SourceConnectionDefinition,
    TargetConnectionDefinition, CHANNEL_SOURCE_KIND, CHANNEL_TARGET_KIND,
};
pub use event::Event;
pub use fanout::{AsyncFanOutHandler, FanOutHandler, Subscribers, SyncFanOutHandler};
pub use filter::{
    EventFilter, FilterBuilder, FilterDefinition, FilterHandler, TypeFilterBuilder,
    TypeFilterDefinition, TYPE_FILTER_KIND,
};
pub use manager::ChannelManager;
pub use replication::{ReplicatedEventReceiver, ReplicationHandler};
pub use stream::{
    ChannelConnection, DeliveryHandler, EventConsumer, EventStream, EventStreamHandler,
    HandlerKind, NextHandler,
};
pub use transform::{Transformer, TransformerHandler, TransformerRegistry};
