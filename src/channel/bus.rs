use std::sync::Arc;

use log::debug;

use crate::core::RuntimeResult;

use super::{
    definition::{ChannelDefinition, DeliveryMode},
    event::Event,
    fanout::FanOutHandler,
    replication::ReplicationHandler,
    stream::{ChannelConnection, EventStream, EventStreamHandler, HandlerKind, NextHandler},
};

/// A named event bus: publish runs replication (when enabled) and then the
/// local fan-out.
pub struct Channel {
    uri: String,
    name: String,
    data_type: String,
    delivery: DeliveryMode,
    fan_out: Arc<dyn FanOutHandler>,
    publish_stream: EventStream,
    replicated: bool,
}

impl Channel {
    pub fn new(
        definition: &ChannelDefinition,
        fan_out: Arc<dyn FanOutHandler>,
        replication: Option<Arc<ReplicationHandler>>,
    ) -> Self {
        let mut publish_stream = EventStream::new(&definition.data_type, &definition.data_type);
        let replicated = replication.is_some();
        if let Some(replication) = replication {
            publish_stream.add_handler(replication);
        }
        publish_stream.add_handler(Arc::new(LocalFanOut(fan_out.clone())));

        Self {
            uri: definition.uri.clone(),
            name: definition.name.clone(),
            data_type: definition.data_type.clone(),
            delivery: definition.delivery,
            fan_out,
            publish_stream,
            replicated,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        self.delivery
    }

    pub fn is_replicated(&self) -> bool {
        self.replicated
    }

    pub fn publish(&self, event: Event) -> RuntimeResult<()> {
        debug!("Publishing event {} on {}", event.id, self.uri);
        self.publish_stream.handle(event)
    }

    /// Deliver to local consumers without replicating
    pub fn deliver_local(&self, event: Event) -> RuntimeResult<()> {
        self.fan_out.deliver(event)
    }

    pub fn fan_out(&self) -> &Arc<dyn FanOutHandler> {
        &self.fan_out
    }

    /// Subscribe a consumer connection under `key`, replacing an earlier
    /// subscription with the same key
    pub fn subscribe(&self, key: &str, connection: Arc<ChannelConnection>) {
        debug!("Subscribing {} to channel {}", key, self.uri);
        self.fan_out.subscribers().subscribe(key, connection);
    }

    pub fn unsubscribe(&self, key: &str) -> bool {
        debug!("Unsubscribing {} from channel {}", key, self.uri);
        self.fan_out.subscribers().unsubscribe(key)
    }

    pub fn unsubscribe_all(&self) -> usize {
        self.fan_out.subscribers().clear()
    }

    pub fn subscriber_count(&self) -> usize {
        self.fan_out.subscribers().len()
    }
}

/// Final step of the publish stream
struct LocalFanOut(Arc<dyn FanOutHandler>);

impl EventStreamHandler for LocalFanOut {
    fn kind(&self) -> HandlerKind {
        self.0.kind()
    }

    fn label(&self) -> String {
        self.0.label()
    }

    fn handle(&self, event: Event, next: NextHandler<'_>) -> RuntimeResult<()> {
        self.0.handle(event, next)
    }
}

/// Terminal handler of a producer stream, publishing into a channel
pub struct PublishHandler {
    channel: Arc<Channel>,
}

impl PublishHandler {
    pub fn new(channel: Arc<Channel>) -> Self {
        Self { channel }
    }
}

impl EventStreamHandler for PublishHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Publish
    }

    fn label(&self) -> String {
        format!("publish:{}", self.channel.uri())
    }

    fn handle(&self, event: Event, _next: NextHandler<'_>) -> RuntimeResult<()> {
        self.channel.publish(event)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::channel::{
        fanout::SyncFanOutHandler,
        stream::{DeliveryHandler, EventConsumer},
    };

    #[derive(Default)]
    struct Collect(Mutex<Vec<Event>>);

    impl EventConsumer for Collect {
        fn on_event(&self, event: Event) -> RuntimeResult<()> {
            self.0.lock().unwrap().push(event);
            Ok(())
        }
    }

    #[test]
    fn test_publish_reaches_subscribers_through_publish_handler() {
        let definition = ChannelDefinition::new("app/orders", "orders");
        let channel = Arc::new(Channel::new(
            &definition,
            Arc::new(SyncFanOutHandler::new()),
            None,
        ));
        assert!(!channel.is_replicated());

        let consumer = Arc::new(Collect::default());
        let mut stream = EventStream::new("json", "json");
        stream.add_handler(Arc::new(DeliveryHandler::new(consumer.clone())));
        channel.subscribe("consumer", Arc::new(ChannelConnection::new(stream, 0)));

        let mut producer = EventStream::new("json", "json");
        producer.add_handler(Arc::new(PublishHandler::new(channel.clone())));
        producer.handle(Event::new("json", json!({"id": 1}))).unwrap();
        channel.deliver_local(Event::new("json", json!({"id": 2}))).unwrap();

        assert_eq!(consumer.0.lock().unwrap().len(), 2);
        assert_eq!(channel.unsubscribe_all(), 1);
        assert_eq!(channel.subscriber_count(), 0);
    }
}
