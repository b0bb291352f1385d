//! Builds event streams from connection definitions and attaches both ends

use std::sync::Arc;

use log::{debug, info, warn};

use crate::core::{HandlerRole, KindRegistry, RuntimeResult};

use super::{
    attacher::{SourceConnectionAttacher, TargetConnectionAttacher},
    definition::{ChannelConnectionDefinition, EventStreamDefinition},
    filter::{FilterBuilder, FilterHandler},
    stream::{ChannelConnection, EventStream},
    transform::{TransformerHandler, TransformerRegistry},
};

pub struct ChannelConnector {
    source_attachers: KindRegistry<dyn SourceConnectionAttacher>,
    target_attachers: KindRegistry<dyn TargetConnectionAttacher>,
    filter_builders: KindRegistry<dyn FilterBuilder>,
    transformers: Arc<TransformerRegistry>,
}

impl ChannelConnector {
    pub fn new(transformers: Arc<TransformerRegistry>) -> Self {
        Self {
            source_attachers: KindRegistry::new(
                "source connection attacher",
                HandlerRole::Attacher,
            ),
            target_attachers: KindRegistry::new(
                "target connection attacher",
                HandlerRole::Attacher,
            ),
            filter_builders: KindRegistry::new("filter builder", HandlerRole::Builder),
            transformers,
        }
    }

    pub fn register_source_attacher(
        &self,
        kind: &'static str,
        attacher: Arc<dyn SourceConnectionAttacher>,
    ) {
        self.source_attachers.register(kind, attacher);
    }

    pub fn unregister_source_attacher(&self, kind: &str) {
        self.source_attachers.unregister(kind);
    }

    pub fn register_target_attacher(
        &self,
        kind: &'static str,
        attacher: Arc<dyn TargetConnectionAttacher>,
    ) {
        self.target_attachers.register(kind, attacher);
    }

    pub fn unregister_target_attacher(&self, kind: &str) {
        self.target_attachers.unregister(kind);
    }

    pub fn register_filter_builder(&self, kind: &'static str, builder: Arc<dyn FilterBuilder>) {
        self.filter_builders.register(kind, builder);
    }

    pub fn unregister_filter_builder(&self, kind: &str) {
        self.filter_builders.unregister(kind);
    }

    pub fn transformers(&self) -> &Arc<TransformerRegistry> {
        &self.transformers
    }

    /// Build the connection for `definition` and attach both ends, target
    /// first. A failed source attach detaches the target again.
    pub fn connect(&self, definition: &ChannelConnectionDefinition) -> RuntimeResult<()> {
        let source = definition.source.as_ref();
        let target = definition.target.as_ref();
        let source_attacher = self.source_attachers.resolve(source.kind())?;
        let target_attacher = self.target_attachers.resolve(target.kind())?;

        let stream = self.build_stream(&definition.stream)?;
        let mut connection = ChannelConnection::new(stream, definition.sequence);
        target_attacher.attach(source, target, &mut connection)?;
        let connection = Arc::new(connection);

        if let Err(e) = source_attacher.attach(source, target, connection) {
            warn!(
                "Source attach of {} failed, detaching target {}: {}",
                source.uri(),
                target.uri(),
                e
            );
            if let Err(rollback) = target_attacher.detach(source, target) {
                warn!("Failed to detach target {}: {}", target.uri(), rollback);
            }
            return Err(e);
        }

        info!(
            "Connected {} -> {} (sequence {})",
            source.uri(),
            target.uri(),
            definition.sequence
        );
        Ok(())
    }

    /// Transformer first when the data types differ, then the filters in
    /// declaration order. The terminal handler is left to the target attacher.
    pub fn build_stream(&self, definition: &EventStreamDefinition) -> RuntimeResult<EventStream> {
        let mut stream = EventStream::new(&definition.source_type, &definition.target_type);

        if definition.needs_transformer() {
            let transformer = self
                .transformers
                .resolve(&definition.source_type, &definition.target_type)?;
            stream.add_handler(Arc::new(TransformerHandler::new(
                &definition.source_type,
                &definition.target_type,
                transformer,
            )));
        }

        for filter in &definition.filters {
            let builder = self.filter_builders.resolve(filter.kind())?;
            stream.add_handler(Arc::new(FilterHandler::new(builder.build(filter.as_ref())?)));
        }

        debug!(
            "Built event stream {} -> {} with {} handlers",
            definition.source_type,
            definition.target_type,
            stream.handlers().len()
        );
        Ok(stream)
    }

    /// Detach both ends of a connection, source first. Both are attempted;
    /// the first error is returned.
    pub fn disconnect(&self, definition: &ChannelConnectionDefinition) -> RuntimeResult<()> {
        let source = definition.source.as_ref();
        let target = definition.target.as_ref();
        let source_attacher = self.source_attachers.resolve(source.kind())?;
        let target_attacher = self.target_attachers.resolve(target.kind())?;

        let source_result = source_attacher.detach(source, target);
        let target_result = target_attacher.detach(source, target);
        source_result.and(target_result)?;

        info!("Disconnected {} -> {}", source.uri(), target.uri());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        any::Any,
        sync::{Mutex, PoisonError},
    };

    use serde_json::json;

    use super::*;
    use crate::{
        channel::{
            attacher::{ChannelSourceAttacher, ChannelTargetAttacher},
            bus::Channel,
            definition::{
                ChannelDefinition, ChannelSourceDefinition, ChannelTargetDefinition,
                SourceConnectionDefinition, TargetConnectionDefinition, CHANNEL_SOURCE_KIND,
                CHANNEL_TARGET_KIND,
            },
            event::Event,
            fanout::SyncFanOutHandler,
            filter::{
                EventFilter, FilterDefinition, TypeFilterBuilder, TypeFilterDefinition,
                TYPE_FILTER_KIND,
            },
            manager::ChannelManager,
            stream::{DeliveryHandler, EventConsumer, HandlerKind},
            transform::Transformer,
        },
        core::RuntimeError,
    };

    #[derive(Default)]
    struct Collect(Mutex<Vec<Event>>);

    impl EventConsumer for Collect {
        fn on_event(&self, event: Event) -> RuntimeResult<()> {
            self.0.lock().unwrap().push(event);
            Ok(())
        }
    }

    impl Collect {
        fn data_types(&self) -> Vec<String> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.data_type.clone())
                .collect()
        }
    }

    /// A component endpoint: producer when used as source, consumer as target
    struct Endpoint(&'static str);

    impl SourceConnectionDefinition for Endpoint {
        fn kind(&self) -> &'static str {
            "test.producer"
        }

        fn uri(&self) -> &str {
            self.0
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl TargetConnectionDefinition for Endpoint {
        fn kind(&self) -> &'static str {
            "test.consumer"
        }

        fn uri(&self) -> &str {
            self.0
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Keeps producer connections so tests can push events into them
    #[derive(Default)]
    struct ProducerAttacher {
        connections: Mutex<Vec<Arc<ChannelConnection>>>,
        fail: bool,
    }

    impl SourceConnectionAttacher for ProducerAttacher {
        fn attach(
            &self,
            _source: &dyn SourceConnectionDefinition,
            _target: &dyn TargetConnectionDefinition,
            connection: Arc<ChannelConnection>,
        ) -> RuntimeResult<()> {
            if self.fail {
                return Err(RuntimeError::Internal("producer proxy failed".into()));
            }
            self.connections.lock().unwrap().push(connection);
            Ok(())
        }

        fn detach(
            &self,
            _source: &dyn SourceConnectionDefinition,
            _target: &dyn TargetConnectionDefinition,
        ) -> RuntimeResult<()> {
            self.connections.lock().unwrap().clear();
            Ok(())
        }
    }

    /// Terminates consumer streams with delivery to a collector
    struct ConsumerAttacher {
        consumer: Arc<Collect>,
        detached: Mutex<Vec<String>>,
    }

    impl TargetConnectionAttacher for ConsumerAttacher {
        fn attach(
            &self,
            _source: &dyn SourceConnectionDefinition,
            _target: &dyn TargetConnectionDefinition,
            connection: &mut ChannelConnection,
        ) -> RuntimeResult<()> {
            connection
                .stream_mut()
                .add_handler(Arc::new(DeliveryHandler::new(self.consumer.clone())));
            Ok(())
        }

        fn detach(
            &self,
            _source: &dyn SourceConnectionDefinition,
            target: &dyn TargetConnectionDefinition,
        ) -> RuntimeResult<()> {
            self.detached
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(target.uri().to_string());
            Ok(())
        }
    }

    struct Named(&'static str);

    impl EventFilter for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn accept(&self, _event: &Event) -> bool {
            true
        }
    }

    struct NamedDef(&'static str);

    impl FilterDefinition for NamedDef {
        fn kind(&self) -> &'static str {
            "test.named"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct NamedBuilder;

    impl FilterBuilder for NamedBuilder {
        fn build(&self, definition: &dyn FilterDefinition) -> RuntimeResult<Arc<dyn EventFilter>> {
            let name = definition
                .as_any()
                .downcast_ref::<NamedDef>()
                .map(|d| d.0)
                .unwrap_or("unknown");
            Ok(Arc::new(Named(name)))
        }
    }

    struct Upgrade;

    impl Transformer for Upgrade {
        fn transform(&self, mut event: Event) -> RuntimeResult<Event> {
            event.payload = json!({ "v2": event.payload });
            Ok(event)
        }
    }

    struct Fixture {
        connector: ChannelConnector,
        manager: Arc<ChannelManager>,
        consumer: Arc<Collect>,
        consumer_attacher: Arc<ConsumerAttacher>,
        producer_attacher: Arc<ProducerAttacher>,
    }

    fn fixture(fail_producer: bool) -> Fixture {
        let manager = Arc::new(ChannelManager::new());
        let channel = Channel::new(
            &ChannelDefinition::new("app/orders", "orders").with_data_type("order.v2"),
            Arc::new(SyncFanOutHandler::new()),
            None,
        );
        manager.register(Arc::new(channel)).unwrap();

        let transformers = Arc::new(TransformerRegistry::new());
        transformers.register("order.v1", "order.v2", Arc::new(Upgrade));

        let consumer = Arc::new(Collect::default());
        let consumer_attacher = Arc::new(ConsumerAttacher {
            consumer: consumer.clone(),
            detached: Mutex::new(Vec::new()),
        });
        let producer_attacher = Arc::new(ProducerAttacher {
            fail: fail_producer,
            ..Default::default()
        });

        let connector = ChannelConnector::new(transformers);
        connector.register_source_attacher(
            CHANNEL_SOURCE_KIND,
            Arc::new(ChannelSourceAttacher::new(manager.clone())),
        );
        connector.register_target_attacher(
            CHANNEL_TARGET_KIND,
            Arc::new(ChannelTargetAttacher::new(manager.clone())),
        );
        connector.register_source_attacher("test.producer", producer_attacher.clone());
        connector.register_target_attacher("test.consumer", consumer_attacher.clone());
        connector.register_filter_builder(TYPE_FILTER_KIND, Arc::new(TypeFilterBuilder));
        connector.register_filter_builder("test.named", Arc::new(NamedBuilder));

        Fixture {
            connector,
            manager,
            consumer,
            consumer_attacher,
            producer_attacher,
        }
    }

    fn producer_definition(source_type: &str) -> ChannelConnectionDefinition {
        ChannelConnectionDefinition::new(
            Arc::new(Endpoint("app/orderService")),
            Arc::new(ChannelTargetDefinition::new("app/orders")),
            EventStreamDefinition::new(source_type, "order.v2"),
        )
    }

    fn consumer_definition() -> ChannelConnectionDefinition {
        ChannelConnectionDefinition::new(
            Arc::new(ChannelSourceDefinition::new("app/orders")),
            Arc::new(Endpoint("app/auditor")),
            EventStreamDefinition::new("order.v2", "order.v2")
                .with_filter(Arc::new(TypeFilterDefinition::new(["order.v2"]))),
        )
    }

    #[test]
    fn test_stream_order_transformer_then_filters() {
        let f = fixture(false);
        let definition = EventStreamDefinition::new("order.v1", "order.v2")
            .with_filter(Arc::new(NamedDef("first")))
            .with_filter(Arc::new(NamedDef("second")));

        let stream = f.connector.build_stream(&definition).unwrap();
        assert_eq!(
            stream.handler_kinds(),
            vec![HandlerKind::Transformer, HandlerKind::Filter, HandlerKind::Filter]
        );
        let labels: Vec<String> = stream.handlers().iter().map(|h| h.label()).collect();
        assert_eq!(labels[1..], ["filter:first".to_string(), "filter:second".to_string()]);
    }

    #[test]
    fn test_matching_types_need_no_transformer() {
        let f = fixture(false);
        let definition = EventStreamDefinition::new("order.v2", "order.v2")
            .with_filter(Arc::new(NamedDef("only")));
        let stream = f.connector.build_stream(&definition).unwrap();
        assert_eq!(stream.handler_kinds(), vec![HandlerKind::Filter]);
    }

    #[test]
    fn test_missing_transformer_fails_connect() {
        let f = fixture(false);
        let err = f.connector.connect(&producer_definition("order.v0")).unwrap_err();
        assert!(matches!(err, RuntimeError::TransformerNotFound { .. }));
        assert!(f.producer_attacher.connections.lock().unwrap().is_empty());
    }

    #[test]
    fn test_missing_filter_builder_fails_connect() {
        let f = fixture(false);
        f.connector.unregister_filter_builder(TYPE_FILTER_KIND);
        let err = f.connector.connect(&consumer_definition()).unwrap_err();
        assert!(matches!(err, RuntimeError::BuilderNotFound(_)));
        assert_eq!(f.manager.get("app/orders").unwrap().subscriber_count(), 0);
    }

    #[test]
    fn test_producer_to_consumer_through_channel() {
        let f = fixture(false);
        f.connector.connect(&consumer_definition()).unwrap();
        f.connector.connect(&producer_definition("order.v1")).unwrap();
        assert_eq!(f.manager.get("app/orders").unwrap().subscriber_count(), 1);

        let producer = f.producer_attacher.connections.lock().unwrap()[0].clone();
        assert_eq!(
            producer.stream().handler_kinds(),
            vec![HandlerKind::Transformer, HandlerKind::Publish]
        );
        producer.handle(Event::new("order.v1", json!(7))).unwrap();

        let received = f.consumer.0.lock().unwrap().clone();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].data_type, "order.v2");
        assert_eq!(received[0].payload, json!({"v2": 7}));
    }

    #[test]
    fn test_disconnect_unsubscribes_consumer() {
        let f = fixture(false);
        f.connector.connect(&consumer_definition()).unwrap();
        f.connector.disconnect(&consumer_definition()).unwrap();

        let channel = f.manager.get("app/orders").unwrap();
        assert_eq!(channel.subscriber_count(), 0);
        channel.publish(Event::new("order.v2", json!(1))).unwrap();
        assert!(f.consumer.data_types().is_empty());
        assert_eq!(
            *f.consumer_attacher.detached.lock().unwrap(),
            vec!["app/auditor".to_string()]
        );
    }

    #[test]
    fn test_failed_source_attach_detaches_target() {
        let f = fixture(true);
        let definition = ChannelConnectionDefinition::new(
            Arc::new(Endpoint("app/orderService")),
            Arc::new(Endpoint("app/auditor")),
            EventStreamDefinition::new("order.v2", "order.v2"),
        );
        assert!(f.connector.connect(&definition).is_err());
        assert_eq!(
            *f.consumer_attacher.detached.lock().unwrap(),
            vec!["app/auditor".to_string()]
        );
    }

    #[test]
    fn test_unknown_channel_is_configuration_error() {
        let f = fixture(false);
        let definition = ChannelConnectionDefinition::new(
            Arc::new(ChannelSourceDefinition::new("app/missing")),
            Arc::new(Endpoint("app/auditor")),
            EventStreamDefinition::new("order.v2", "order.v2"),
        );
        let err = f.connector.connect(&definition).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_consumers_receive_in_sequence_order() {
        let f = fixture(false);
        let log = Arc::new(Mutex::new(Vec::new()));

        struct Tagged(&'static str, Arc<Mutex<Vec<&'static str>>>);

        impl EventConsumer for Tagged {
            fn on_event(&self, _event: Event) -> RuntimeResult<()> {
                self.1.lock().unwrap().push(self.0);
                Ok(())
            }
        }

        let channel = f.manager.get("app/orders").unwrap();
        for (name, sequence) in [("late", 10), ("early", -1)] {
            let mut stream = f
                .connector
                .build_stream(&EventStreamDefinition::new("order.v2", "order.v2"))
                .unwrap();
            stream.add_handler(Arc::new(DeliveryHandler::new(Arc::new(Tagged(
                name,
                log.clone(),
            )))));
            channel.subscribe(name, Arc::new(ChannelConnection::new(stream, sequence)));
        }

        channel.publish(Event::new("order.v2", json!(1))).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["early", "late"]);
    }
}
