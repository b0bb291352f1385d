//! Builds wires from definitions and attaches both ends

use std::sync::Arc;

use log::{debug, info, warn};

use crate::{
    config_error,
    core::{HandlerRole, KindRegistry, RuntimeResult},
};

use super::{
    attacher::{InterceptorBuilder, SourceWireAttacher, TargetWireAttacher},
    chain::{InvocationChain, Wire},
    definition::WireDefinition,
};

pub struct Connector {
    source_attachers: KindRegistry<dyn SourceWireAttacher>,
    target_attachers: KindRegistry<dyn TargetWireAttacher>,
    interceptor_builders: KindRegistry<dyn InterceptorBuilder>,
}

impl Default for Connector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector {
    pub fn new() -> Self {
        Self {
            source_attachers: KindRegistry::new("source wire attacher", HandlerRole::Attacher),
            target_attachers: KindRegistry::new("target wire attacher", HandlerRole::Attacher),
            interceptor_builders: KindRegistry::new("interceptor builder", HandlerRole::Builder),
        }
    }

    pub fn register_source_attacher(&self, kind: &'static str, attacher: Arc<dyn SourceWireAttacher>) {
        self.source_attachers.register(kind, attacher);
    }

    pub fn unregister_source_attacher(&self, kind: &str) {
        self.source_attachers.unregister(kind);
    }

    pub fn register_target_attacher(&self, kind: &'static str, attacher: Arc<dyn TargetWireAttacher>) {
        self.target_attachers.register(kind, attacher);
    }

    pub fn unregister_target_attacher(&self, kind: &str) {
        self.target_attachers.unregister(kind);
    }

    pub fn register_interceptor_builder(
        &self,
        kind: &'static str,
        builder: Arc<dyn InterceptorBuilder>,
    ) {
        self.interceptor_builders.register(kind, builder);
    }

    pub fn unregister_interceptor_builder(&self, kind: &str) {
        self.interceptor_builders.unregister(kind);
    }

    /// Connect the source and target of `definition`.
    ///
    /// Either both ends end up attached or neither does: every handler is
    /// resolved and every interceptor built before anything is attached, and a
    /// failed source attach detaches the target again.
    pub fn connect(&self, definition: &WireDefinition) -> RuntimeResult<()> {
        let source = definition.source.as_ref();
        let target = definition.target.as_ref();
        let source_attacher = self.source_attachers.resolve(source.kind())?;
        let target_attacher = self.target_attachers.resolve(target.kind())?;

        if definition.optimizable {
            if definition.has_interceptors() {
                return Err(config_error!(
                    "Wire {} -> {} is optimizable but carries interceptors",
                    source.uri(),
                    target.uri()
                ));
            }
            let factory = target_attacher.create_object_factory(target)?;
            source_attacher.attach_object_factory(source, factory, target)?;
            info!(
                "Connected {} -> {} through object factory",
                source.uri(),
                target.uri()
            );
            return Ok(());
        }

        let mut wire = self.build_wire(definition)?;
        target_attacher.attach(source, target, &mut wire)?;
        let wire = Arc::new(wire);

        if let Err(e) = source_attacher.attach(source, target, wire) {
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

        info!("Connected {} -> {}", source.uri(), target.uri());
        Ok(())
    }

    /// Build the chains of a wire, one per operation in definition order
    pub fn build_wire(&self, definition: &WireDefinition) -> RuntimeResult<Wire> {
        let mut wire = Wire::new();
        for operation in &definition.operations {
            let mut chain = InvocationChain::new(operation.clone());
            for interceptor in &operation.interceptors {
                let builder = self.interceptor_builders.resolve(interceptor.kind())?;
                chain.add_interceptor(builder.build(interceptor.as_ref())?);
            }
            debug!(
                "Built chain for operation {} with {} interceptors",
                operation.name,
                chain.len()
            );
            wire.add_chain(chain);
        }
        Ok(wire)
    }

    /// Undo [`Connector::connect`]. Both ends are detached even if the first
    /// detach fails; the first error is returned.
    pub fn disconnect(&self, definition: &WireDefinition) -> RuntimeResult<()> {
        let source = definition.source.as_ref();
        let target = definition.target.as_ref();
        let source_attacher = self.source_attachers.resolve(source.kind())?;
        let target_attacher = self.target_attachers.resolve(target.kind())?;

        if definition.optimizable {
            source_attacher.detach_object_factory(source, target)?;
        } else {
            let source_result = source_attacher.detach(source, target);
            let target_result = target_attacher.detach(source, target);
            source_result.and(target_result)?;
        }

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
        core::{Instance, RuntimeError},
        wire::{
            attacher::ObjectFactory,
            chain::{Interceptor, Next},
            definition::{
                InterceptorDefinition, OperationDefinition, WireSourceDefinition,
                WireTargetDefinition,
            },
            message::{Message, Payload},
        },
    };

    type CallLog = Arc<Mutex<Vec<String>>>;

    fn record(log: &CallLog, call: &str) {
        log.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call.to_string());
    }

    fn calls(log: &CallLog) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    struct ReferenceDef;

    impl WireSourceDefinition for ReferenceDef {
        fn kind(&self) -> &'static str {
            "test.reference"
        }

        fn uri(&self) -> &str {
            "client#service"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct ServiceDef;

    impl WireTargetDefinition for ServiceDef {
        fn kind(&self) -> &'static str {
            "test.service"
        }

        fn uri(&self) -> &str {
            "server#service"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct TagDef(&'static str);

    impl InterceptorDefinition for TagDef {
        fn kind(&self) -> &'static str {
            "test.tag"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Tag(&'static str);

    impl Interceptor for Tag {
        fn invoke(&self, mut message: Message, next: Next<'_>) -> RuntimeResult<Message> {
            let trace = match message.header("trace") {
                Some(t) => format!("{t},{}", self.0),
                None => self.0.to_string(),
            };
            message.set_header("trace", trace);
            next.invoke(message)
        }
    }

    struct TagBuilder;

    impl InterceptorBuilder for TagBuilder {
        fn build(&self, definition: &dyn InterceptorDefinition) -> RuntimeResult<Arc<dyn Interceptor>> {
            let tag = definition
                .as_any()
                .downcast_ref::<TagDef>()
                .ok_or_else(|| config_error!("not a tag definition"))?;
            Ok(Arc::new(Tag(tag.0)))
        }
    }

    struct Echo;

    impl Interceptor for Echo {
        fn invoke(&self, message: Message, _next: Next<'_>) -> RuntimeResult<Message> {
            let trace = message.header("trace").unwrap_or_default().to_string();
            Ok(message.reply(Payload::Value(json!(trace))))
        }
    }

    struct Fixed;

    impl ObjectFactory for Fixed {
        fn get_instance(&self) -> RuntimeResult<Instance> {
            Ok(Instance::new("fixed"))
        }
    }

    struct SourceAttacher {
        log: CallLog,
        fail_attach: bool,
        wire: Mutex<Option<Arc<Wire>>>,
    }

    impl SourceWireAttacher for SourceAttacher {
        fn attach(
            &self,
            _source: &dyn WireSourceDefinition,
            _target: &dyn WireTargetDefinition,
            wire: Arc<Wire>,
        ) -> RuntimeResult<()> {
            record(&self.log, "source.attach");
            if self.fail_attach {
                return Err(RuntimeError::Internal("proxy generation failed".into()));
            }
            *self.wire.lock().unwrap() = Some(wire);
            Ok(())
        }

        fn detach(
            &self,
            _source: &dyn WireSourceDefinition,
            _target: &dyn WireTargetDefinition,
        ) -> RuntimeResult<()> {
            record(&self.log, "source.detach");
            Ok(())
        }

        fn attach_object_factory(
            &self,
            _source: &dyn WireSourceDefinition,
            _factory: Arc<dyn ObjectFactory>,
            _target: &dyn WireTargetDefinition,
        ) -> RuntimeResult<()> {
            record(&self.log, "source.attach_object_factory");
            Ok(())
        }

        fn detach_object_factory(
            &self,
            _source: &dyn WireSourceDefinition,
            _target: &dyn WireTargetDefinition,
        ) -> RuntimeResult<()> {
            record(&self.log, "source.detach_object_factory");
            Ok(())
        }
    }

    struct TargetAttacher {
        log: CallLog,
    }

    impl TargetWireAttacher for TargetAttacher {
        fn attach(
            &self,
            _source: &dyn WireSourceDefinition,
            _target: &dyn WireTargetDefinition,
            wire: &mut Wire,
        ) -> RuntimeResult<()> {
            record(&self.log, "target.attach");
            for chain in wire.chains_mut() {
                chain.add_interceptor(Arc::new(Echo));
            }
            Ok(())
        }

        fn detach(
            &self,
            _source: &dyn WireSourceDefinition,
            _target: &dyn WireTargetDefinition,
        ) -> RuntimeResult<()> {
            record(&self.log, "target.detach");
            Ok(())
        }

        fn create_object_factory(
            &self,
            _target: &dyn WireTargetDefinition,
        ) -> RuntimeResult<Arc<dyn ObjectFactory>> {
            record(&self.log, "target.create_object_factory");
            Ok(Arc::new(Fixed))
        }
    }

    struct Fixture {
        connector: Connector,
        log: CallLog,
        source: Arc<SourceAttacher>,
    }

    fn fixture(fail_source: bool) -> Fixture {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let source = Arc::new(SourceAttacher {
            log: log.clone(),
            fail_attach: fail_source,
            wire: Mutex::new(None),
        });
        let connector = Connector::new();
        connector.register_source_attacher("test.reference", source.clone());
        connector.register_target_attacher(
            "test.service",
            Arc::new(TargetAttacher { log: log.clone() }),
        );
        connector.register_interceptor_builder("test.tag", Arc::new(TagBuilder));
        Fixture {
            connector,
            log,
            source,
        }
    }

    fn definition() -> WireDefinition {
        WireDefinition::new(Arc::new(ReferenceDef), Arc::new(ServiceDef)).with_operation(
            OperationDefinition::new("greet")
                .with_input("string")
                .with_output("string")
                .with_interceptor(Arc::new(TagDef("security")))
                .with_interceptor(Arc::new(TagDef("tx"))),
        )
    }

    fn plain_definition() -> WireDefinition {
        WireDefinition::new(Arc::new(ReferenceDef), Arc::new(ServiceDef))
            .with_operation(OperationDefinition::new("greet"))
    }

    #[test]
    fn test_optimizable_wire_skips_chain_construction() {
        let f = fixture(false);
        let definition = plain_definition().optimizable(true);

        f.connector.connect(&definition).unwrap();
        assert_eq!(
            calls(&f.log),
            vec!["target.create_object_factory", "source.attach_object_factory"]
        );
        assert!(f.source.wire.lock().unwrap().is_none());

        f.connector.disconnect(&definition).unwrap();
        assert_eq!(
            calls(&f.log).last().map(String::as_str),
            Some("source.detach_object_factory")
        );
        assert!(!calls(&f.log).iter().any(|c| c == "source.detach"));
    }

    #[test]
    fn test_optimizable_wire_with_interceptors_is_rejected() {
        let f = fixture(false);
        let err = f.connector.connect(&definition().optimizable(true)).unwrap_err();
        assert!(err.is_configuration());
        assert!(calls(&f.log).is_empty());
    }

    #[test]
    fn test_connect_builds_chain_in_declaration_order() {
        let f = fixture(false);
        f.connector.connect(&definition()).unwrap();
        assert_eq!(calls(&f.log), vec!["target.attach", "source.attach"]);

        let wire = f.source.wire.lock().unwrap().clone().unwrap();
        let chain = wire.chain("greet").unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.operation().output_type.as_deref(), Some("string"));

        let reply = wire.invoke("greet", Message::value(json!("hi"))).unwrap();
        assert_eq!(reply.body(), Some(&json!("security,tx")));
    }

    #[test]
    fn test_missing_attacher_is_configuration_error() {
        let f = fixture(false);
        f.connector.unregister_target_attacher("test.service");

        let err = f.connector.connect(&definition()).unwrap_err();
        assert!(matches!(err, RuntimeError::AttacherNotFound(ref kind) if kind == "test.service"));
        assert!(calls(&f.log).is_empty());
    }

    #[test]
    fn test_missing_builder_attaches_nothing() {
        let f = fixture(false);
        f.connector.unregister_interceptor_builder("test.tag");

        let err = f.connector.connect(&definition()).unwrap_err();
        assert!(matches!(err, RuntimeError::BuilderNotFound(ref kind) if kind == "test.tag"));
        assert!(calls(&f.log).is_empty());
    }

    #[test]
    fn test_failed_source_attach_rolls_back_target() {
        let f = fixture(true);
        assert!(f.connector.connect(&definition()).is_err());
        assert_eq!(
            calls(&f.log),
            vec!["target.attach", "source.attach", "target.detach"]
        );
    }

    #[test]
    fn test_disconnect_detaches_both_ends() {
        let f = fixture(false);
        f.connector.connect(&definition()).unwrap();
        f.connector.disconnect(&definition()).unwrap();
        assert_eq!(
            calls(&f.log)[2..],
            ["source.detach".to_string(), "target.detach".to_string()]
        );
    }
}
