//! Connection attachers, including the built-in attachers for channel ends

use std::sync::Arc;

use log::debug;

use crate::{config_error, core::RuntimeResult};

use super::{
    bus::{Channel, PublishHandler},
    definition::{
        ChannelSourceDefinition, ChannelTargetDefinition, SourceConnectionDefinition,
        TargetConnectionDefinition,
    },
    manager::ChannelManager,
    stream::ChannelConnection,
};

/// Attaches the source end of a connection
pub trait SourceConnectionAttacher: Send + Sync {
    /// Take a sealed connection whose stream is complete
    fn attach(
        &self,
        source: &dyn SourceConnectionDefinition,
        target: &dyn TargetConnectionDefinition,
        connection: Arc<ChannelConnection>,
    ) -> RuntimeResult<()>;

    fn detach(
        &self,
        source: &dyn SourceConnectionDefinition,
        target: &dyn TargetConnectionDefinition,
    ) -> RuntimeResult<()>;
}

/// Attaches the target end of a connection
pub trait TargetConnectionAttacher: Send + Sync {
    /// Install the terminal handler of the stream before it is sealed
    fn attach(
        &self,
        source: &dyn SourceConnectionDefinition,
        target: &dyn TargetConnectionDefinition,
        connection: &mut ChannelConnection,
    ) -> RuntimeResult<()>;

    fn detach(
        &self,
        source: &dyn SourceConnectionDefinition,
        target: &dyn TargetConnectionDefinition,
    ) -> RuntimeResult<()>;
}

fn lookup(manager: &ChannelManager, uri: &str) -> RuntimeResult<Arc<Channel>> {
    manager
        .get(uri)
        .ok_or_else(|| config_error!("Channel not found: {}", uri))
}

/// Subscribes consumer connections to the fan-out of their source channel
pub struct ChannelSourceAttacher {
    manager: Arc<ChannelManager>,
}

impl ChannelSourceAttacher {
    pub fn new(manager: Arc<ChannelManager>) -> Self {
        Self { manager }
    }

    fn definition(
        source: &dyn SourceConnectionDefinition,
    ) -> RuntimeResult<&ChannelSourceDefinition> {
        source
            .as_any()
            .downcast_ref::<ChannelSourceDefinition>()
            .ok_or_else(|| config_error!("Expected a channel source definition"))
    }
}

impl SourceConnectionAttacher for ChannelSourceAttacher {
    fn attach(
        &self,
        source: &dyn SourceConnectionDefinition,
        target: &dyn TargetConnectionDefinition,
        connection: Arc<ChannelConnection>,
    ) -> RuntimeResult<()> {
        let source = Self::definition(source)?;
        lookup(&self.manager, &source.channel_uri)?.subscribe(target.uri(), connection);
        Ok(())
    }

    fn detach(
        &self,
        source: &dyn SourceConnectionDefinition,
        target: &dyn TargetConnectionDefinition,
    ) -> RuntimeResult<()> {
        let source = Self::definition(source)?;
        match self.manager.get(&source.channel_uri) {
            Some(channel) => {
                channel.unsubscribe(target.uri());
            }
            // channel already disposed along with its consumers
            None => debug!("Channel {} gone, nothing to detach", source.channel_uri),
        }
        Ok(())
    }
}

/// Terminates producer streams with a publish into their target channel
pub struct ChannelTargetAttacher {
    manager: Arc<ChannelManager>,
}

impl ChannelTargetAttacher {
    pub fn new(manager: Arc<ChannelManager>) -> Self {
        Self { manager }
    }
}

impl TargetConnectionAttacher for ChannelTargetAttacher {
    fn attach(
        &self,
        _source: &dyn SourceConnectionDefinition,
        target: &dyn TargetConnectionDefinition,
        connection: &mut ChannelConnection,
    ) -> RuntimeResult<()> {
        let target = target
            .as_any()
            .downcast_ref::<ChannelTargetDefinition>()
            .ok_or_else(|| config_error!("Expected a channel target definition"))?;
        let channel = lookup(&self.manager, &target.channel_uri)?;
        connection
            .stream_mut()
            .add_handler(Arc::new(PublishHandler::new(channel)));
        Ok(())
    }

    fn detach(
        &self,
        source: &dyn SourceConnectionDefinition,
        target: &dyn TargetConnectionDefinition,
    ) -> RuntimeResult<()> {
        // the producer drops its connection, and with it the publish handler
        debug!("Detached producer {} from channel {}", source.uri(), target.uri());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::channel::{
        definition::{ChannelDefinition, ChannelTargetDefinition},
        fanout::SyncFanOutHandler,
        stream::EventStream,
    };

    struct Foreign;

    impl SourceConnectionDefinition for Foreign {
        fn kind(&self) -> &'static str {
            "foreign"
        }

        fn uri(&self) -> &str {
            "app/unknown"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn manager_with(uri: &str) -> (Arc<ChannelManager>, Arc<Channel>) {
        let manager = Arc::new(ChannelManager::new());
        let channel = Arc::new(Channel::new(
            &ChannelDefinition::new(uri, "orders"),
            Arc::new(SyncFanOutHandler::new()),
            None,
        ));
        manager.register(channel.clone()).unwrap();
        (manager, channel)
    }

    #[test]
    fn test_detach_rejects_foreign_source() {
        let (manager, _) = manager_with("app/orders");
        let attacher = ChannelSourceAttacher::new(manager);
        let err = attacher
            .detach(&Foreign, &ChannelTargetDefinition::new("app/audit"))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_detach_unsubscribes_and_tolerates_disposed_channel() {
        let (manager, channel) = manager_with("app/orders");
        let attacher = ChannelSourceAttacher::new(manager.clone());
        let source = ChannelSourceDefinition::new("app/orders");
        let target = ChannelTargetDefinition::new("app/audit");

        let connection = ChannelConnection::new(EventStream::new("json", "json"), 0);
        attacher.attach(&source, &target, Arc::new(connection)).unwrap();
        assert_eq!(channel.subscriber_count(), 1);

        attacher.detach(&source, &target).unwrap();
        assert_eq!(channel.subscriber_count(), 0);

        manager.unregister("app/orders");
        attacher.detach(&source, &target).unwrap();
        assert!(attacher
            .detach(&ChannelSourceDefinition::new("app/never"), &target)
            .is_ok());
    }
}
