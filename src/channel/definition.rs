//! Channel and channel connection definitions

use std::{any::Any, sync::Arc};

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::filter::FilterDefinition;

#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Consumers run on the publishing thread
    #[default]
    Sync,
    /// Consumers run on the worker pool
    Async,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct ChannelDefinition {
    #[validate(length(min = 1))]
    pub uri: String,

    /// Also names the replication transport channel
    #[validate(length(min = 1))]
    pub name: String,

    #[serde(default = "ChannelDefinition::default_data_type")]
    #[validate(length(min = 1))]
    pub data_type: String,

    #[serde(default)]
    pub delivery: DeliveryMode,

    #[serde(default)]
    pub replicate: bool,
}

impl ChannelDefinition {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            data_type: Self::default_data_type(),
            delivery: DeliveryMode::default(),
            replicate: false,
        }
    }

    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = data_type.into();
        self
    }

    pub fn with_delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn replicated(mut self) -> Self {
        self.replicate = true;
        self
    }

    fn default_data_type() -> String {
        "json".to_string()
    }
}

pub trait SourceConnectionDefinition: Send + Sync {
    /// Stable tag used to look up the source connection attacher
    fn kind(&self) -> &'static str;

    fn uri(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

pub trait TargetConnectionDefinition: Send + Sync {
    /// Stable tag used to look up the target connection attacher
    fn kind(&self) -> &'static str;

    fn uri(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

/// How the stream of one connection is built
#[derive(Clone)]
pub struct EventStreamDefinition {
    /// Data type produced at the source end
    pub source_type: String,
    /// Data type expected at the target end
    pub target_type: String,
    /// Applied in declaration order, after any transformer
    pub filters: Vec<Arc<dyn FilterDefinition>>,
}

impl EventStreamDefinition {
    pub fn new(source_type: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            target_type: target_type.into(),
            filters: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: Arc<dyn FilterDefinition>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn needs_transformer(&self) -> bool {
        self.source_type != self.target_type
    }
}

#[derive(Clone)]
pub struct ChannelConnectionDefinition {
    pub source: Arc<dyn SourceConnectionDefinition>,
    pub target: Arc<dyn TargetConnectionDefinition>,
    pub stream: EventStreamDefinition,
    /// Orders multiple connections on the same channel, lowest first
    pub sequence: i32,
}

impl ChannelConnectionDefinition {
    pub fn new(
        source: Arc<dyn SourceConnectionDefinition>,
        target: Arc<dyn TargetConnectionDefinition>,
        stream: EventStreamDefinition,
    ) -> Self {
        Self {
            source,
            target,
            stream,
            sequence: 0,
        }
    }

    pub fn with_sequence(mut self, sequence: i32) -> Self {
        self.sequence = sequence;
        self
    }
}

pub const CHANNEL_SOURCE_KIND: &str = "channel.source";
pub const CHANNEL_TARGET_KIND: &str = "channel.target";

/// A channel feeding a consumer connection
#[derive(Clone, Debug)]
pub struct ChannelSourceDefinition {
    pub channel_uri: String,
}

impl ChannelSourceDefinition {
    pub fn new(channel_uri: impl Into<String>) -> Self {
        Self {
            channel_uri: channel_uri.into(),
        }
    }
}

impl SourceConnectionDefinition for ChannelSourceDefinition {
    fn kind(&self) -> &'static str {
        CHANNEL_SOURCE_KIND
    }

    fn uri(&self) -> &str {
        &self.channel_uri
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A channel receiving a producer connection
#[derive(Clone, Debug)]
pub struct ChannelTargetDefinition {
    pub channel_uri: String,
}

impl ChannelTargetDefinition {
    pub fn new(channel_uri: impl Into<String>) -> Self {
        Self {
            channel_uri: channel_uri.into(),
        }
    }
}

impl TargetConnectionDefinition for ChannelTargetDefinition {
    fn kind(&self) -> &'static str {
        CHANNEL_TARGET_KIND
    }

    fn uri(&self) -> &str {
        &self.channel_uri
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_definition_from_yaml() {
        let yaml = r#"
uri: app/orders
name: orders
delivery: async
replicate: true
        "#;
        let definition: ChannelDefinition = serde_yaml::from_str(yaml).unwrap();
        assert!(definition.validate().is_ok());
        assert_eq!(definition.data_type, "json");
        assert_eq!(definition.delivery, DeliveryMode::Async);
        assert!(definition.replicate);
    }

    #[test]
    fn test_channel_definition_requires_name() {
        let definition = ChannelDefinition::new("app/orders", "");
        assert!(definition.validate().is_err());
    }
}
