//! Event filters and the builders that create them from definitions

use std::{any::Any, sync::Arc};

use log::trace;
use serde::{Deserialize, Serialize};

use crate::{config_error, core::RuntimeResult};

use super::{
    event::Event,
    stream::{EventStreamHandler, HandlerKind, NextHandler},
};

pub trait EventFilter: Send + Sync {
    fn name(&self) -> &str;

    /// False drops the event
    fn accept(&self, event: &Event) -> bool;
}

pub trait FilterDefinition: Send + Sync {
    /// Stable tag used to look up the filter builder
    fn kind(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
}

pub trait FilterBuilder: Send + Sync {
    fn build(&self, definition: &dyn FilterDefinition) -> RuntimeResult<Arc<dyn EventFilter>>;
}

pub struct FilterHandler {
    filter: Arc<dyn EventFilter>,
}

impl FilterHandler {
    pub fn new(filter: Arc<dyn EventFilter>) -> Self {
        Self { filter }
    }
}

impl EventStreamHandler for FilterHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Filter
    }

    fn label(&self) -> String {
        format!("filter:{}", self.filter.name())
    }

    fn handle(&self, event: Event, next: NextHandler<'_>) -> RuntimeResult<()> {
        if self.filter.accept(&event) {
            next.handle(event)
        } else {
            trace!("Filter {} dropped event {}", self.filter.name(), event.id);
            Ok(())
        }
    }
}

pub const TYPE_FILTER_KIND: &str = "filter.type";

/// Accepts events whose data type is one of `data_types`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TypeFilterDefinition {
    pub data_types: Vec<String>,
}

impl TypeFilterDefinition {
    pub fn new<I, S>(data_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data_types: data_types.into_iter().map(Into::into).collect(),
        }
    }
}

impl FilterDefinition for TypeFilterDefinition {
    fn kind(&self) -> &'static str {
        TYPE_FILTER_KIND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct TypeEventFilter {
    data_types: Vec<String>,
}

impl TypeEventFilter {
    pub fn new(data_types: Vec<String>) -> Self {
        Self { data_types }
    }
}

impl EventFilter for TypeEventFilter {
    fn name(&self) -> &str {
        "type"
    }

    fn accept(&self, event: &Event) -> bool {
        self.data_types.iter().any(|t| *t == event.data_type)
    }
}

pub struct TypeFilterBuilder;

impl FilterBuilder for TypeFilterBuilder {
    fn build(&self, definition: &dyn FilterDefinition) -> RuntimeResult<Arc<dyn EventFilter>> {
        let definition = definition
            .as_any()
            .downcast_ref::<TypeFilterDefinition>()
            .ok_or_else(|| config_error!("Expected a type filter definition"))?;
        if definition.data_types.is_empty() {
            return Err(config_error!("Type filter needs at least one data type"));
        }
        Ok(Arc::new(TypeEventFilter::new(definition.data_types.clone())))
    }
}
