//! Data type conversion for event streams

use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, warn};

use crate::core::{RuntimeError, RuntimeResult};

use super::{
    event::Event,
    stream::{EventStreamHandler, HandlerKind, NextHandler},
};

/// Converts events from one data type to another
pub trait Transformer: Send + Sync {
    fn transform(&self, event: Event) -> RuntimeResult<Event>;
}

pub struct TransformerHandler {
    source_type: String,
    target_type: String,
    transformer: Arc<dyn Transformer>,
}

impl TransformerHandler {
    pub fn new(
        source_type: impl Into<String>,
        target_type: impl Into<String>,
        transformer: Arc<dyn Transformer>,
    ) -> Self {
        Self {
            source_type: source_type.into(),
            target_type: target_type.into(),
            transformer,
        }
    }
}

impl EventStreamHandler for TransformerHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Transformer
    }

    fn label(&self) -> String {
        format!("transformer:{}->{}", self.source_type, self.target_type)
    }

    fn handle(&self, event: Event, next: NextHandler<'_>) -> RuntimeResult<()> {
        let mut event = self.transformer.transform(event)?;
        event.data_type.clone_from(&self.target_type);
        next.handle(event)
    }
}

/// Transformers keyed by (source data type, target data type)
#[derive(Default)]
pub struct TransformerRegistry {
    transformers: DashMap<(String, String), Arc<dyn Transformer>>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, source_type: &str, target_type: &str, transformer: Arc<dyn Transformer>) {
        debug!("Registering transformer {} -> {}", source_type, target_type);
        let key = (source_type.to_string(), target_type.to_string());
        if self.transformers.insert(key, transformer).is_some() {
            warn!("Replaced transformer {} -> {}", source_type, target_type);
        }
    }

    pub fn unregister(&self, source_type: &str, target_type: &str) -> Option<Arc<dyn Transformer>> {
        self.transformers
            .remove(&(source_type.to_string(), target_type.to_string()))
            .map(|(_, t)| t)
    }

    pub fn get(&self, source_type: &str, target_type: &str) -> Option<Arc<dyn Transformer>> {
        self.transformers
            .get(&(source_type.to_string(), target_type.to_string()))
            .map(|t| t.value().clone())
    }

    pub fn resolve(&self, source_type: &str, target_type: &str) -> RuntimeResult<Arc<dyn Transformer>> {
        self.get(source_type, target_type)
            .ok_or_else(|| RuntimeError::TransformerNotFound {
                source: source_type.to_string(),
                target: target_type.to_string(),
            })
    }
}
