//! Event streams and channel connections
//!
//! An [`EventStream`] is the ordered handler sequence an event passes through
//! on one connection: an optional transformer, the filters, then a terminal
//! handler installed by the target attacher. Streams are built mutably and
//! sealed inside an `Arc<ChannelConnection>` before they carry events.

use std::{fmt, sync::Arc};

use uuid::Uuid;

use crate::core::{RuntimeError, RuntimeResult};

use super::event::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Transformer,
    Filter,
    /// Terminal handler publishing into a channel
    Publish,
    /// Terminal handler delivering to a consumer
    Delivery,
    Replication,
    FanOut,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            HandlerKind::Transformer => "transformer",
            HandlerKind::Filter => "filter",
            HandlerKind::Publish => "publish",
            HandlerKind::Delivery => "delivery",
            HandlerKind::Replication => "replication",
            HandlerKind::FanOut => "fan-out",
        };
        write!(f, "{name}")
    }
}

pub trait EventStreamHandler: Send + Sync {
    fn kind(&self) -> HandlerKind;

    /// Short description used in logs and diagnostics
    fn label(&self) -> String {
        self.kind().to_string()
    }

    /// Handle `event`, passing it on with `next.handle(..)` or dropping it
    /// by returning without doing so.
    fn handle(&self, event: Event, next: NextHandler<'_>) -> RuntimeResult<()>;
}

/// The handlers after the current one
#[derive(Clone, Copy)]
pub struct NextHandler<'a> {
    rest: &'a [Arc<dyn EventStreamHandler>],
}

impl NextHandler<'_> {
    /// A continuation with nothing after it, for terminal handlers invoked
    /// directly
    pub fn terminal() -> NextHandler<'static> {
        NextHandler { rest: &[] }
    }

    pub fn handle(self, event: Event) -> RuntimeResult<()> {
        match self.rest.split_first() {
            Some((head, rest)) => head.handle(event, NextHandler { rest }),
            None => Err(RuntimeError::Delivery(format!(
                "Event {} reached the end of a stream without a terminal handler",
                event.id
            ))),
        }
    }
}

pub struct EventStream {
    source_type: String,
    target_type: String,
    handlers: Vec<Arc<dyn EventStreamHandler>>,
}

impl EventStream {
    pub fn new(source_type: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            target_type: target_type.into(),
            handlers: Vec::new(),
        }
    }

    pub fn source_type(&self) -> &str {
        &self.source_type
    }

    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    pub fn add_handler(&mut self, handler: Arc<dyn EventStreamHandler>) {
        self.handlers.push(handler);
    }

    pub fn handlers(&self) -> &[Arc<dyn EventStreamHandler>] {
        &self.handlers
    }

    pub fn handler_kinds(&self) -> Vec<HandlerKind> {
        self.handlers.iter().map(|h| h.kind()).collect()
    }

    pub fn handle(&self, event: Event) -> RuntimeResult<()> {
        NextHandler {
            rest: &self.handlers,
        }
        .handle(event)
    }
}

/// One producer or consumer attached to a channel through a stream
pub struct ChannelConnection {
    id: Uuid,
    sequence: i32,
    stream: EventStream,
}

impl ChannelConnection {
    pub fn new(stream: EventStream, sequence: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence,
            stream,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Delivery order among connections on the same channel, lowest first
    pub fn sequence(&self) -> i32 {
        self.sequence
    }

    pub fn stream(&self) -> &EventStream {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut EventStream {
        &mut self.stream
    }

    pub fn handle(&self, event: Event) -> RuntimeResult<()> {
        self.stream.handle(event)
    }
}

/// Receives events at the consumer end of a connection
pub trait EventConsumer: Send + Sync {
    fn on_event(&self, event: Event) -> RuntimeResult<()>;
}

/// Terminal handler handing events to a consumer
pub struct DeliveryHandler {
    consumer: Arc<dyn EventConsumer>,
}

impl DeliveryHandler {
    pub fn new(consumer: Arc<dyn EventConsumer>) -> Self {
        Self { consumer }
    }
}

impl EventStreamHandler for DeliveryHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Delivery
    }

    fn handle(&self, event: Event, _next: NextHandler<'_>) -> RuntimeResult<()> {
        self.consumer.on_event(event)
    }
}
