//! Fan-out of channel events to subscribed consumer connections
//!
//! Subscriber lists are copy-on-write: publishing loads the current list
//! without locking, while subscribe and unsubscribe swap in a new one.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use arc_swap::ArcSwap;
use log::{debug, error, warn};

use crate::core::{RuntimeResult, WorkerPool};

use super::{
    event::Event,
    stream::{ChannelConnection, EventStreamHandler, HandlerKind, NextHandler},
};

#[derive(Clone)]
pub struct Subscriber {
    key: String,
    order: u64,
    connection: Arc<ChannelConnection>,
}

impl Subscriber {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn connection(&self) -> &Arc<ChannelConnection> {
        &self.connection
    }
}

/// Subscribers ordered by connection sequence, then by attach order
pub struct Subscribers {
    list: ArcSwap<Vec<Subscriber>>,
    attached: AtomicU64,
}

impl Default for Subscribers {
    fn default() -> Self {
        Self {
            list: ArcSwap::from_pointee(Vec::new()),
            attached: AtomicU64::new(0),
        }
    }
}

impl Subscribers {
    pub fn subscribe(&self, key: &str, connection: Arc<ChannelConnection>) {
        let subscriber = Subscriber {
            key: key.to_string(),
            order: self.attached.fetch_add(1, Ordering::SeqCst),
            connection,
        };
        self.list.rcu(|current| {
            let mut next: Vec<Subscriber> = current
                .iter()
                .filter(|s| s.key != subscriber.key)
                .cloned()
                .collect();
            next.push(subscriber.clone());
            next.sort_by_key(|s| (s.connection.sequence(), s.order));
            next
        });
    }

    pub fn unsubscribe(&self, key: &str) -> bool {
        let previous = self.list.rcu(|current| {
            current
                .iter()
                .filter(|s| s.key != key)
                .cloned()
                .collect::<Vec<_>>()
        });
        previous.iter().any(|s| s.key == key)
    }

    pub fn clear(&self) -> usize {
        self.list.swap(Arc::new(Vec::new())).len()
    }

    pub fn snapshot(&self) -> Arc<Vec<Subscriber>> {
        self.list.load_full()
    }

    pub fn len(&self) -> usize {
        self.list.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.load().is_empty()
    }
}

/// Terminal handler of a channel delivering each event to every subscriber
pub trait FanOutHandler: EventStreamHandler {
    fn subscribers(&self) -> &Subscribers;

    /// Deliver to local subscribers only
    fn deliver(&self, event: Event) -> RuntimeResult<()> {
        self.handle(event, NextHandler::terminal())
    }
}

/// Delivers on the publishing thread. A failing or panicking consumer is
/// logged and skipped; the rest still receive the event.
#[derive(Default)]
pub struct SyncFanOutHandler {
    subscribers: Subscribers,
}

impl SyncFanOutHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStreamHandler for SyncFanOutHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::FanOut
    }

    fn label(&self) -> String {
        "fan-out:sync".to_string()
    }

    fn handle(&self, event: Event, _next: NextHandler<'_>) -> RuntimeResult<()> {
        let subscribers = self.subscribers.snapshot();
        for subscriber in subscribers.iter() {
            let delivery = event.clone();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                subscriber.connection.handle(delivery)
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Delivery of {} to {} failed: {}", event.id, subscriber.key, e)
                }
                Err(_) => error!("Consumer {} panicked handling {}", subscriber.key, event.id),
            }
        }
        Ok(())
    }
}

impl FanOutHandler for SyncFanOutHandler {
    fn subscribers(&self) -> &Subscribers {
        &self.subscribers
    }
}

/// Submits each delivery to the worker pool and returns immediately
pub struct AsyncFanOutHandler {
    subscribers: Subscribers,
    pool: Arc<WorkerPool>,
}

impl AsyncFanOutHandler {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            subscribers: Subscribers::default(),
            pool,
        }
    }
}

impl EventStreamHandler for AsyncFanOutHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::FanOut
    }

    fn label(&self) -> String {
        "fan-out:async".to_string()
    }

    fn handle(&self, event: Event, _next: NextHandler<'_>) -> RuntimeResult<()> {
        let subscribers = self.subscribers.snapshot();
        debug!(
            "Submitting event {} to {} subscribers",
            event.id,
            subscribers.len()
        );
        for subscriber in subscribers.iter() {
            let subscriber = subscriber.clone();
            let event = event.clone();
            self.pool.execute(move || {
                let id = event.id;
                if let Err(e) = subscriber.connection.handle(event) {
                    warn!("Delivery of {} to {} failed: {}", id, subscriber.key, e);
                }
            });
        }
        Ok(())
    }
}

impl FanOutHandler for AsyncFanOutHandler {
    fn subscribers(&self) -> &Subscribers {
        &self.subscribers
    }
}
