//! Per-context instance cache shared by the caching scope containers
//!
//! Each (context activation, component) pair owns one slot holding a
//! `OnceCell`, so racing first accesses create exactly one instance while
//! unrelated slots and contexts never contend on a common lock. Slots are keyed
//! by the activation sequence, so an instance created under one activation is
//! never handed out by a later one.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError, RwLock,
};

use dashmap::{mapref::entry::Entry, DashMap};
use log::{debug, error, info, warn};
use once_cell::sync::OnceCell;

use crate::core::{ComponentFailure, Instance, RuntimeError, RuntimeResult, ScopedComponent};

use super::{ContextState, Scope};

struct ContextEntry {
    state: ContextState,
    /// Activation sequence; also the epoch of the context's slots
    sequence: u64,
    /// Instances in creation order; torn down in reverse
    destroy_queue: Vec<(Arc<dyn ScopedComponent>, Instance)>,
}

struct Slot {
    component: Arc<dyn ScopedComponent>,
    cell: OnceCell<Instance>,
}

type SlotKey = (String, String, u64);

pub struct InstanceCache {
    scope: Scope,
    components: RwLock<Vec<Arc<dyn ScopedComponent>>>,
    contexts: DashMap<String, Arc<Mutex<ContextEntry>>>,
    slots: DashMap<SlotKey, Arc<Slot>>,
    sequence: AtomicU64,
}

fn lock(context: &Mutex<ContextEntry>) -> MutexGuard<'_, ContextEntry> {
    context.lock().unwrap_or_else(PoisonError::into_inner)
}

fn slot_key(group_id: &str, component: &dyn ScopedComponent, epoch: u64) -> SlotKey {
    (group_id.to_string(), component.uri().to_string(), epoch)
}

/// Fold collected failures into one aggregate error naming every component.
pub(crate) fn aggregate(context: &str, failures: Vec<ComponentFailure>) -> RuntimeResult<()> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(RuntimeError::ContextInitialization {
            context: context.to_string(),
            failures,
        })
    }
}

impl InstanceCache {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            components: RwLock::new(Vec::new()),
            contexts: DashMap::new(),
            slots: DashMap::new(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn register(&self, component: Arc<dyn ScopedComponent>) {
        let mut components = self
            .components
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if components.iter().any(|c| c.uri() == component.uri()) {
            warn!("{} already registered in {} scope", component.uri(), self.scope);
            return;
        }
        debug!("Registering {} in {} scope", component.uri(), self.scope);
        components.push(component);
    }

    pub fn unregister(&self, component: &dyn ScopedComponent) {
        debug!("Unregistering {} from {} scope", component.uri(), self.scope);
        self.components
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|c| c.uri() != component.uri());
    }

    /// Mark a context started. Returns false if it was already started.
    pub fn activate(&self, group_id: &str) -> bool {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        match self.contexts.entry(group_id.to_string()) {
            Entry::Occupied(entry) => {
                let mut context = lock(entry.get());
                if context.state == ContextState::Started {
                    return false;
                }
                context.state = ContextState::Started;
                context.sequence = sequence;
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Mutex::new(ContextEntry {
                    state: ContextState::Started,
                    sequence,
                    destroy_queue: Vec::new(),
                })));
            }
        }
        info!("Started context {} in {} scope", group_id, self.scope);
        true
    }

    pub fn is_started(&self, group_id: &str) -> bool {
        self.context_state(group_id) == ContextState::Started
    }

    /// Number of contexts currently tracked
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Activation sequence of a started context
    fn started_epoch(&self, group_id: &str) -> Option<u64> {
        self.contexts.get(group_id).and_then(|entry| {
            let context = lock(entry.value());
            (context.state == ContextState::Started).then_some(context.sequence)
        })
    }

    pub fn context_state(&self, group_id: &str) -> ContextState {
        self.contexts
            .get(group_id)
            .map(|entry| lock(entry.value()).state)
            .unwrap_or(ContextState::Uninitialized)
    }

    /// Create and start every eager component of a started context.
    ///
    /// Components that already have an instance are skipped, so calling this
    /// again for the same context is harmless.
    pub fn initialize_eager(&self, group_id: &str) -> RuntimeResult<()> {
        let eager: Vec<Arc<dyn ScopedComponent>> = self
            .components
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.group_id() == group_id && c.is_eager_init())
            .cloned()
            .collect();

        debug!(
            "Initializing {} eager components in context {}",
            eager.len(),
            group_id
        );

        let mut failures = Vec::new();
        for component in eager {
            if let Err(e) = self.get_instance(&component) {
                error!("Eager initialization of {} failed: {}", component.uri(), e);
                failures.push(ComponentFailure {
                    component_uri: component.uri().to_string(),
                    error: e,
                });
            }
        }
        aggregate(group_id, failures)
    }

    pub fn get_instance(&self, component: &Arc<dyn ScopedComponent>) -> RuntimeResult<Instance> {
        let group_id = component.group_id();
        loop {
            let context = self
                .contexts
                .get(group_id)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| RuntimeError::ContextNotStarted(group_id.to_string()))?;
            let epoch = {
                let entry = lock(&context);
                if entry.state != ContextState::Started {
                    return Err(RuntimeError::ContextNotStarted(group_id.to_string()));
                }
                entry.sequence
            };

            let slot = self
                .slots
                .entry(slot_key(group_id, component.as_ref(), epoch))
                .or_insert_with(|| {
                    Arc::new(Slot {
                        component: component.clone(),
                        cell: OnceCell::new(),
                    })
                })
                .value()
                .clone();

            match slot
                .cell
                .get_or_try_init(|| self.create_in_context(component, &context, epoch))
            {
                Ok(instance) => return Ok(instance.clone()),
                // restarted while creating; retry under the new activation
                Err(RuntimeError::ContextNotStarted(_))
                    if self.started_epoch(group_id).is_some_and(|e| e != epoch) =>
                {
                    continue
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn create_in_context(
        &self,
        component: &Arc<dyn ScopedComponent>,
        context: &Mutex<ContextEntry>,
        epoch: u64,
    ) -> RuntimeResult<Instance> {
        let is_current =
            |entry: &ContextEntry| entry.state == ContextState::Started && entry.sequence == epoch;

        if !is_current(&*lock(context)) {
            return Err(RuntimeError::ContextNotStarted(
                component.group_id().to_string(),
            ));
        }

        let instance = component.create_instance()?;
        component.start_instance(&instance)?;

        let mut entry = lock(context);
        if !is_current(&*entry) {
            // context stopped while the instance was being created
            drop(entry);
            if let Err(e) = component.stop_instance(&instance) {
                warn!("Failed to stop orphaned instance of {}: {}", component.uri(), e);
            }
            return Err(RuntimeError::ContextNotStarted(
                component.group_id().to_string(),
            ));
        }
        entry.destroy_queue.push((component.clone(), instance.clone()));
        debug!("Created instance of {} in {} scope", component.uri(), self.scope);
        Ok(instance)
    }

    /// Stop a context, tearing its instances down in reverse creation order.
    pub fn stop_context(&self, group_id: &str) -> RuntimeResult<()> {
        let Some(context) = self.contexts.get(group_id).map(|e| e.value().clone()) else {
            debug!("Context {} not found in {} scope", group_id, self.scope);
            return Ok(());
        };

        let queue = {
            let mut entry = lock(&context);
            if entry.state != ContextState::Started {
                return Ok(());
            }
            entry.state = ContextState::Stopped;
            // drop the slots before any instance is stopped
            let epoch = entry.sequence;
            self.slots
                .retain(|key, _| !(key.0 == group_id && key.2 == epoch));
            std::mem::take(&mut entry.destroy_queue)
        };

        info!(
            "Stopping context {} in {} scope ({} instances)",
            group_id,
            self.scope,
            queue.len()
        );

        let mut failures = Vec::new();
        for (component, instance) in queue.into_iter().rev() {
            if let Err(e) = component.stop_instance(&instance) {
                warn!("Failed to stop instance of {}: {}", component.uri(), e);
                failures.push(ComponentFailure {
                    component_uri: component.uri().to_string(),
                    error: e,
                });
            }
        }

        // a stopped context reads the same as one never started
        self.contexts.remove_if(group_id, |_, entry| {
            Arc::ptr_eq(entry, &context) && lock(entry).state == ContextState::Stopped
        });
        aggregate(group_id, failures)
    }

    /// Stop every started context, most recently started first.
    pub fn stop_all(&self) -> RuntimeResult<()> {
        let mut started: Vec<(u64, String)> = self
            .contexts
            .iter()
            .filter_map(|entry| {
                let context = lock(entry.value());
                (context.state == ContextState::Started)
                    .then(|| (context.sequence, entry.key().clone()))
            })
            .collect();
        started.sort_by(|a, b| b.0.cmp(&a.0));

        let mut failures = Vec::new();
        for (_, group_id) in &started {
            if let Err(e) = self.stop_context(group_id) {
                match e {
                    RuntimeError::ContextInitialization { failures: f, .. } => failures.extend(f),
                    other => failures.push(ComponentFailure {
                        component_uri: group_id.clone(),
                        error: other,
                    }),
                }
            }
        }
        aggregate(self.scope.as_str(), failures)
    }

    pub fn active_instances(&self, component: &dyn ScopedComponent) -> Vec<Instance> {
        let Some(epoch) = self.started_epoch(component.group_id()) else {
            return Vec::new();
        };
        self.slots
            .get(&slot_key(component.group_id(), component, epoch))
            .and_then(|slot| slot.cell.get().cloned())
            .into_iter()
            .collect()
    }

    pub fn reinject(&self) -> RuntimeResult<()> {
        let live: Vec<(Arc<dyn ScopedComponent>, Instance)> = self
            .slots
            .iter()
            .filter(|slot| slot.component.is_reinjectable())
            .filter_map(|slot| {
                slot.cell
                    .get()
                    .map(|instance| (slot.component.clone(), instance.clone()))
            })
            .collect();

        let mut failures = Vec::new();
        for (component, instance) in live {
            if let Err(e) = component.reinject(&instance) {
                warn!("Failed to reinject {}: {}", component.uri(), e);
                failures.push(ComponentFailure {
                    component_uri: component.uri().to_string(),
                    error: e,
                });
            }
        }
        aggregate(self.scope.as_str(), failures)
    }
}
