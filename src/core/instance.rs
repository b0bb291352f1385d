//! Live component instances
//!
//! An [`Instance`] is a cheaply clonable handle to a component implementation
//! object. Two handles are the same instance exactly when their ids match.

use std::{any::Any, fmt, sync::Arc};

use uuid::Uuid;

#[derive(Clone)]
pub struct Instance {
    id: Uuid,
    value: Arc<dyn Any + Send + Sync>,
}

impl Instance {
    /// Wrap an implementation object under a fresh identity.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            value: Arc::new(value),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get a typed reference to the implementation object
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// True if both handles refer to the same instance
    pub fn same_as(&self, other: &Instance) -> bool {
        self.id == other.id
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Instance {}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance").field("id", &self.id).finish()
    }
}
