//! Runtime orchestration layer
//!
//! Coordinates startup and shutdown across the scope containers and channel
//! services held by the [`RuntimeContainer`](crate::core::RuntimeContainer).

pub mod lifecycle;

pub use lifecycle::RuntimeLifecycle;
