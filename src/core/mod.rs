//! Core abstractions and interfaces for the runtime
//!
//! This module provides the error type, the collaborator traits, instance
//! handles, the kind-keyed handler registry, the worker pool and the
//! dependency injection container the rest of the crate is built on.

pub mod container;
pub mod error;
pub mod instance;
pub mod pool;
pub mod registry;
pub mod traits;


// Re-export commonly used types
pub use container::RuntimeContainer;
pub use error::{ComponentFailure, ErrorContext, RuntimeError, RuntimeResult};
pub use instance::Instance;
pub use pool::WorkerPool;
pub use registry::{HandlerRole, KindRegistry};
pub use traits::*;
