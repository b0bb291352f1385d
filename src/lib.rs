//! Component assembly runtime.
//!
//! Manages scoped component instances, connects references to services through
//! interceptor wires, and carries events between producers and consumers over
//! channels, optionally replicated across the nodes of a zone.

pub mod channel;
pub mod config;
pub mod core;
pub mod logging;
pub mod orchestration;
pub mod scope;
pub mod wire;
