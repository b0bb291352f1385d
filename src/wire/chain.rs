//! Interceptor chains and wires
//!
//! A [`Wire`] holds one [`InvocationChain`] per operation of a contract. Chains
//! are only mutable while the owning wire is still being built; once the wire
//! is handed to a source attacher it lives behind an `Arc` and is read-only, so
//! in-flight invocations never observe a chain changing underneath them.

use std::sync::Arc;

use crate::core::{RuntimeError, RuntimeResult};

use super::{definition::OperationDefinition, message::Message};

/// One message-processing step in an invocation chain
pub trait Interceptor: Send + Sync {
    /// Process `message`, usually forwarding it with `next.invoke(..)`.
    /// The tail interceptor dispatches to the target and ignores `next`.
    fn invoke(&self, message: Message, next: Next<'_>) -> RuntimeResult<Message>;
}

/// The remainder of a chain after the current interceptor
#[derive(Clone, Copy)]
pub struct Next<'a> {
    operation: &'a str,
    rest: &'a [Arc<dyn Interceptor>],
}

impl Next<'_> {
    pub fn invoke(self, message: Message) -> RuntimeResult<Message> {
        match self.rest.split_first() {
            Some((head, rest)) => head.invoke(
                message,
                Next {
                    operation: self.operation,
                    rest,
                },
            ),
            None => Err(RuntimeError::Invocation(format!(
                "No target attached for operation {}",
                self.operation
            ))),
        }
    }

    pub fn operation(&self) -> &str {
        self.operation
    }

    /// Number of interceptors left, including the tail
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }
}

/// Ordered interceptors for one operation; head sees the request first
pub struct InvocationChain {
    operation: OperationDefinition,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InvocationChain {
    pub fn new(operation: OperationDefinition) -> Self {
        Self {
            operation,
            interceptors: Vec::new(),
        }
    }

    pub fn operation(&self) -> &OperationDefinition {
        &self.operation
    }

    /// Append an interceptor at the tail
    pub fn add_interceptor(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Insert an interceptor at `index`, clamped to the chain length
    pub fn insert_interceptor(&mut self, index: usize, interceptor: Arc<dyn Interceptor>) {
        let index = index.min(self.interceptors.len());
        self.interceptors.insert(index, interceptor);
    }

    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Send a message through the chain, head first
    pub fn invoke(&self, mut message: Message) -> RuntimeResult<Message> {
        message.set_operation(&self.operation.name);
        Next {
            operation: &self.operation.name,
            rest: &self.interceptors,
        }
        .invoke(message)
    }
}

/// Invocation chains of one wire, in contract operation order
#[derive(Default)]
pub struct Wire {
    chains: Vec<InvocationChain>,
}

impl Wire {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_chain(&mut self, chain: InvocationChain) {
        self.chains.push(chain);
    }

    pub fn chains(&self) -> &[InvocationChain] {
        &self.chains
    }

    pub fn chains_mut(&mut self) -> &mut [InvocationChain] {
        &mut self.chains
    }

    pub fn chain(&self, operation: &str) -> Option<&InvocationChain> {
        self.chains.iter().find(|c| c.operation.name == operation)
    }

    pub fn chain_mut(&mut self, operation: &str) -> Option<&mut InvocationChain> {
        self.chains.iter_mut().find(|c| c.operation.name == operation)
    }

    pub fn operation_names(&self) -> Vec<&str> {
        self.chains
            .iter()
            .map(|c| c.operation.name.as_str())
            .collect()
    }

    pub fn invoke(&self, operation: &str, message: Message) -> RuntimeResult<Message> {
        self.chain(operation)
            .ok_or_else(|| RuntimeError::Invocation(format!("Unknown operation: {operation}")))?
            .invoke(message)
    }
}
