//! Physical wire definitions produced by the deployment generator
//!
//! Concrete definition types live with the extensions that handle them. The
//! connector only needs each definition's `kind()` tag to find a handler; the
//! handler downcasts through `as_any()` to read its own fields.

use std::{any::Any, sync::Arc};

pub trait WireSourceDefinition: Send + Sync {
    /// Stable tag used to look up the source attacher
    fn kind(&self) -> &'static str;

    fn uri(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

pub trait WireTargetDefinition: Send + Sync {
    /// Stable tag used to look up the target attacher
    fn kind(&self) -> &'static str;

    fn uri(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

pub trait InterceptorDefinition: Send + Sync {
    /// Stable tag used to look up the interceptor builder
    fn kind(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
}

/// One contract operation and the interceptors its chain is built from
#[derive(Clone)]
pub struct OperationDefinition {
    pub name: String,
    pub input_types: Vec<String>,
    pub output_type: Option<String>,
    pub one_way: bool,
    /// Built and appended in this order
    pub interceptors: Vec<Arc<dyn InterceptorDefinition>>,
}

impl OperationDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_types: Vec::new(),
            output_type: None,
            one_way: false,
            interceptors: Vec::new(),
        }
    }

    pub fn with_input(mut self, data_type: impl Into<String>) -> Self {
        self.input_types.push(data_type.into());
        self
    }

    pub fn with_output(mut self, data_type: impl Into<String>) -> Self {
        self.output_type = Some(data_type.into());
        self
    }

    pub fn one_way(mut self) -> Self {
        self.one_way = true;
        self
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn InterceptorDefinition>) -> Self {
        self.interceptors.push(interceptor);
        self
    }
}

/// Everything needed to connect one reference to one service
#[derive(Clone)]
pub struct WireDefinition {
    pub source: Arc<dyn WireSourceDefinition>,
    pub target: Arc<dyn WireTargetDefinition>,
    pub operations: Vec<OperationDefinition>,
    /// Pass an object factory straight to the source instead of building
    /// chains. Only valid when no operation carries interceptors.
    pub optimizable: bool,
}

impl WireDefinition {
    pub fn new(
        source: Arc<dyn WireSourceDefinition>,
        target: Arc<dyn WireTargetDefinition>,
    ) -> Self {
        Self {
            source,
            target,
            operations: Vec::new(),
            optimizable: false,
        }
    }

    pub fn with_operation(mut self, operation: OperationDefinition) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn optimizable(mut self, optimizable: bool) -> Self {
        self.optimizable = optimizable;
        self
    }

    pub fn has_interceptors(&self) -> bool {
        self.operations.iter().any(|op| !op.interceptors.is_empty())
    }
}
