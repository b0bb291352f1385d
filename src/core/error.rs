//! Unified error handling for the runtime
//!
//! Every layer (scopes, wires, channels) reports through [`RuntimeError`] so the
//! deployment driver sees one error type at its boundary. Business faults raised
//! by a target operation are not errors: they travel back inside the response
//! message.

use std::fmt;

/// A single component that failed during a batched operation.
#[derive(Debug)]
pub struct ComponentFailure {
    pub component_uri: String,
    pub error: RuntimeError,
}

/// Unified error types for the runtime
#[derive(Debug)]
pub enum RuntimeError {
    /// Invalid or missing configuration
    Configuration(String),

    /// No attacher registered for a definition kind
    AttacherNotFound(String),

    /// No interceptor or filter builder registered for a definition kind
    BuilderNotFound(String),

    /// No transformer between two data types
    TransformerNotFound { source: String, target: String },

    /// Instance requested for a context that is not started
    ContextNotStarted(String),

    /// Create, start, stop or reinject failed for one component instance
    Lifecycle { component: String, message: String },

    /// One or more components failed while a context was being initialized,
    /// stopped or reinjected
    ContextInitialization {
        context: String,
        failures: Vec<ComponentFailure>,
    },

    /// Infrastructure failure while dispatching an invocation
    Invocation(String),

    /// Event could not be delivered
    Delivery(String),

    /// Cross-node replication failure
    Replication(String),

    /// Payload (de)serialization failure
    Serialization(serde_json::Error),

    /// I/O errors
    Io(std::io::Error),

    /// Internal system errors
    Internal(String),
}

impl RuntimeError {
    /// Builds a lifecycle error for `component`.
    pub fn lifecycle(component: impl Into<String>, message: impl fmt::Display) -> Self {
        RuntimeError::Lifecycle {
            component: component.into(),
            message: message.to_string(),
        }
    }

    /// URIs of the failed components if this is an aggregate error.
    pub fn failed_components(&self) -> Vec<&str> {
        match self {
            RuntimeError::ContextInitialization { failures, .. } => failures
                .iter()
                .map(|f| f.component_uri.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Configuration errors abort a connect/disconnect and are never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RuntimeError::Configuration(_)
                | RuntimeError::AttacherNotFound(_)
                | RuntimeError::BuilderNotFound(_)
                | RuntimeError::TransformerNotFound { .. }
        )
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            RuntimeError::AttacherNotFound(kind) => {
                write!(f, "Attacher not found for definition kind: {kind}")
            }
            RuntimeError::BuilderNotFound(kind) => {
                write!(f, "Builder not found for definition kind: {kind}")
            }
            RuntimeError::TransformerNotFound { source, target } => {
                write!(f, "No transformer from {source} to {target}")
            }
            RuntimeError::ContextNotStarted(ctx) => write!(f, "Context not started: {ctx}"),
            RuntimeError::Lifecycle { component, message } => {
                write!(f, "Lifecycle error in {component}: {message}")
            }
            RuntimeError::ContextInitialization { context, failures } => {
                write!(f, "Errors in context {context}: ")?;
                for (i, failure) in failures.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{} ({})", failure.component_uri, failure.error)?;
                }
                Ok(())
            }
            RuntimeError::Invocation(msg) => write!(f, "Invocation error: {msg}"),
            RuntimeError::Delivery(msg) => write!(f, "Delivery error: {msg}"),
            RuntimeError::Replication(msg) => write!(f, "Replication error: {msg}"),
            RuntimeError::Serialization(err) => write!(f, "Serialization error: {err}"),
            RuntimeError::Io(err) => write!(f, "I/O error: {err}"),
            RuntimeError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Serialization(err) => Some(err),
            RuntimeError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        RuntimeError::Io(err)
    }
}

impl From<serde_json::Error> for RuntimeError {
    fn from(err: serde_json::Error) -> Self {
        RuntimeError::Serialization(err)
    }
}

impl From<validator::ValidationErrors> for RuntimeError {
    fn from(err: validator::ValidationErrors) -> Self {
        RuntimeError::Configuration(err.to_string())
    }
}

/// Result type alias for runtime operations
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn with_context(self, context: &str) -> RuntimeResult<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: fmt::Display,
{
    fn with_context(self, context: &str) -> RuntimeResult<T> {
        self.map_err(|e| RuntimeError::Internal(format!("{context}: {e}")))
    }
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::core::error::RuntimeError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::RuntimeError::Configuration(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::core::error::RuntimeError::Internal($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::RuntimeError::Internal(format!($fmt, $($arg)*))
    };
}
