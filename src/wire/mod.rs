//! Request/response wiring
//!
//! The [`Connector`] turns a [`WireDefinition`] into a live [`Wire`]: one
//! interceptor chain per operation, with the target dispatch installed at the
//! tail by the target attacher and the sealed wire handed to the source
//! attacher. Optimizable definitions skip the chains and pass an
//! [`ObjectFactory`] straight through.

pub mod attacher;
pub mod chain;
pub mod connector;
pub mod definition;
pub mod invoker;
pub mod message;

pub use attacher::{InterceptorBuilder, ObjectFactory, SourceWireAttacher, TargetWireAttacher};
pub use chain::{Interceptor, InvocationChain, Next, Wire};
pub use connector::Connector;
pub use definition::{
    InterceptorDefinition, OperationDefinition, WireDefinition, WireSourceDefinition,
    WireTargetDefinition,
};
pub use invoker::{ScopedInvoker, ScopedObjectFactory, TargetOperation};
pub use message::{Message, Payload};
