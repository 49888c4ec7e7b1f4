//! Request/response correlation and event routing for the gateway protocol.
//!
//! [Client] is the entry point. The other modules are its building blocks and
//! can be used on their own, for example to route frames from a transport the
//! client does not manage.
mod client;
pub mod endpoints;
pub mod frame;
pub mod registry;
pub mod router;

pub use client::{CallError, Client, ConnectionState, ResponseFuture};
pub use endpoints::{Endpoint, EndpointError, EndpointMethod, EndpointResponse, EndpointTable};
pub use frame::{Frame, FrameParseError, MessageType};
pub use registry::{CallbackRegistry, Continuation, SequenceAllocator};
pub use router::{EventStream, Hub, Router, Topic, Topics};
