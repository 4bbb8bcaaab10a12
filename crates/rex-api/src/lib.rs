//! gRPC surface of the remote execution frontend.
//!
//! [`BuildQueueService`] adapts any [`rex_core::BuildQueue`] to the generated
//! `Capabilities` and `Execution` services; [`FrontendServer`] serves them, optionally
//! over TLS, until a shutdown token fires and in-flight calls have drained.
mod error;
mod grpc;
mod server;

pub use error::ApiError;
pub use grpc::BuildQueueService;
pub use server::{DEFAULT_DRAIN_GRACE, FrontendServer};

pub use rex_proto::reapi::{capabilities_server::CapabilitiesServer, execution_server::ExecutionServer};
