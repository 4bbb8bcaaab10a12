mod error;
pub use error::{ModelError, ModelResult};

mod scheduler;
pub use scheduler::SchedulerEntry;

mod tls;
pub use tls::{TlsConfig, TlsMaterial};

/// Name of a logical build environment.
///
/// Opaque and case-sensitive; it is the only key used to route requests.
/// The empty string is a valid instance name.
pub type InstanceName = String;
