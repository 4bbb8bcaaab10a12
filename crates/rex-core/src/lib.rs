//! Build-queue routing and stream forwarding for the remote execution frontend.
//!
//! - [`BuildQueue`]: the capabilities / execute / wait-execution contract.
//! - [`ForwardingBuildQueue`]: relays calls to one backend scheduler.
//! - [`NonExecutableBuildQueue`]: answers for cache-only instances.
//! - [`DemultiplexingBuildQueue`]: routes by instance name.
//! - [`InstancePlan`]: validates configuration and composes the above.
pub mod compose;
pub mod error;
pub mod metrics;
pub mod queue;

pub use compose::{ActionCachePermissions, Composition, InstancePlan};
pub use error::{ComposeError, QueueError};
pub use metrics::{CallOutcome, MetricsBackend, MetricsHandle, NoOpMetrics, RejectReason, noop_metrics};
pub use queue::{
    BuildQueue, BuildQueueRef, DemultiplexingBuildQueue, ForwardingBuildQueue, InstanceTable,
    NonExecutableBuildQueue, OperationStream, QueueMethod, QueueResolver, ReceivedAt, RoutingKey,
    operation_instance_name,
};

pub mod prelude {
    pub use crate::error::{ComposeError, QueueError};
    pub use crate::queue::{BuildQueue, BuildQueueRef, OperationStream};
    pub use crate::compose::{Composition, InstancePlan};
}
