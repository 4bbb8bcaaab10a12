//! The build queue contract and its three variants.
//!
//! Variants are chosen once, when the instance table is composed, and are then only ever
//! called through the [`BuildQueue`] trait object.
mod demultiplexing;
pub use demultiplexing::{
    DemultiplexingBuildQueue, InstanceTable, QueueResolver, RoutingKey, operation_instance_name,
};

mod forwarding;
pub use forwarding::{ForwardingBuildQueue, ReceivedAt};

mod non_executable;
pub use non_executable::NonExecutableBuildQueue;

use std::{fmt, pin::Pin, sync::Arc};

use async_trait::async_trait;
use futures::Stream;
use rex_proto::{
    Envelope, Operation,
    reapi::{ExecuteRequest, GetCapabilitiesRequest, ServerCapabilities, WaitExecutionRequest},
};
use tonic::{Request, Response, Status};

/// Stream of operation updates handed back to the caller of `Execute` / `WaitExecution`.
pub type OperationStream =
    Pin<Box<dyn Stream<Item = Result<Envelope<Operation>, Status>> + Send + 'static>>;

/// Capabilities and execution endpoints of one or more instances.
///
/// Signatures mirror the generated gRPC service traits so that implementations can be
/// mounted on a server without any translation. Messages travel as [`Envelope`]s: what
/// a caller or backend sent is passed on in its original encoding.
#[async_trait]
pub trait BuildQueue: Send + Sync + 'static {
    /// Report what the instance named in the request supports.
    ///
    /// Never blocks longer than one round trip to a backend.
    async fn get_capabilities(
        &self,
        request: Request<Envelope<GetCapabilitiesRequest>>,
    ) -> Result<Response<Envelope<ServerCapabilities>>, Status>;

    /// Start executing an action and stream the progress of its operation.
    async fn execute(
        &self,
        request: Request<Envelope<ExecuteRequest>>,
    ) -> Result<Response<OperationStream>, Status>;

    /// Reattach to an operation started by an earlier [`BuildQueue::execute`].
    async fn wait_execution(
        &self,
        request: Request<Envelope<WaitExecutionRequest>>,
    ) -> Result<Response<OperationStream>, Status>;
}

/// Shared handle to a build queue.
pub type BuildQueueRef = Arc<dyn BuildQueue>;

/// The three build-queue methods, used in logs, errors and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueMethod {
    GetCapabilities,
    Execute,
    WaitExecution,
}

impl QueueMethod {
    /// gRPC method name.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueMethod::GetCapabilities => "GetCapabilities",
            QueueMethod::Execute => "Execute",
            QueueMethod::WaitExecution => "WaitExecution",
        }
    }
}

impl fmt::Display for QueueMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
