//! Instance-name based routing across build queues.
//!
//! The router resolves each request's instance name to a queue and delegates the call
//! unchanged. Requests for names that resolve to nothing are rejected locally.
use std::collections::HashMap;

use async_trait::async_trait;
use rex_proto::{
    Envelope,
    reapi::{ExecuteRequest, GetCapabilitiesRequest, ServerCapabilities, WaitExecutionRequest},
};
use tonic::{Request, Response, Status};
use tracing::{debug, instrument};

use crate::{
    error::QueueError,
    metrics::{MetricsHandle, RejectReason, noop_metrics},
    queue::{BuildQueue, BuildQueueRef, OperationStream, QueueMethod},
};

/// Separator between the instance name and the id in an operation name.
const OPERATIONS_SEGMENT: &str = "/operations/";

/// Instance name encoded in an operation name of the form `<instance>/operations/<id>`.
///
/// `WaitExecution` requests carry nothing but the operation name, so reattaching only
/// reaches the right scheduler when schedulers name their operations this way. Names
/// without an `/operations/` segment belong to the default (empty) instance.
///
/// ```
/// use rex_core::operation_instance_name;
///
/// assert_eq!(operation_instance_name("debian8/operations/1234"), "debian8");
/// assert_eq!(operation_instance_name("a/b/operations/x"), "a/b");
/// assert_eq!(operation_instance_name("1234"), "");
/// ```
pub fn operation_instance_name(operation: &str) -> &str {
    match operation.rfind(OPERATIONS_SEGMENT) {
        Some(idx) => &operation[..idx],
        None => "",
    }
}

/// Request types that carry the instance name used for routing.
pub trait RoutingKey {
    fn instance_name(&self) -> &str;
}

impl RoutingKey for GetCapabilitiesRequest {
    fn instance_name(&self) -> &str {
        &self.instance_name
    }
}

impl RoutingKey for ExecuteRequest {
    fn instance_name(&self) -> &str {
        &self.instance_name
    }
}

impl RoutingKey for WaitExecutionRequest {
    fn instance_name(&self) -> &str {
        operation_instance_name(&self.name)
    }
}

impl<M: RoutingKey> RoutingKey for Envelope<M> {
    fn instance_name(&self) -> &str {
        self.get_ref().instance_name()
    }
}

/// Maps an instance name to the queue serving it.
///
/// `None` means the name is unknown and the call is rejected with `InvalidArgument`.
/// Closures of the right shape implement this trait too.
pub trait QueueResolver: Send + Sync + 'static {
    fn resolve(&self, instance: &str) -> Option<BuildQueueRef>;
}

impl<F> QueueResolver for F
where
    F: Fn(&str) -> Option<BuildQueueRef> + Send + Sync + 'static,
{
    fn resolve(&self, instance: &str) -> Option<BuildQueueRef> {
        self(instance)
    }
}

/// Immutable mapping from instance names to queues, built once at startup.
#[derive(Clone, Default)]
pub struct InstanceTable {
    queues: HashMap<String, BuildQueueRef>,
}

impl InstanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue registered for `instance`, if any.
    #[inline]
    pub fn get(&self, instance: &str) -> Option<&BuildQueueRef> {
        self.queues.get(instance)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Registered instance names, in no particular order.
    pub fn instances(&self) -> impl Iterator<Item = &str> {
        self.queues.keys().map(String::as_str)
    }
}

impl FromIterator<(String, BuildQueueRef)> for InstanceTable {
    fn from_iter<I: IntoIterator<Item = (String, BuildQueueRef)>>(iter: I) -> Self {
        Self {
            queues: iter.into_iter().collect(),
        }
    }
}

impl From<HashMap<String, BuildQueueRef>> for InstanceTable {
    fn from(queues: HashMap<String, BuildQueueRef>) -> Self {
        Self { queues }
    }
}

impl QueueResolver for InstanceTable {
    fn resolve(&self, instance: &str) -> Option<BuildQueueRef> {
        self.queues.get(instance).cloned()
    }
}

/// Build queue that routes every call to the queue registered for its instance name.
///
/// Holds no per-call state: concurrent calls for different instances never wait on
/// each other, and a slow backend only slows down calls routed to it.
pub struct DemultiplexingBuildQueue<R = InstanceTable> {
    resolver: R,
    metrics: MetricsHandle,
}

impl<R: QueueResolver> DemultiplexingBuildQueue<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            metrics: noop_metrics(),
        }
    }

    /// Attach a metrics backend for rejected calls.
    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    fn route<T: RoutingKey>(
        &self,
        method: QueueMethod,
        request: &Request<T>,
    ) -> Result<BuildQueueRef, Status> {
        let instance = request.get_ref().instance_name();
        match self.resolver.resolve(instance) {
            Some(queue) => Ok(queue),
            None => {
                debug!(instance, %method, "no build queue for instance");
                self.metrics
                    .record_rejection(method.as_str(), RejectReason::UnknownInstance);
                Err(QueueError::UnknownInstance(instance.to_string()).into())
            }
        }
    }
}

#[async_trait]
impl<R: QueueResolver> BuildQueue for DemultiplexingBuildQueue<R> {
    #[instrument(level = "trace", skip_all, fields(instance = %request.get_ref().instance_name))]
    async fn get_capabilities(
        &self,
        request: Request<Envelope<GetCapabilitiesRequest>>,
    ) -> Result<Response<Envelope<ServerCapabilities>>, Status> {
        let queue = self.route(QueueMethod::GetCapabilities, &request)?;
        queue.get_capabilities(request).await
    }

    #[instrument(level = "trace", skip_all, fields(instance = %request.get_ref().instance_name))]
    async fn execute(
        &self,
        request: Request<Envelope<ExecuteRequest>>,
    ) -> Result<Response<OperationStream>, Status> {
        let queue = self.route(QueueMethod::Execute, &request)?;
        queue.execute(request).await
    }

    #[instrument(level = "trace", skip_all, fields(operation = %request.get_ref().name))]
    async fn wait_execution(
        &self,
        request: Request<Envelope<WaitExecutionRequest>>,
    ) -> Result<Response<OperationStream>, Status> {
        let operation = request.get_ref().name.as_str();
        if !operation.contains(OPERATIONS_SEGMENT) {
            debug!(operation, "operation name carries no instance, using the default instance");
        }
        let queue = self.route(QueueMethod::WaitExecution, &request)?;
        queue.wait_execution(request).await
    }
}
