//! Relay of build-queue calls to one backend scheduler over gRPC.
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, ready},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use futures::Stream;
use rex_model::SchedulerEntry;
use rex_proto::{
    Envelope, Operation,
    reapi::{
        ExecuteRequest, GetCapabilitiesRequest, ServerCapabilities, WaitExecutionRequest,
        capabilities_client::CapabilitiesClient, execution_client::ExecutionClient,
    },
};
use tonic::{
    Request, Response, Status, Streaming,
    transport::{Channel, Endpoint},
};
use tracing::{debug, trace, warn};

use crate::{
    error::{ComposeError, QueueError},
    metrics::{CallOutcome, MetricsHandle},
    queue::{BuildQueue, OperationStream, QueueMethod},
};

/// Metadata key carrying the caller's deadline.
const GRPC_TIMEOUT: &str = "grpc-timeout";

/// Upper bound for establishing the initial connection to a scheduler.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build queue that forwards every call to a single backend scheduler.
///
/// Requests and responses are relayed in the encoding they arrived in. The only
/// metadata sent along is the caller's deadline, reduced by the time the call already
/// spent in the frontend.
/// Operation updates are relayed one by one in backend order; a backend error is
/// passed on once (with context added) and ends the stream. When the caller drops
/// its stream, the backend stream is dropped with it and the backend call is
/// cancelled.
#[derive(Clone)]
pub struct ForwardingBuildQueue {
    instance: Arc<str>,
    capabilities: CapabilitiesClient<Channel>,
    execution: ExecutionClient<Channel>,
    metrics: MetricsHandle,
}

impl ForwardingBuildQueue {
    /// Forward calls for `instance` over an existing channel.
    pub fn new(instance: impl Into<Arc<str>>, channel: Channel, metrics: MetricsHandle) -> Self {
        Self {
            instance: instance.into(),
            capabilities: CapabilitiesClient::new(channel.clone()),
            execution: ExecutionClient::new(channel),
            metrics,
        }
    }

    /// Dial the scheduler named by `entry` and wait until the connection is up.
    pub async fn connect(entry: &SchedulerEntry, metrics: MetricsHandle) -> Result<Self, ComposeError> {
        let endpoint = Endpoint::from_shared(entry.endpoint_uri())
            .map_err(|source| ComposeError::InvalidAddress {
                instance: entry.instance.clone(),
                address: entry.address.clone(),
                source,
            })?
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_nodelay(true);

        let channel = endpoint
            .connect()
            .await
            .map_err(|source| ComposeError::Connect {
                instance: entry.instance.clone(),
                address: entry.address.clone(),
                source,
            })?;

        debug!(instance = %entry.instance, address = %entry.address, "connected to scheduler");
        Ok(Self::new(entry.instance.as_str(), channel, metrics))
    }

    /// Instance name this queue forwards for.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    fn track(&self, method: QueueMethod) -> CallTracker {
        CallTracker::start(self.instance.clone(), method, self.metrics.clone())
    }

    fn fail(&self, tracker: CallTracker, status: Status) -> Status {
        let method = tracker.method;
        warn!(instance = %self.instance, %method, code = ?status.code(), error = %status.message(), "scheduler call failed");
        tracker.finish(CallOutcome::Failure);
        QueueError::upstream(method, &*self.instance, status).into()
    }

    fn relay(
        &self,
        tracker: CallTracker,
        response: Result<Response<Streaming<Envelope<Operation>>>, Status>,
    ) -> Result<Response<OperationStream>, Status> {
        match response {
            Ok(response) => {
                let upstream: OperationStream = Box::pin(response.into_inner());
                Ok(Response::new(Box::pin(OperationRelay::new(upstream, tracker))))
            }
            Err(status) => Err(self.fail(tracker, status)),
        }
    }
}

#[async_trait]
impl BuildQueue for ForwardingBuildQueue {
    async fn get_capabilities(
        &self,
        request: Request<Envelope<GetCapabilitiesRequest>>,
    ) -> Result<Response<Envelope<ServerCapabilities>>, Status> {
        debug!(instance = %self.instance, "forwarding GetCapabilities");
        let tracker = self.track(QueueMethod::GetCapabilities);

        match self.capabilities.clone().get_capabilities(outbound(request)).await {
            Ok(response) => {
                tracker.finish(CallOutcome::Success);
                Ok(Response::new(response.into_inner()))
            }
            Err(status) => Err(self.fail(tracker, status)),
        }
    }

    async fn execute(
        &self,
        request: Request<Envelope<ExecuteRequest>>,
    ) -> Result<Response<OperationStream>, Status> {
        debug!(
            instance = %self.instance,
            action = ?request.get_ref().action_digest.as_ref().map(|d| &d.hash),
            "forwarding Execute"
        );
        let tracker = self.track(QueueMethod::Execute);
        let response = self.execution.clone().execute(outbound(request)).await;
        self.relay(tracker, response)
    }

    async fn wait_execution(
        &self,
        request: Request<Envelope<WaitExecutionRequest>>,
    ) -> Result<Response<OperationStream>, Status> {
        debug!(instance = %self.instance, operation = %request.get_ref().name, "forwarding WaitExecution");
        let tracker = self.track(QueueMethod::WaitExecution);
        let response = self.execution.clone().wait_execution(outbound(request)).await;
        self.relay(tracker, response)
    }
}

/// When a call entered the frontend.
///
/// The gRPC layer stores this in the request extensions; forwarded deadlines are
/// shortened by the time elapsed since.
#[derive(Debug, Clone, Copy)]
pub struct ReceivedAt(pub Instant);

impl ReceivedAt {
    pub fn now() -> Self {
        Self(Instant::now())
    }
}

/// Fresh request for the backend carrying the caller's message and deadline.
///
/// Other inbound metadata (content-type, user-agent, auth) belongs to the caller's
/// connection and is not forwarded. Without a [`ReceivedAt`] stamp, or when the
/// caller's `grpc-timeout` cannot be parsed, the header is copied as is.
pub(crate) fn outbound<T>(request: Request<T>) -> Request<T> {
    let deadline = request.metadata().get(GRPC_TIMEOUT).cloned();
    let received = request.extensions().get::<ReceivedAt>().copied();
    let mut out = Request::new(request.into_inner());
    let Some(deadline) = deadline else {
        return out;
    };

    let timeout = deadline.to_str().ok().and_then(parse_grpc_timeout);
    match (timeout, received) {
        (Some(timeout), Some(ReceivedAt(at))) => out.set_timeout(timeout.saturating_sub(at.elapsed())),
        _ => {
            out.metadata_mut().insert(GRPC_TIMEOUT, deadline);
        }
    }
    out
}

/// Parse a `grpc-timeout` value: at most 8 digits followed by one of `HMSmun`.
fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if !value.is_ascii() || value.len() < 2 {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    let timeout = match unit {
        "H" => Duration::from_secs(amount * 3600),
        "M" => Duration::from_secs(amount * 60),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(timeout)
}

/// Metrics for one forwarded call.
///
/// Dropping an unfinished tracker records the call as canceled.
struct CallTracker {
    instance: Arc<str>,
    method: QueueMethod,
    metrics: MetricsHandle,
    started: Instant,
    finished: bool,
}

impl CallTracker {
    fn start(instance: Arc<str>, method: QueueMethod, metrics: MetricsHandle) -> Self {
        metrics.record_call_started(&instance, method.as_str());
        Self {
            instance,
            method,
            metrics,
            started: Instant::now(),
            finished: false,
        }
    }

    fn relayed(&self) {
        self.metrics
            .record_operation_relayed(&self.instance, self.method.as_str());
    }

    fn finish(mut self, outcome: CallOutcome) {
        self.record(outcome);
    }

    fn record(&mut self, outcome: CallOutcome) {
        if self.finished {
            return;
        }
        self.finished = true;
        let elapsed = self.started.elapsed().as_millis() as u64;
        self.metrics
            .record_call_completed(&self.instance, self.method.as_str(), outcome, elapsed);
    }
}

impl Drop for CallTracker {
    fn drop(&mut self) {
        self.record(CallOutcome::Canceled);
    }
}

/// Caller-facing side of a backend operation stream.
///
/// Pull based: the backend stream is only polled when the caller asks for the next
/// update, so a slow caller applies backpressure to the backend.
struct OperationRelay {
    upstream: OperationStream,
    /// `None` once the stream has ended.
    tracker: Option<CallTracker>,
}

impl OperationRelay {
    fn new(upstream: OperationStream, tracker: CallTracker) -> Self {
        Self {
            upstream,
            tracker: Some(tracker),
        }
    }
}

impl Stream for OperationRelay {
    type Item = Result<Envelope<Operation>, Status>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let Some(tracker) = this.tracker.as_ref() else {
            return Poll::Ready(None);
        };

        match ready!(this.upstream.as_mut().poll_next(cx)) {
            Some(Ok(operation)) => {
                trace!(
                    instance = %tracker.instance,
                    operation = %operation.name,
                    done = operation.done,
                    "relaying operation update"
                );
                tracker.relayed();
                Poll::Ready(Some(Ok(operation)))
            }
            Some(Err(status)) => {
                let method = tracker.method;
                let instance = tracker.instance.clone();
                warn!(%instance, %method, code = ?status.code(), error = %status.message(), "operation stream failed");
                if let Some(tracker) = this.tracker.take() {
                    tracker.finish(CallOutcome::Failure);
                }
                Poll::Ready(Some(Err(QueueError::upstream(method, &*instance, status).into())))
            }
            None => {
                debug!(instance = %tracker.instance, method = %tracker.method, "operation stream completed");
                if let Some(tracker) = this.tracker.take() {
                    tracker.finish(CallOutcome::Success);
                }
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for OperationRelay {
    fn drop(&mut self) {
        if let Some(tracker) = &self.tracker {
            debug!(
                instance = %tracker.instance,
                method = %tracker.method,
                "caller went away, cancelling scheduler call"
            );
        }
    }
}
