use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, ready},
};

use rex_core::{BuildQueue, OperationStream, ReceivedAt};
use rex_proto::{
    Envelope,
    reapi::{
        ExecuteRequest, GetCapabilitiesRequest, ServerCapabilities, WaitExecutionRequest,
        capabilities_server::{Capabilities, CapabilitiesServer},
        execution_server::{Execution, ExecutionServer},
    },
};
use tokio_stream::Stream;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tonic::{Request, Response, Status};

/// gRPC service implementation.
///
/// Wraps a [`BuildQueue`] and implements the generated `Capabilities` and `Execution`
/// traits on top of it. Calls and their results pass through untouched; each request is
/// stamped with [`ReceivedAt`] so forwarded deadlines account for time spent here.
pub struct BuildQueueService<Q: ?Sized = dyn BuildQueue> {
    queue: Arc<Q>,
    cutoff: CancellationToken,
}

impl<Q: ?Sized> Clone for BuildQueueService<Q> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            cutoff: self.cutoff.clone(),
        }
    }
}

impl<Q> BuildQueueService<Q>
where
    Q: BuildQueue + ?Sized,
{
    /// Create a new gRPC service backed by `queue`.
    pub fn new(queue: Arc<Q>) -> Self {
        Self {
            queue,
            cutoff: CancellationToken::new(),
        }
    }

    /// End every open operation stream with `Unavailable` once `cutoff` is cancelled.
    pub fn with_cutoff(mut self, cutoff: CancellationToken) -> Self {
        self.cutoff = cutoff;
        self
    }

    fn until_cutoff(&self, response: Response<OperationStream>) -> Response<OperationStream> {
        let cutoff = self.cutoff.clone();
        response.map(|updates| -> OperationStream { Box::pin(UntilCutoff::new(updates, cutoff)) })
    }

    /// `build.bazel.remote.execution.v2.Capabilities` server.
    pub fn capabilities_server(&self) -> CapabilitiesServer<Self> {
        CapabilitiesServer::new(self.clone())
    }

    /// `build.bazel.remote.execution.v2.Execution` server.
    pub fn execution_server(&self) -> ExecutionServer<Self> {
        ExecutionServer::new(self.clone())
    }
}

#[tonic::async_trait]
impl<Q> Capabilities for BuildQueueService<Q>
where
    Q: BuildQueue + ?Sized,
{
    async fn get_capabilities(
        &self,
        request: Request<Envelope<GetCapabilitiesRequest>>,
    ) -> Result<Response<Envelope<ServerCapabilities>>, Status> {
        self.queue.get_capabilities(received(request)).await
    }
}

#[tonic::async_trait]
impl<Q> Execution for BuildQueueService<Q>
where
    Q: BuildQueue + ?Sized,
{
    type ExecuteStream = OperationStream;
    type WaitExecutionStream = OperationStream;

    async fn execute(
        &self,
        request: Request<Envelope<ExecuteRequest>>,
    ) -> Result<Response<Self::ExecuteStream>, Status> {
        let response = self.queue.execute(received(request)).await?;
        Ok(self.until_cutoff(response))
    }

    async fn wait_execution(
        &self,
        request: Request<Envelope<WaitExecutionRequest>>,
    ) -> Result<Response<Self::WaitExecutionStream>, Status> {
        let response = self.queue.wait_execution(received(request)).await?;
        Ok(self.until_cutoff(response))
    }
}

fn received<T>(mut request: Request<T>) -> Request<T> {
    request.extensions_mut().insert(ReceivedAt::now());
    request
}

/// Operation stream that is cut short when the server stops waiting for in-flight calls.
///
/// The caller gets one `Unavailable` status, so it can reattach elsewhere with
/// `WaitExecution`; the backend stream is dropped right away.
struct UntilCutoff {
    updates: Option<OperationStream>,
    cutoff: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl UntilCutoff {
    fn new(updates: OperationStream, cutoff: CancellationToken) -> Self {
        Self {
            updates: Some(updates),
            cutoff: Box::pin(cutoff.cancelled_owned()),
        }
    }
}

impl Stream for UntilCutoff {
    type Item = <OperationStream as Stream>::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let Some(updates) = this.updates.as_mut() else {
            return Poll::Ready(None);
        };

        if this.cutoff.as_mut().poll(cx).is_ready() {
            this.updates = None;
            return Poll::Ready(Some(Err(Status::unavailable("frontend is shutting down"))));
        }

        let next = ready!(updates.as_mut().poll_next(cx));
        if next.is_none() {
            this.updates = None;
        }
        Poll::Ready(next)
    }
}

#[cfg(test)]
mod tests {
    use tokio_stream::{StreamExt, iter};

    use super::*;
    use rex_proto::Operation;

    fn op(name: &str) -> Envelope<Operation> {
        Envelope::new(Operation {
            name: name.to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn updates_pass_until_cutoff() {
        let cutoff = CancellationToken::new();
        let updates: OperationStream = Box::pin(iter(vec![Ok(op("m1")), Ok(op("m2"))]));
        let mut stream = UntilCutoff::new(updates, cutoff.clone());

        assert_eq!(stream.next().await.unwrap().unwrap().name, "m1");
        cutoff.cancel();

        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unavailable);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn stalled_stream_is_cut_off() {
        let cutoff = CancellationToken::new();
        let updates: OperationStream = Box::pin(tokio_stream::pending());
        let mut stream = UntilCutoff::new(updates, cutoff.clone());

        cutoff.cancel();
        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unavailable);
        assert!(stream.updates.is_none());
    }

    #[tokio::test]
    async fn finished_stream_stays_finished() {
        let updates: OperationStream = Box::pin(iter(Vec::new()));
        let mut stream = UntilCutoff::new(updates, CancellationToken::new());

        assert!(stream.next().await.is_none());
        assert!(stream.next().await.is_none());
    }
}
