//! End-to-end forwarding through a real frontend server to an in-process scheduler.
use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use rex_api::{ApiError, CapabilitiesServer, ExecutionServer, FrontendServer};
use rex_core::{InstancePlan, noop_metrics};
use rex_model::SchedulerEntry;
use rex_proto::{
    Envelope, Operation,
    reapi::{
        Digest, ExecuteRequest, ExecutionCapabilities, GetCapabilitiesRequest, ServerCapabilities,
        WaitExecutionRequest,
        capabilities_client::CapabilitiesClient,
        capabilities_server::Capabilities,
        execution_client::ExecutionClient,
        execution_server::Execution,
    },
};
use tokio::{net::TcpListener, sync::mpsc, task::JoinHandle, time::timeout};
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tokio_util::sync::CancellationToken;
use tonic::{Code, Request, Response, Status, transport::Server};

const WAIT: Duration = Duration::from_secs(5);

/// `ServerCapabilities { cache_capabilities { supported_compressors: [ZSTD],
/// max_batch_total_size_bytes: 4096 } }`. The compressor list (tag 6) has no field in
/// `rex_proto`.
const CAPABILITIES_WITH_COMPRESSORS: &[u8] = &[0x0a, 0x05, 0x30, 0x01, 0x20, 0x80, 0x20];

type Updates = mpsc::Sender<Result<Envelope<Operation>, Status>>;
type UpdateStream = ReceiverStream<Result<Envelope<Operation>, Status>>;

/// One streaming call received by the fake scheduler.
struct SchedulerCall {
    method: &'static str,
    /// `instance_name` for Execute, operation name for WaitExecution.
    key: String,
    action_hash: Option<String>,
    deadline: Option<String>,
    /// Request bytes as they came off the wire.
    encoded: Option<Vec<u8>>,
    updates: Updates,
}

#[derive(Clone)]
struct FakeScheduler {
    calls: mpsc::UnboundedSender<SchedulerCall>,
    fail_capabilities: Arc<AtomicBool>,
}

impl FakeScheduler {
    fn accept<T>(
        &self,
        method: &'static str,
        key: String,
        action_hash: Option<String>,
        request: &Request<Envelope<T>>,
    ) -> Result<Response<UpdateStream>, Status> {
        let (tx, rx) = mpsc::channel(4);
        let deadline = request
            .metadata()
            .get("grpc-timeout")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        self.calls
            .send(SchedulerCall {
                method,
                key,
                action_hash,
                deadline,
                encoded: request.get_ref().encoded().map(<[u8]>::to_vec),
                updates: tx,
            })
            .map_err(|_| Status::internal("test dropped its call receiver"))?;
        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

#[tonic::async_trait]
impl Capabilities for FakeScheduler {
    async fn get_capabilities(
        &self,
        request: Request<Envelope<GetCapabilitiesRequest>>,
    ) -> Result<Response<Envelope<ServerCapabilities>>, Status> {
        if self.fail_capabilities.load(Ordering::SeqCst) {
            return Err(Status::permission_denied("capabilities are private"));
        }
        match request.get_ref().instance_name.as_str() {
            "debian8" => Ok(Response::new(Envelope::new(ServerCapabilities {
                execution_capabilities: Some(ExecutionCapabilities {
                    exec_enabled: true,
                    supported_node_properties: vec!["OSFamily".into()],
                    ..Default::default()
                }),
                ..Default::default()
            }))),
            // Answer with bytes carrying a field the frontend does not model.
            "compressing" => Envelope::decode(CAPABILITIES_WITH_COMPRESSORS)
                .map(Response::new)
                .map_err(|e| Status::internal(e.to_string())),
            other => Err(Status::not_found(format!("no instance {other}"))),
        }
    }
}

#[tonic::async_trait]
impl Execution for FakeScheduler {
    type ExecuteStream = UpdateStream;
    type WaitExecutionStream = UpdateStream;

    async fn execute(
        &self,
        request: Request<Envelope<ExecuteRequest>>,
    ) -> Result<Response<Self::ExecuteStream>, Status> {
        let key = request.get_ref().instance_name.clone();
        let hash = request.get_ref().action_digest.as_ref().map(|d| d.hash.clone());
        self.accept("Execute", key, hash, &request)
    }

    async fn wait_execution(
        &self,
        request: Request<Envelope<WaitExecutionRequest>>,
    ) -> Result<Response<Self::WaitExecutionStream>, Status> {
        let key = request.get_ref().name.clone();
        self.accept("WaitExecution", key, None, &request)
    }
}

/// Frontend serving `debian8` and `compressing` (forwarded to the fake scheduler) and
/// `cache` (cache-only).
struct Harness {
    frontend: SocketAddr,
    calls: mpsc::UnboundedReceiver<SchedulerCall>,
    fail_capabilities: Arc<AtomicBool>,
    shutdown: CancellationToken,
    scheduler_shutdown: CancellationToken,
    server: Option<JoinHandle<Result<(), ApiError>>>,
}

impl Harness {
    async fn start() -> Self {
        Self::start_with_drain_grace(rex_api::DEFAULT_DRAIN_GRACE).await
    }

    async fn start_with_drain_grace(grace: Duration) -> Self {
        let shutdown = CancellationToken::new();
        let scheduler_shutdown = CancellationToken::new();
        let (calls_tx, calls) = mpsc::unbounded_channel();
        let fail_capabilities = Arc::new(AtomicBool::new(false));
        let scheduler = FakeScheduler {
            calls: calls_tx,
            fail_capabilities: fail_capabilities.clone(),
        };

        let backend_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend = backend_listener.local_addr().unwrap();
        let token = scheduler_shutdown.clone();
        tokio::spawn(async move {
            Server::builder()
                .add_service(CapabilitiesServer::new(scheduler.clone()))
                .add_service(ExecutionServer::new(scheduler))
                .serve_with_incoming_shutdown(TcpListenerStream::new(backend_listener), async move {
                    token.cancelled().await
                })
                .await
        });

        let plan = InstancePlan::new(
            vec![
                SchedulerEntry::new("debian8", backend.to_string()),
                SchedulerEntry::new("compressing", backend.to_string()),
            ],
            vec!["cache".to_string()],
        )
        .unwrap();
        let composition = plan.connect(noop_metrics()).await.expect("scheduler reachable");

        let frontend_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let frontend = frontend_listener.local_addr().unwrap();
        let server = FrontendServer::new(Arc::new(composition.build_queue)).with_drain_grace(grace);
        let server = tokio::spawn(server.serve_listener(frontend_listener, shutdown.clone()));

        Self {
            frontend,
            calls,
            fail_capabilities,
            shutdown,
            scheduler_shutdown,
            server: Some(server),
        }
    }

    async fn execution(&self) -> ExecutionClient<tonic::transport::Channel> {
        ExecutionClient::connect(format!("http://{}", self.frontend))
            .await
            .unwrap()
    }

    async fn capabilities(&self) -> CapabilitiesClient<tonic::transport::Channel> {
        CapabilitiesClient::connect(format!("http://{}", self.frontend))
            .await
            .unwrap()
    }

    async fn next_call(&mut self) -> SchedulerCall {
        timeout(WAIT, self.calls.recv())
            .await
            .expect("scheduler received a call")
            .expect("scheduler is running")
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.scheduler_shutdown.cancel();
    }
}

fn op(name: &str, done: bool) -> Envelope<Operation> {
    Envelope::new(Operation {
        name: name.to_string(),
        done,
        ..Default::default()
    })
}

fn execute_request(instance: &str) -> Envelope<ExecuteRequest> {
    Envelope::new(ExecuteRequest {
        instance_name: instance.to_string(),
        action_digest: Some(Digest {
            hash: "8b1a9953c4611296a827abf8c47804d7".into(),
            size_bytes: 142,
        }),
        ..Default::default()
    })
}

fn capabilities_request(instance: &str) -> Envelope<GetCapabilitiesRequest> {
    Envelope::new(GetCapabilitiesRequest {
        instance_name: instance.into(),
    })
}

#[tokio::test]
async fn execute_relays_updates_in_order() {
    let mut h = Harness::start().await;
    let mut client = h.execution().await;

    let mut stream = client
        .execute(execute_request("debian8"))
        .await
        .expect("execute accepted")
        .into_inner();

    let call = h.next_call().await;
    assert_eq!(call.method, "Execute");
    assert_eq!(call.key, "debian8");
    assert_eq!(call.action_hash.as_deref(), Some("8b1a9953c4611296a827abf8c47804d7"));

    for (name, done) in [("m1", false), ("m2", false), ("m3", true)] {
        call.updates.send(Ok(op(name, done))).await.unwrap();
    }
    drop(call.updates);

    let mut names = Vec::new();
    while let Some(update) = timeout(WAIT, stream.message()).await.unwrap().expect("clean stream") {
        names.push(update.into_inner().name);
    }
    assert_eq!(names, ["m1", "m2", "m3"]);
}

#[tokio::test]
async fn backend_failure_ends_the_stream_after_relayed_updates() {
    let mut h = Harness::start().await;
    let mut client = h.execution().await;

    let mut stream = client
        .execute(execute_request("debian8"))
        .await
        .unwrap()
        .into_inner();
    let call = h.next_call().await;

    call.updates.send(Ok(op("m1", false))).await.unwrap();
    call.updates
        .send(Err(Status::resource_exhausted("no workers available")))
        .await
        .unwrap();

    let first = timeout(WAIT, stream.message()).await.unwrap().unwrap();
    assert_eq!(first.map(|o| o.into_inner().name).as_deref(), Some("m1"));

    let err = timeout(WAIT, stream.message()).await.unwrap().unwrap_err();
    assert_eq!(err.code(), Code::ResourceExhausted);
    assert!(
        err.message()
            .contains("forwarding Execute for instance \"debian8\""),
        "{}",
        err.message()
    );
    assert!(err.message().contains("no workers available"));
}

#[tokio::test]
async fn caller_disconnect_cancels_the_backend_call() {
    let mut h = Harness::start().await;
    let mut client = h.execution().await;

    let mut stream = client
        .execute(execute_request("debian8"))
        .await
        .unwrap()
        .into_inner();
    let call = h.next_call().await;

    call.updates.send(Ok(op("m1", false))).await.unwrap();
    timeout(WAIT, stream.message()).await.unwrap().unwrap();
    drop(stream);

    timeout(WAIT, call.updates.closed())
        .await
        .expect("backend stream released after the caller went away");
}

#[tokio::test]
async fn wait_execution_routes_on_operation_name() {
    let mut h = Harness::start().await;
    let mut client = h.execution().await;

    let mut stream = client
        .wait_execution(Envelope::new(WaitExecutionRequest {
            name: "debian8/operations/42".into(),
        }))
        .await
        .unwrap()
        .into_inner();

    let call = h.next_call().await;
    assert_eq!(call.method, "WaitExecution");
    assert_eq!(call.key, "debian8/operations/42");

    call.updates
        .send(Ok(op("debian8/operations/42", true)))
        .await
        .unwrap();
    drop(call.updates);

    let update = timeout(WAIT, stream.message()).await.unwrap().unwrap().unwrap();
    assert!(update.done);
    assert!(timeout(WAIT, stream.message()).await.unwrap().unwrap().is_none());
}

#[tokio::test]
async fn caller_deadline_reaches_the_backend() {
    let mut h = Harness::start().await;
    let mut client = h.execution().await;

    let mut request = Request::new(execute_request("debian8"));
    request.set_timeout(Duration::from_secs(30));
    let _stream = client.execute(request).await.unwrap();

    let call = h.next_call().await;
    assert!(call.deadline.is_some(), "grpc-timeout was not forwarded");
}

#[tokio::test]
async fn capabilities_are_forwarded_with_errors_intact() {
    let h = Harness::start().await;
    let mut client = h.capabilities().await;

    let caps = client
        .get_capabilities(capabilities_request("debian8"))
        .await
        .unwrap()
        .into_inner()
        .into_inner();
    let exec = caps.execution_capabilities.unwrap();
    assert!(exec.exec_enabled);
    assert_eq!(exec.supported_node_properties, ["OSFamily"]);

    h.fail_capabilities.store(true, Ordering::SeqCst);
    let err = client
        .get_capabilities(capabilities_request("debian8"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::PermissionDenied);
    assert!(err.message().contains("capabilities are private"));
}

#[tokio::test]
async fn unmodelled_capability_fields_reach_the_caller() {
    let h = Harness::start().await;
    let mut client = h.capabilities().await;

    let caps = client
        .get_capabilities(capabilities_request("compressing"))
        .await
        .expect("capabilities relayed")
        .into_inner();

    assert_eq!(caps.encoded(), Some(CAPABILITIES_WITH_COMPRESSORS));
    let cache = caps.cache_capabilities.as_ref().expect("cache capabilities");
    assert_eq!(cache.max_batch_total_size_bytes, 4096);
}

#[tokio::test]
async fn unmodelled_request_fields_reach_the_scheduler() {
    let mut h = Harness::start().await;
    let mut client = h.execution().await;

    // Field 15 (varint 1) is unknown to `ExecuteRequest` here.
    let mut sent = execute_request("debian8").encode_to_vec();
    sent.extend_from_slice(&[0x78, 0x01]);
    let request = Envelope::<ExecuteRequest>::decode(sent.clone()).expect("decode request");

    let _stream = client.execute(request).await.expect("execute accepted");

    let call = h.next_call().await;
    assert_eq!(call.key, "debian8");
    assert_eq!(call.encoded.as_deref(), Some(sent.as_slice()));
}

#[tokio::test]
async fn shutdown_cuts_off_streams_that_never_end() {
    let mut h = Harness::start_with_drain_grace(Duration::from_millis(200)).await;
    let mut client = h.execution().await;

    let mut stream = client
        .execute(execute_request("debian8"))
        .await
        .unwrap()
        .into_inner();
    let call = h.next_call().await;
    call.updates.send(Ok(op("m1", false))).await.unwrap();
    timeout(WAIT, stream.message()).await.unwrap().unwrap();

    // The scheduler keeps `call.updates` open, so the operation never completes.
    h.shutdown.cancel();

    let err = timeout(WAIT, stream.message())
        .await
        .expect("stream cut off after the grace period")
        .unwrap_err();
    assert_eq!(err.code(), Code::Unavailable);

    let server = h.server.take().expect("server task");
    timeout(WAIT, server)
        .await
        .expect("server stopped after the grace period")
        .expect("server task")
        .expect("clean shutdown");

    timeout(WAIT, call.updates.closed())
        .await
        .expect("backend stream released on shutdown");
}

#[tokio::test]
async fn cache_only_and_unknown_instances_are_answered_locally() {
    let mut h = Harness::start().await;
    let mut caps_client = h.capabilities().await;
    let mut exec_client = h.execution().await;

    let caps = caps_client
        .get_capabilities(capabilities_request("cache"))
        .await
        .unwrap()
        .into_inner()
        .into_inner();
    assert!(!caps.execution_capabilities.unwrap().exec_enabled);
    assert!(caps.cache_capabilities.is_some());

    let err = exec_client
        .execute(execute_request("cache"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Unimplemented);

    let err = exec_client
        .execute(execute_request("debian9"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    let err = exec_client
        .wait_execution(Envelope::new(WaitExecutionRequest {
            name: "debian9/operations/1".into(),
        }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    assert!(h.calls.try_recv().is_err(), "no call may reach the scheduler");
}
