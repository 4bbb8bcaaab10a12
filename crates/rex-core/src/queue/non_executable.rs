use async_trait::async_trait;
use rex_proto::{
    Envelope, SemVer,
    reapi::{
        ActionCacheUpdateCapabilities, CacheCapabilities, ExecuteRequest, ExecutionCapabilities,
        GetCapabilitiesRequest, PriorityCapabilities, ServerCapabilities, WaitExecutionRequest,
        digest_function, priority_capabilities::PriorityRange, symlink_absolute_path_strategy,
    },
};
use tonic::{Request, Response, Status};
use tracing::debug;

use crate::{
    error::QueueError,
    metrics::{MetricsHandle, RejectReason},
    queue::{BuildQueue, OperationStream, QueueMethod},
};

/// Largest batch a client may upload in one `BatchUpdateBlobs` call.
const MAX_BATCH_TOTAL_SIZE_BYTES: i64 = 1 << 20;

/// Build queue for instances that accept cache writes but have no executor.
///
/// Lets such instances answer `GetCapabilities` truthfully (execution disabled)
/// instead of failing with "unknown instance". Execution calls are rejected
/// without touching the network.
pub struct NonExecutableBuildQueue {
    metrics: MetricsHandle,
}

impl NonExecutableBuildQueue {
    pub fn new(metrics: MetricsHandle) -> Self {
        Self { metrics }
    }

    fn reject(&self, method: QueueMethod, instance: &str) -> Status {
        debug!(instance, %method, "rejecting execution on cache-only instance");
        self.metrics
            .record_rejection(method.as_str(), RejectReason::Unsupported);
        QueueError::ExecutionUnsupported(instance.to_string()).into()
    }
}

/// Capabilities reported for every cache-only instance.
pub(crate) fn cache_only_capabilities() -> ServerCapabilities {
    let v2 = SemVer {
        major: 2,
        ..Default::default()
    };

    ServerCapabilities {
        cache_capabilities: Some(CacheCapabilities {
            digest_functions: vec![digest_function::Value::Sha256 as i32],
            action_cache_update_capabilities: Some(ActionCacheUpdateCapabilities {
                update_enabled: true,
            }),
            cache_priority_capabilities: Some(PriorityCapabilities {
                priorities: vec![PriorityRange {
                    min_priority: 0,
                    max_priority: 0,
                }],
            }),
            max_batch_total_size_bytes: MAX_BATCH_TOTAL_SIZE_BYTES,
            symlink_absolute_path_strategy: symlink_absolute_path_strategy::Value::Allowed as i32,
        }),
        execution_capabilities: Some(ExecutionCapabilities {
            digest_function: digest_function::Value::Sha256 as i32,
            exec_enabled: false,
            ..Default::default()
        }),
        deprecated_api_version: None,
        low_api_version: Some(v2.clone()),
        high_api_version: Some(v2),
    }
}

#[async_trait]
impl BuildQueue for NonExecutableBuildQueue {
    async fn get_capabilities(
        &self,
        _request: Request<Envelope<GetCapabilitiesRequest>>,
    ) -> Result<Response<Envelope<ServerCapabilities>>, Status> {
        Ok(Response::new(Envelope::new(cache_only_capabilities())))
    }

    async fn execute(
        &self,
        request: Request<Envelope<ExecuteRequest>>,
    ) -> Result<Response<OperationStream>, Status> {
        Err(self.reject(QueueMethod::Execute, &request.get_ref().instance_name))
    }

    async fn wait_execution(
        &self,
        request: Request<Envelope<WaitExecutionRequest>>,
    ) -> Result<Response<OperationStream>, Status> {
        let instance = super::operation_instance_name(&request.get_ref().name);
        Err(self.reject(QueueMethod::WaitExecution, instance))
    }
}
