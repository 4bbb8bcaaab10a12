use thiserror::Error;
use tonic::Status;

use crate::queue::QueueMethod;

/// Errors raised while routing or forwarding a call.
///
/// Every variant maps onto a gRPC status, see `From<QueueError> for Status`.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("unknown instance name {0:?}")]
    UnknownInstance(String),

    #[error("no executor configured for instance {0:?}")]
    ExecutionUnsupported(String),

    #[error("forwarding {method} for instance {instance:?}: {}", .source.message())]
    Upstream {
        method: QueueMethod,
        instance: String,
        source: Status,
    },
}

impl QueueError {
    /// Wrap a status returned by a backend scheduler.
    pub fn upstream(method: QueueMethod, instance: impl Into<String>, source: Status) -> Self {
        QueueError::Upstream {
            method,
            instance: instance.into(),
            source,
        }
    }
}

impl From<QueueError> for Status {
    fn from(err: QueueError) -> Self {
        match &err {
            QueueError::UnknownInstance(_) => Status::invalid_argument(err.to_string()),
            QueueError::ExecutionUnsupported(_) => Status::unimplemented(err.to_string()),
            // The backend's status code is preserved.
            QueueError::Upstream { source, .. } => Status::new(source.code(), err.to_string()),
        }
    }
}

/// Startup errors: the frontend must not serve with an inconsistent routing table.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("instance {0:?} has more than one scheduler configured")]
    DuplicateScheduler(String),

    #[error("instance {0:?} is listed more than once as cache-only")]
    DuplicateCacheOnly(String),

    #[error("instance {0:?} is configured both with a scheduler and as cache-only")]
    ConflictingInstance(String),

    #[error("invalid scheduler address {address:?} for instance {instance:?}: {source}")]
    InvalidAddress {
        instance: String,
        address: String,
        source: tonic::transport::Error,
    },

    #[error("failed to connect to scheduler {address:?} for instance {instance:?}: {source}")]
    Connect {
        instance: String,
        address: String,
        source: tonic::transport::Error,
    },
}
