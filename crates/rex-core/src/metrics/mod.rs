//! Metrics collection abstraction for the build-queue layer.
//!
//! Backends (prometheus, statsd, etc) implement [`MetricsBackend`] and are handed to the
//! queues when the instance table is composed.
mod backend;
pub use backend::{CallOutcome, MetricsBackend, MetricsHandle, RejectReason};

mod noop;
pub use noop::NoOpMetrics;

use std::sync::Arc;

/// Create a no-op metrics handle.
#[inline]
pub fn noop_metrics() -> MetricsHandle {
    Arc::new(NoOpMetrics)
}
