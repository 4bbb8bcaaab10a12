use crate::metrics::backend::{CallOutcome, MetricsBackend, RejectReason};

/// No-op metrics backend that compiles to nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl MetricsBackend for NoOpMetrics {
    #[inline(always)]
    fn record_call_started(&self, _: &str, _: &str) {}

    #[inline(always)]
    fn record_call_completed(&self, _: &str, _: &str, _: CallOutcome, _: u64) {}

    #[inline(always)]
    fn record_operation_relayed(&self, _: &str, _: &str) {}

    #[inline(always)]
    fn record_rejection(&self, _: &str, _: RejectReason) {}
}
