use std::sync::Arc;

/// How a forwarded call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// Backend answered, or closed its operation stream cleanly.
    Success,
    /// Backend returned an error.
    Failure,
    /// Caller went away before the backend finished.
    Canceled,
}

impl CallOutcome {
    /// Return label value for metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::Failure => "failure",
            CallOutcome::Canceled => "canceled",
        }
    }
}

/// Why a call was answered locally instead of being forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No queue is registered for the instance name.
    UnknownInstance,
    /// The instance is cache-only.
    Unsupported,
}

impl RejectReason {
    /// Return label value for metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            RejectReason::UnknownInstance => "unknown_instance",
            RejectReason::Unsupported => "unsupported",
        }
    }
}

/// Build-queue metrics collection interface.
///
/// Label values are bounded: `instance` only ever carries configured instance names,
/// `method` is one of the three build-queue methods.
pub trait MetricsBackend: Send + Sync + 'static {
    /// Record a call handed to a backend scheduler.
    fn record_call_started(&self, instance: &str, method: &str);
    /// Record the end of a forwarded call.
    ///
    /// For streaming calls this fires when the operation stream ends, fails or is
    /// abandoned by the caller, so `duration_ms` covers the whole stream.
    fn record_call_completed(&self, instance: &str, method: &str, outcome: CallOutcome, duration_ms: u64);
    /// Record one operation update relayed to a caller.
    fn record_operation_relayed(&self, instance: &str, method: &str);
    /// Record a call rejected without contacting any backend.
    fn record_rejection(&self, method: &str, reason: RejectReason);
}

/// Shared handle to metrics backend.
pub type MetricsHandle = Arc<dyn MetricsBackend>;
