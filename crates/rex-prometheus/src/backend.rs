use std::sync::Arc;

use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry, proto::MetricFamily};

use rex_core::{CallOutcome, MetricsBackend, RejectReason};

const NAMESPACE: &str = "rex";

/// Prometheus metrics backend for the build queues.
///
/// ## Metrics
/// - `rex_calls_started_total{instance, method}` - Counter
/// - `rex_calls_completed_total{instance, method, outcome}` - Counter
/// - `rex_call_duration_seconds{instance, method}` - Histogram, whole stream for streaming calls
/// - `rex_operations_relayed_total{instance, method}` - Counter
/// - `rex_rejected_calls_total{method, reason}` - Counter
///
/// `instance` only carries configured instance names; unknown names are counted under
/// `rex_rejected_calls_total` without the name.
#[derive(Clone)]
pub struct PrometheusMetrics {
    calls_started: CounterVec,
    calls_completed: CounterVec,
    call_duration: HistogramVec,
    operations_relayed: CounterVec,
    rejected_calls: CounterVec,
    registry: Arc<Registry>,
}

impl PrometheusMetrics {
    /// Register the build-queue metrics on `registry`.
    pub fn new_with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let calls_started = CounterVec::new(
            Opts::new("calls_started_total", "Calls forwarded to a scheduler").namespace(NAMESPACE),
            &["instance", "method"],
        )?;
        registry.register(Box::new(calls_started.clone()))?;

        let calls_completed = CounterVec::new(
            Opts::new("calls_completed_total", "Forwarded calls that ended, by outcome")
                .namespace(NAMESPACE),
            &["instance", "method", "outcome"],
        )?;
        registry.register(Box::new(calls_completed.clone()))?;

        // Execute streams last as long as the action runs.
        let call_duration = HistogramVec::new(
            HistogramOpts::new("call_duration_seconds", "Duration of forwarded calls")
                .namespace(NAMESPACE)
                .buckets(vec![
                    0.005, 0.025, 0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 300.0, 900.0, 3600.0,
                ]),
            &["instance", "method"],
        )?;
        registry.register(Box::new(call_duration.clone()))?;

        let operations_relayed = CounterVec::new(
            Opts::new("operations_relayed_total", "Operation updates relayed to callers")
                .namespace(NAMESPACE),
            &["instance", "method"],
        )?;
        registry.register(Box::new(operations_relayed.clone()))?;

        let rejected_calls = CounterVec::new(
            Opts::new("rejected_calls_total", "Calls answered without contacting a scheduler")
                .namespace(NAMESPACE),
            &["method", "reason"],
        )?;
        registry.register(Box::new(rejected_calls.clone()))?;

        Ok(Self {
            calls_started,
            calls_completed,
            call_duration,
            operations_relayed,
            rejected_calls,
            registry,
        })
    }

    /// Create the backend on a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::new_with_registry(Arc::new(Registry::new()))
    }

    /// Gather all metric families for exposition.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Underlying registry, for registering process or service metrics next to these.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_call_started(&self, instance: &str, method: &str) {
        self.calls_started.with_label_values(&[instance, method]).inc();
    }

    fn record_call_completed(&self, instance: &str, method: &str, outcome: CallOutcome, duration_ms: u64) {
        self.calls_completed
            .with_label_values(&[instance, method, outcome.as_label()])
            .inc();
        self.call_duration
            .with_label_values(&[instance, method])
            .observe(duration_ms as f64 / 1000.0);
    }

    fn record_operation_relayed(&self, instance: &str, method: &str) {
        self.operations_relayed
            .with_label_values(&[instance, method])
            .inc();
    }

    fn record_rejection(&self, method: &str, reason: RejectReason) {
        self.rejected_calls
            .with_label_values(&[method, reason.as_label()])
            .inc();
    }
}
