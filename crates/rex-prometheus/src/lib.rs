//! Prometheus backend for the build-queue metrics of the remote execution frontend.
//!
//! [`PrometheusMetrics`] implements [`rex_core::MetricsBackend`]. Serving `/metrics` is
//! left to the binary, which encodes [`PrometheusMetrics::gather`] with a
//! [`TextEncoder`].
//!
//! ```rust
//! use std::sync::Arc;
//! use rex_core::{InstancePlan, MetricsHandle};
//! use rex_prometheus::{Encoder, PrometheusMetrics, TextEncoder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let handle: MetricsHandle = Arc::new(metrics.clone());
//! let _plan = InstancePlan::new(vec![], vec!["cache".into()])?;
//! // plan.connect(handle).await? inside the runtime
//!
//! let mut body = Vec::new();
//! TextEncoder::new().encode(&metrics.gather(), &mut body)?;
//! # drop(handle);
//! # Ok(())
//! # }
//! ```
mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
