use std::{net::SocketAddr, path::Path, time::Duration};

use anyhow::Context;
use rex_model::{InstanceName, SchedulerEntry, TlsConfig};
use rex_observe::LogConfig;
use serde::Deserialize;

/// Location used when no path is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "/config/frontend.json";

/// Frontend configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct FrontendConfig {
    /// Address the build-queue gRPC services listen on.
    pub grpc_listen_address: SocketAddr,
    /// Address serving `/metrics` and `/-/healthy`.
    pub http_listen_address: SocketAddr,
    /// Executable instances and the scheduler each one is forwarded to.
    ///
    /// Schedulers must name operations `<instance>/operations/<id>`: `WaitExecution`
    /// is routed on that prefix alone.
    pub schedulers: Vec<SchedulerEntry>,
    /// Instances served without an executor.
    pub cache_only_instances: Vec<InstanceName>,
    pub tls: TlsConfig,
    pub logger: LogConfig,
    /// Seconds in-flight calls may keep running after a shutdown signal.
    pub drain_grace_seconds: u64,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            grpc_listen_address: SocketAddr::from(([0, 0, 0, 0], 8980)),
            http_listen_address: SocketAddr::from(([0, 0, 0, 0], 9980)),
            schedulers: Vec::new(),
            cache_only_instances: Vec::new(),
            tls: TlsConfig::default(),
            logger: LogConfig::default(),
            drain_grace_seconds: rex_api::DEFAULT_DRAIN_GRACE.as_secs(),
        }
    }
}

impl FrontendConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("invalid frontend configuration")
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_secs(self.drain_grace_seconds)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing configuration {}", path.display()))
    }
}
