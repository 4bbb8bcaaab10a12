//! Remote execution frontend: routes build-queue calls to per-instance schedulers.
//!
//! Usage: `rex-frontend [config.json]` (defaults to `/config/frontend.json`).
mod config;
mod http;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use rex_api::FrontendServer;
use rex_core::InstancePlan;
use rex_observe::{init_local_offset, init_logging};
use rex_prometheus::PrometheusMetrics;

use crate::config::{DEFAULT_CONFIG_PATH, FrontendConfig};

fn main() -> anyhow::Result<()> {
    // Local offset can only be read while the process is single-threaded.
    init_local_offset();

    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = FrontendConfig::from_file(&path)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?
        .block_on(run(path, config))
}

async fn run(path: PathBuf, config: FrontendConfig) -> anyhow::Result<()> {
    // 1) logger
    init_logging(&config.logger)?;
    info!(config = %path.display(), "starting remote execution frontend");

    // 2) validate everything that does not need the network
    let tls = config.tls.material().context("invalid TLS configuration")?;
    let drain_grace = config.drain_grace();
    let plan = InstancePlan::new(config.schedulers, config.cache_only_instances)?;
    let action_cache_updates: Vec<_> = plan
        .action_cache_permissions()
        .iter()
        .filter(|(_, allowed)| *allowed)
        .map(|(instance, _)| instance.to_string())
        .collect();
    info!(?action_cache_updates, "instances accepting action cache writes");

    // 3) metrics + scheduler connections
    let metrics = PrometheusMetrics::new()?;
    let composition = plan.connect(Arc::new(metrics.clone())).await?;

    // 4) serve until a shutdown signal arrives
    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    let grpc = FrontendServer::new(Arc::new(composition.build_queue))
        .with_tls(tls)
        .with_drain_grace(drain_grace)
        .serve_with_shutdown(config.grpc_listen_address, shutdown.clone());
    let http = http::serve(config.http_listen_address, metrics, shutdown.clone());

    let result = tokio::try_join!(
        async { grpc.await.context("gRPC server") },
        async { http.await.context("metrics server") },
    );
    shutdown.cancel();
    result?;

    info!("frontend stopped");
    Ok(())
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM.
async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown.cancelled() => return,
    }
    info!("shutdown signal received");
    shutdown.cancel();
}
