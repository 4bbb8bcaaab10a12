use std::{net::SocketAddr, path::Path, time::Duration};

use rex_core::BuildQueueRef;
use rex_model::TlsMaterial;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Identity, Server, ServerTlsConfig, server::Router};
use tracing::{info, warn};

use crate::{error::ApiError, grpc::BuildQueueService};

/// How long in-flight calls may keep running once shutdown has been requested.
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(10);

/// gRPC server exposing the build queue.
///
/// `WaitExecution` is routed on the instance prefix of the operation name, so
/// schedulers behind this server must name operations `<instance>/operations/<id>`.
pub struct FrontendServer {
    service: BuildQueueService,
    tls: Option<TlsMaterial>,
    drain_grace: Duration,
    cutoff: CancellationToken,
}

impl FrontendServer {
    /// Serve `build_queue` over plaintext HTTP/2.
    pub fn new(build_queue: BuildQueueRef) -> Self {
        let cutoff = CancellationToken::new();
        Self {
            service: BuildQueueService::new(build_queue).with_cutoff(cutoff.clone()),
            tls: None,
            drain_grace: DEFAULT_DRAIN_GRACE,
            cutoff,
        }
    }

    /// Time given to in-flight calls after shutdown before they are cut off.
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    /// Terminate TLS with the given certificate and key. `None` keeps plaintext.
    pub fn with_tls(mut self, tls: Option<TlsMaterial>) -> Self {
        self.tls = tls;
        self
    }

    /// Router with the build-queue services mounted.
    ///
    /// Reads the TLS files, if any; callers may add further services before serving.
    pub async fn router(&self) -> Result<Router, ApiError> {
        let mut builder = Server::builder();
        if let Some(tls) = &self.tls {
            builder = builder.tls_config(ServerTlsConfig::new().identity(load_identity(tls).await?))?;
        }

        Ok(builder
            .add_service(self.service.capabilities_server())
            .add_service(self.service.execution_server()))
    }

    /// Bind `addr` and serve until `shutdown` is cancelled.
    pub async fn serve_with_shutdown(
        self,
        addr: SocketAddr,
        shutdown: CancellationToken,
    ) -> Result<(), ApiError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiError::Bind { addr, source })?;
        self.serve_listener(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` is cancelled.
    ///
    /// Once cancelled, no new connections are accepted and in-flight calls get the
    /// drain grace period to finish. Operation streams still open after that end with
    /// `Unavailable`, which also cancels the matching scheduler calls. Calls that still
    /// have not finished one more grace period later are abandoned.
    pub async fn serve_listener(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), ApiError> {
        let router = self.router().await?;
        let local = listener.local_addr().ok();
        info!(addr = ?local, tls = self.tls.is_some(), "serving gRPC");

        let serve = router.serve_with_incoming_shutdown(
            TcpListenerStream::new(listener),
            shutdown.clone().cancelled_owned(),
        );
        tokio::pin!(serve);

        let grace = self.drain_grace;
        let drained = tokio::select! {
            res = &mut serve => Some(res),
            _ = drain_deadline(&shutdown, grace) => None,
        };

        match drained {
            Some(res) => res?,
            None => {
                warn!(?grace, "in-flight calls still open after the drain grace period, cutting them off");
                self.cutoff.cancel();
                match tokio::time::timeout(grace, &mut serve).await {
                    Ok(res) => res?,
                    Err(_) => warn!("abandoning calls that ignored the cutoff"),
                }
            }
        }

        info!("gRPC server stopped");
        Ok(())
    }
}

async fn drain_deadline(shutdown: &CancellationToken, grace: Duration) {
    shutdown.cancelled().await;
    tokio::time::sleep(grace).await;
}

async fn load_identity(tls: &TlsMaterial) -> Result<Identity, ApiError> {
    let cert = read_pem("certificate", &tls.cert_file).await?;
    let key = read_pem("private key", &tls.key_file).await?;
    Ok(Identity::from_pem(cert, key))
}

async fn read_pem(kind: &'static str, path: &Path) -> Result<Vec<u8>, ApiError> {
    tokio::fs::read(path).await.map_err(|source| ApiError::ReadTls {
        kind,
        path: path.to_path_buf(),
        source,
    })
}
