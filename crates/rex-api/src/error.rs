use std::{io, net::SocketAddr, path::PathBuf};

use thiserror::Error;

/// Errors raised while setting up or running the gRPC server.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to read TLS {kind} {path:?}: {source}")]
    ReadTls {
        kind: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to bind gRPC listener on {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}
