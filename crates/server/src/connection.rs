//! Per-connection serving with abrupt close
//!
//! Each accepted TCP connection is served by hyper and raced against a
//! [`ConnectionAbort`] token that handlers can reach through an axum
//! `Extension`. When a handler fires it, the connection future is dropped
//! before any response is written, which closes the socket.

use std::net::SocketAddr;

use axum::{Extension, Router};
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lets a handler close its own connection without answering
#[derive(Debug, Clone, Default)]
pub struct ConnectionAbort(CancellationToken);

impl ConnectionAbort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the connection. Never resolves: the handler future is dropped
    /// together with the connection.
    pub async fn drop_connection<T>(&self) -> T {
        self.0.cancel();
        std::future::pending::<T>().await
    }

    pub fn is_dropped(&self) -> bool {
        self.0.is_cancelled()
    }

    async fn dropped(&self) {
        self.0.cancelled().await
    }
}

/// Serve HTTP/1 requests on `stream` until the peer leaves or a handler
/// drops the connection.
pub(crate) async fn serve_connection(stream: TcpStream, peer: SocketAddr, router: Router) {
    let abort = ConnectionAbort::new();
    let service = TowerToHyperService::new(router.layer(Extension(abort.clone())));
    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);

    tokio::select! {
        result = conn => {
            if let Err(e) = result {
                debug!("Connection from {} ended: {}", peer, e);
            }
        }
        _ = abort.dropped() => {
            debug!("Dropped connection from {}", peer);
        }
    }
}
