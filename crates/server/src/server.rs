//! Relay server: listener, accept loop and configuration

use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use transfer_core::SessionTimeouts;
use transfer_relay::SessionRegistry;

use crate::connection::serve_connection;
use crate::{router, Result, ServerError};

/// Default listen address
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8085";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    pub listen_addr: SocketAddr,
    /// HTML file served at `/` instead of the built-in page
    pub landing_page: Option<PathBuf>,
    /// Session arbitration deadlines
    pub timeouts: SessionTimeouts,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8085)),
            landing_page: None,
            timeouts: SessionTimeouts::default(),
        }
    }
}

/// HTTP relay bound to a listening socket
pub struct RelayServer {
    listener: TcpListener,
    registry: SessionRegistry,
    landing_page: Option<PathBuf>,
}

impl RelayServer {
    /// Bind the listener with a fresh session registry
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let registry = SessionRegistry::new(config.timeouts);
        Self::bind_with_registry(config, registry).await
    }

    /// Bind the listener around an existing registry
    pub async fn bind_with_registry(config: ServerConfig, registry: SessionRegistry) -> Result<Self> {
        let listener = TcpListener::bind(config.listen_addr)
            .await
            .map_err(|e| ServerError::Bind(config.listen_addr, e))?;

        Ok(Self {
            listener,
            registry,
            landing_page: config.landing_page,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Accept connections until `shutdown` fires.
    ///
    /// Connections already being served keep running until their sessions
    /// resolve.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let router = router(self.registry.clone(), self.landing_page.clone());
        info!("Relay listening on {}", self.local_addr()?);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tokio::spawn(serve_connection(stream, peer, router.clone()));
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                },
                _ = shutdown.cancelled() => {
                    info!("Relay server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
