//! Transfer Server
//!
//! HTTP front end for the relay.
//!
//! ## Routes
//!
//! - `GET /` - landing page
//! - `GET /newsession` - allocate a session, body is the token
//! - `PUT /up/{token}[/...]` - request body is relayed to the consumer
//! - `GET /down/{token}[/...]` - response body is the producer's upload
//!
//! Any failure on `/up` or `/down` (unknown token, role already taken, timeout,
//! abort, copy error) closes the TCP connection without writing a response.

mod connection;
mod handlers;
mod server;
mod sink;

pub use connection::ConnectionAbort;
pub use handlers::router;
pub use server::{RelayServer, ServerConfig, DEFAULT_LISTEN_ADDR};

use std::net::SocketAddr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {0}: {1}")]
    Bind(SocketAddr, std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
