//! Byte source and byte sink handed to a session by the transport

use std::fmt;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};

use transfer_core::TransferMetadata;

/// The producer's side of a session: a readable byte stream
pub struct Upstream {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    /// Byte count announced by the producer (e.g. `Content-Length`)
    pub content_length: Option<u64>,
}

impl Upstream {
    pub fn new<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            reader: Box::new(reader),
            content_length: None,
        }
    }

    #[must_use]
    pub fn with_content_length(mut self, content_length: Option<u64>) -> Self {
        self.content_length = content_length;
        self
    }
}

impl fmt::Debug for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upstream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// The consumer's side of a session: a writable byte stream
///
/// `declare` is called exactly once, before the first byte is written. `fail`
/// is called when the copy fails, before the sink is dropped, so the sink can
/// surface the failure to whoever is reading from it.
pub trait ByteSink: AsyncWrite + Send + Unpin {
    fn declare(&mut self, _metadata: &TransferMetadata) {}

    fn fail(&mut self, _error: &io::Error) {}
}

impl ByteSink for DuplexStream {}

impl ByteSink for Vec<u8> {}
