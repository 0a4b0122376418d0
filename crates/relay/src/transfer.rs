//! Transfer runner
//!
//! Performs the single copy from producer to consumer once a session pairs.
//! There is no retry: whatever happens here decides the session's terminal
//! state.

use std::io;

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use transfer_core::{Token, TransferMetadata};

use crate::{ByteSink, Upstream};

/// Copy every byte from `upstream` into `sink`.
///
/// The sink receives the producer's metadata before the first byte. If the
/// producer announced a length, the copy only succeeds when exactly that many
/// bytes arrived. On failure the sink is told about the error before it is
/// dropped.
pub async fn run_transfer(
    token: &Token,
    mut upstream: Upstream,
    mut sink: Box<dyn ByteSink>,
) -> io::Result<u64> {
    let metadata = TransferMetadata {
        content_length: upstream.content_length,
    };
    sink.declare(&metadata);

    debug!("Session {} copying", token.short());

    let result = copy(&mut upstream, &mut sink).await;
    match &result {
        Ok(copied) => debug!("Session {} copied {} bytes", token.short(), copied),
        Err(e) => {
            warn!("Session {} transfer failed: {}", token.short(), e);
            sink.fail(e);
        }
    }
    result
}

async fn copy(upstream: &mut Upstream, sink: &mut Box<dyn ByteSink>) -> io::Result<u64> {
    let copied = tokio::io::copy(&mut upstream.reader, sink).await?;

    if let Some(expected) = upstream.content_length {
        if copied < expected {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("producer sent {} of {} bytes", copied, expected),
            ));
        }
        if copied > expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("producer sent {} bytes, announced {}", copied, expected),
            ));
        }
    }

    sink.shutdown().await?;
    Ok(copied)
}
