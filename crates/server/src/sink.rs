//! Consumer sink backed by an HTTP response
//!
//! The consumer's response can only be built once the producer's metadata is
//! known, which is after pairing. [`response_sink`] splits the response into a
//! [`ResponseSink`] handed to the session and a [`PendingResponse`] the
//! handler waits on.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::Response;
use bytes::Bytes;
use futures::{future, stream, StreamExt};
use tokio::io::{AsyncWrite, DuplexStream};
use tokio::sync::oneshot;
use tokio_util::io::ReaderStream;

use transfer_relay::{ByteSink, TransferMetadata};

/// Bytes buffered between the copy and the response body
const PIPE_CAPACITY: usize = 64 * 1024;

/// Write side of a consumer response
pub(crate) struct ResponseSink {
    pipe: DuplexStream,
    metadata: Option<oneshot::Sender<TransferMetadata>>,
    failure: Option<oneshot::Sender<io::Error>>,
}

/// Response waiting for the session to pair
pub(crate) struct PendingResponse {
    metadata: oneshot::Receiver<TransferMetadata>,
    body: Body,
}

pub(crate) fn response_sink() -> (ResponseSink, PendingResponse) {
    let (pipe, reader) = tokio::io::duplex(PIPE_CAPACITY);
    let (metadata_tx, metadata_rx) = oneshot::channel();
    let (failure_tx, failure_rx) = oneshot::channel::<io::Error>();

    // A failed copy ends the body with an error instead of a clean EOF, so
    // hyper aborts the connection rather than finishing the response.
    let failure = stream::once(async move { failure_rx.await.ok().map(Err::<Bytes, io::Error>) })
        .filter_map(future::ready);
    let body = Body::from_stream(ReaderStream::new(reader).chain(failure));

    let sink = ResponseSink {
        pipe,
        metadata: Some(metadata_tx),
        failure: Some(failure_tx),
    };
    let pending = PendingResponse {
        metadata: metadata_rx,
        body,
    };
    (sink, pending)
}

impl PendingResponse {
    /// Wait for pairing and build the response headers.
    ///
    /// Returns `None` if the sink was dropped before the transfer started,
    /// i.e. the session never paired.
    pub(crate) async fn ready(self) -> Option<Response> {
        let metadata = self.metadata.await.ok()?;

        let mut response = Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_DISPOSITION, metadata.disposition());
        if let Some(length) = metadata.content_length {
            response = response.header(CONTENT_LENGTH, length);
        }
        response.body(self.body).ok()
    }
}

impl AsyncWrite for ResponseSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.pipe).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.pipe).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.pipe).poll_shutdown(cx)
    }
}

impl ByteSink for ResponseSink {
    fn declare(&mut self, metadata: &TransferMetadata) {
        if let Some(tx) = self.metadata.take() {
            let _ = tx.send(*metadata);
        }
    }

    fn fail(&mut self, error: &io::Error) {
        if let Some(tx) = self.failure.take() {
            let _ = tx.send(io::Error::new(error.kind(), error.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_headers_follow_metadata() {
        let (mut sink, pending) = response_sink();
        sink.declare(&TransferMetadata {
            content_length: Some(5),
        });
        sink.write_all(b"hello").await.unwrap();
        sink.shutdown().await.unwrap();
        drop(sink);

        let response = pending.ready().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_LENGTH], "5");
        assert_eq!(response.headers()[CONTENT_DISPOSITION], "attachment");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn test_unknown_length_has_no_header() {
        let (mut sink, pending) = response_sink();
        sink.declare(&TransferMetadata::default());
        drop(sink);

        let response = pending.ready().await.unwrap();
        assert!(response.headers().get(CONTENT_LENGTH).is_none());
    }

    #[tokio::test]
    async fn test_unpaired_sink_yields_no_response() {
        let (sink, pending) = response_sink();
        drop(sink);
        assert!(pending.ready().await.is_none());
    }

    #[tokio::test]
    async fn test_failure_surfaces_in_body() {
        let (mut sink, pending) = response_sink();
        sink.declare(&TransferMetadata::default());
        sink.write_all(b"partial").await.unwrap();
        sink.fail(&io::Error::new(io::ErrorKind::BrokenPipe, "producer left"));
        drop(sink);

        let response = pending.ready().await.unwrap();
        let result = axum::body::to_bytes(response.into_body(), usize::MAX).await;
        assert!(result.is_err());
    }
}
