//! Session lifecycle through the registry, without HTTP
//!
//! Drives producers and consumers as in-memory streams against a registry
//! running on a manual clock, so every deadline is hit exactly.
//!
//! Run with: cargo test -p transfer-tests --test session_flow

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use transfer_core::{RandomTokenGenerator, Result, Token};
use transfer_relay::{
    ManualClock, Role, SessionRegistry, SessionState, SessionTimeouts, TransferError, Upstream,
};

const LIMIT: Duration = Duration::from_secs(5);

// =========================================================================
// Harness
// =========================================================================

fn registry(clock: &ManualClock) -> SessionRegistry {
    SessionRegistry::with_parts(
        SessionTimeouts::from_secs(60, 300),
        Box::new(RandomTokenGenerator::default()),
        Arc::new(clock.clone()),
    )
}

fn spawn_producer(
    registry: &SessionRegistry,
    token: &Token,
    cancel: CancellationToken,
    upstream: Upstream,
) -> JoinHandle<Result<()>> {
    let registry = registry.clone();
    let token = token.clone();
    tokio::spawn(async move {
        registry
            .attach_producer(token.as_str(), cancel, upstream)
            .await
    })
}

fn spawn_consumer(
    registry: &SessionRegistry,
    token: &Token,
    cancel: CancellationToken,
) -> (JoinHandle<Result<()>>, tokio::io::DuplexStream) {
    let (sink, reader) = tokio::io::duplex(4096);
    let registry = registry.clone();
    let token = token.clone();
    let handle = tokio::spawn(async move {
        registry
            .attach_consumer(token.as_str(), cancel, Box::new(sink))
            .await
    });
    (handle, reader)
}

async fn until_attached(registry: &SessionRegistry, token: &Token, role: Role) {
    let session = registry.lookup(token.as_str()).expect("session should be live");
    tokio::time::timeout(LIMIT, async {
        while !session.is_attached(role) {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("side should attach");
}

async fn outcome(handle: JoinHandle<Result<()>>) -> Result<()> {
    tokio::time::timeout(LIMIT, handle)
        .await
        .expect("attach should resolve")
        .expect("attach task panicked")
}

// =========================================================================
// Tests
// =========================================================================

/// Producer attaches first, consumer arrives later, both succeed
#[tokio::test]
async fn test_producer_first_streams_everything() {
    let clock = ManualClock::new();
    let registry = registry(&clock);
    let token = registry.create().unwrap();

    let (mut writer, upstream) = tokio::io::duplex(1024);
    let producer = spawn_producer(
        &registry,
        &token,
        CancellationToken::new(),
        Upstream::new(upstream).with_content_length(Some(64 * 1024)),
    );
    until_attached(&registry, &token, Role::Producer).await;

    // Most of the second-connection window passes without expiring.
    clock.advance(Duration::from_secs(299));
    tokio::task::yield_now().await;
    assert!(registry.lookup(token.as_str()).is_some());

    let (consumer, mut reader) = spawn_consumer(&registry, &token, CancellationToken::new());
    let feed = tokio::spawn(async move {
        for chunk in 0..64u8 {
            writer.write_all(&[chunk; 1024]).await.unwrap();
        }
    });

    let mut received = Vec::new();
    reader.read_to_end(&mut received).await.unwrap();
    feed.await.unwrap();

    assert_eq!(received.len(), 64 * 1024);
    assert!(received.chunks(1024).enumerate().all(|(i, c)| c.iter().all(|b| *b as usize == i)));
    assert_eq!(outcome(producer).await, Ok(()));
    assert_eq!(outcome(consumer).await, Ok(()));
    assert!(registry.is_empty());
}

/// Consumer attaches first; pairing cancels the deadline entirely
#[tokio::test]
async fn test_pairing_disarms_deadline() {
    let clock = ManualClock::new();
    let registry = registry(&clock);
    let token = registry.create().unwrap();

    let (consumer, mut reader) = spawn_consumer(&registry, &token, CancellationToken::new());
    until_attached(&registry, &token, Role::Consumer).await;

    let (mut writer, upstream) = tokio::io::duplex(64);
    let producer = spawn_producer(&registry, &token, CancellationToken::new(), Upstream::new(upstream));
    until_attached(&registry, &token, Role::Producer).await;

    writer.write_all(b"slow ").await.unwrap();
    clock.advance(Duration::from_secs(3600));
    tokio::task::yield_now().await;
    writer.write_all(b"upload").await.unwrap();
    drop(writer);

    let mut received = Vec::new();
    reader.read_to_end(&mut received).await.unwrap();
    assert_eq!(received, b"slow upload");
    assert_eq!(outcome(producer).await, Ok(()));
    assert_eq!(outcome(consumer).await, Ok(()));
}

/// A consumer that leaves before pairing takes the session with it
#[tokio::test]
async fn test_consumer_abort_before_pairing() {
    let clock = ManualClock::new();
    let registry = registry(&clock);
    let token = registry.create().unwrap();
    let session = registry.lookup(token.as_str()).unwrap();

    let cancel = CancellationToken::new();
    let (consumer, _reader) = spawn_consumer(&registry, &token, cancel.clone());
    until_attached(&registry, &token, Role::Consumer).await;

    cancel.cancel();
    assert_eq!(outcome(consumer).await, Err(TransferError::Aborted));
    assert_eq!(session.state(), SessionState::Aborted);

    let producer = spawn_producer(
        &registry,
        &token,
        CancellationToken::new(),
        Upstream::new(&b"too late"[..]),
    );
    assert_eq!(outcome(producer).await, Err(TransferError::NotFound));
}

/// A truncated upload fails both sides with the same error
#[tokio::test]
async fn test_truncated_upload_fails_both() {
    let clock = ManualClock::new();
    let registry = registry(&clock);
    let token = registry.create().unwrap();

    let producer = spawn_producer(
        &registry,
        &token,
        CancellationToken::new(),
        Upstream::new(&b"0123456789"[..]).with_content_length(Some(100)),
    );
    until_attached(&registry, &token, Role::Producer).await;

    let (consumer, mut reader) = spawn_consumer(&registry, &token, CancellationToken::new());
    let mut received = Vec::new();
    let _ = reader.read_to_end(&mut received).await;

    let producer = outcome(producer).await;
    let consumer = outcome(consumer).await;
    assert!(matches!(producer, Err(TransferError::TransferFailed(_))));
    assert_eq!(producer, consumer);
    assert!(registry.is_empty());
}

/// Only the first attach per role is accepted
#[tokio::test]
async fn test_duplicate_consumer_rejected() {
    let clock = ManualClock::new();
    let registry = registry(&clock);
    let token = registry.create().unwrap();

    let (first, _first_reader) = spawn_consumer(&registry, &token, CancellationToken::new());
    until_attached(&registry, &token, Role::Consumer).await;

    let (second, _second_reader) = spawn_consumer(&registry, &token, CancellationToken::new());
    assert_eq!(
        outcome(second).await,
        Err(TransferError::SlotOccupied(Role::Consumer))
    );

    clock.advance(Duration::from_secs(300));
    assert_eq!(outcome(first).await, Err(TransferError::TimedOut));
}

/// Many sessions resolve independently
#[tokio::test]
async fn test_many_sessions() {
    let clock = ManualClock::new();
    let registry = registry(&clock);

    let mut transfers = Vec::new();
    for i in 0..16u8 {
        let token = registry.create().unwrap();
        let payload = vec![i; 100 + i as usize];
        let producer = spawn_producer(
            &registry,
            &token,
            CancellationToken::new(),
            Upstream::new(std::io::Cursor::new(payload.clone()))
                .with_content_length(Some(payload.len() as u64)),
        );
        let (consumer, reader) = spawn_consumer(&registry, &token, CancellationToken::new());
        transfers.push((payload, producer, consumer, reader));
    }

    for (payload, producer, consumer, mut reader) in transfers {
        let mut received = Vec::new();
        reader.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, payload);
        assert_eq!(outcome(producer).await, Ok(()));
        assert_eq!(outcome(consumer).await, Ok(()));
    }
    assert!(registry.is_empty());
}

/// Two producers racing for one session: exactly one is admitted
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_producers_one_admitted() {
    let clock = ManualClock::new();
    let registry = registry(&clock);

    for _ in 0..40 {
        let token = registry.create().unwrap();
        let first_cancel = CancellationToken::new();
        let second_cancel = CancellationToken::new();
        let first = spawn_producer(
            &registry,
            &token,
            first_cancel.clone(),
            Upstream::new(&b"first"[..]),
        );
        let second = spawn_producer(
            &registry,
            &token,
            second_cancel.clone(),
            Upstream::new(&b"second"[..]),
        );

        // The loser returns at once; the winner blocks until the session ends.
        tokio::time::timeout(LIMIT, async {
            while !first.is_finished() && !second.is_finished() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("one producer should be rejected");

        let session = registry
            .lookup(token.as_str())
            .expect("admitted producer keeps the session live");
        assert_eq!(session.state(), SessionState::Waiting);
        assert!(session.is_attached(Role::Producer));
        assert!(!session.is_attached(Role::Consumer));

        first_cancel.cancel();
        second_cancel.cancel();
        let mut outcomes = vec![outcome(first).await, outcome(second).await];
        outcomes.sort_by_key(|o| matches!(o, Err(TransferError::SlotOccupied(_))));
        assert_eq!(
            outcomes,
            vec![
                Err(TransferError::Aborted),
                Err(TransferError::SlotOccupied(Role::Producer)),
            ]
        );
        assert!(registry.lookup(token.as_str()).is_none());
    }
}
