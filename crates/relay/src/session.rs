//! Per-token session
//!
//! Every session is driven by a single actor task. Producer attach, consumer
//! attach, either side's cancellation, the deadline and the end of the copy
//! all arrive at that task and are handled one at a time, so no two of them
//! can ever fire a transition for the same session.
//!
//! ```text
//! Waiting ──both attached──▶ Paired ──▶ Transferring ──▶ Completed | Error
//!    │
//!    ├──attached side cancelled──▶ Aborted
//!    └──deadline elapsed─────────▶ TimedOut
//! ```
//!
//! Callers only see a [`SessionHandle`]; each attach blocks until the session
//! is terminal and then reports the terminal outcome, so both sides of a
//! paired session always observe the same result.

use std::io;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use transfer_core::{Result, Role, SessionState, SessionTimeouts, Token, TransferError};

use crate::{run_transfer, ByteSink, Clock, Upstream};

/// Capacity of a session's command queue
const COMMAND_QUEUE_SIZE: usize = 8;

/// Called once when the session reaches a terminal state
pub(crate) type Detach = Box<dyn FnOnce() + Send>;

/// The stream a caller hands over on attach
enum Slot {
    Producer(Upstream),
    Consumer(Box<dyn ByteSink>),
}

impl Slot {
    fn role(&self) -> Role {
        match self {
            Self::Producer(_) => Role::Producer,
            Self::Consumer(_) => Role::Consumer,
        }
    }
}

enum Command {
    Attach {
        cancel: CancellationToken,
        slot: Slot,
        reply: oneshot::Sender<Result<()>>,
    },
}

/// What handles can observe about a session
#[derive(Debug, Clone, Copy, Default)]
struct Snapshot {
    state: SessionState,
    producer: bool,
    consumer: bool,
}

/// Handle to a live session
///
/// Cheap to clone. Attaching through a handle whose session already finished
/// fails with [`TransferError::NotFound`].
#[derive(Clone)]
pub struct SessionHandle {
    token: Token,
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<Snapshot>,
}

impl SessionHandle {
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Current state of the session
    pub fn state(&self) -> SessionState {
        self.snapshot.borrow().state
    }

    /// Whether `role` has been admitted to the session
    pub fn is_attached(&self, role: Role) -> bool {
        let snapshot = self.snapshot.borrow();
        match role {
            Role::Producer => snapshot.producer,
            Role::Consumer => snapshot.consumer,
        }
    }

    /// Attach the producer and wait for the session to finish.
    ///
    /// `cancel` is the caller's disconnect signal: if it fires while the
    /// producer is the only side attached, the session is aborted. Once the
    /// session has paired, cancellation no longer affects it.
    pub async fn attach_producer(&self, cancel: CancellationToken, upstream: Upstream) -> Result<()> {
        self.attach(cancel, Slot::Producer(upstream)).await
    }

    /// Attach the consumer and wait for the session to finish.
    ///
    /// Same contract as [`attach_producer`](Self::attach_producer).
    pub async fn attach_consumer(
        &self,
        cancel: CancellationToken,
        sink: Box<dyn ByteSink>,
    ) -> Result<()> {
        self.attach(cancel, Slot::Consumer(sink)).await
    }

    async fn attach(&self, cancel: CancellationToken, slot: Slot) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Attach {
                cancel,
                slot,
                reply: reply_tx,
            })
            .await
            .map_err(|_| TransferError::NotFound)?;

        // A dropped reply means the actor finished before reading the command.
        reply_rx.await.map_err(|_| TransferError::NotFound)??;

        let mut snapshot = self.snapshot.clone();
        let terminal = snapshot
            .wait_for(|s| s.state.is_terminal())
            .await
            .map(|s| s.state)
            .unwrap_or(SessionState::Aborted);
        terminal.outcome().unwrap_or(Err(TransferError::Aborted))
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("token", &self.token.short())
            .field("state", &self.state())
            .finish()
    }
}

/// The serialized state machine behind a [`SessionHandle`]
pub(crate) struct SessionActor {
    token: Token,
    timeouts: SessionTimeouts,
    clock: Arc<dyn Clock>,
    commands: mpsc::Receiver<Command>,
    accepting: bool,
    snapshot: watch::Sender<Snapshot>,
    state: SessionState,
    producer_cancel: Option<CancellationToken>,
    consumer_cancel: Option<CancellationToken>,
    upstream: Option<Upstream>,
    sink: Option<Box<dyn ByteSink>>,
    deadline: Option<BoxFuture<'static, ()>>,
    transfer: Option<JoinHandle<io::Result<u64>>>,
    detach: Option<Detach>,
}

/// Build a session in the Waiting state.
///
/// The deadline starts counting immediately; the actor must be spawned with
/// [`SessionActor::run`] for anything to happen.
pub(crate) fn new_session(
    token: Token,
    timeouts: SessionTimeouts,
    clock: Arc<dyn Clock>,
    detach: Detach,
) -> (SessionHandle, SessionActor) {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
    let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::default());
    let deadline = clock.sleep_until(clock.now() + timeouts.first_connection);

    let handle = SessionHandle {
        token: token.clone(),
        commands: command_tx,
        snapshot: snapshot_rx,
    };
    let actor = SessionActor {
        token,
        timeouts,
        clock,
        commands: command_rx,
        accepting: true,
        snapshot: snapshot_tx,
        state: SessionState::Waiting,
        producer_cancel: None,
        consumer_cancel: None,
        upstream: None,
        sink: None,
        deadline: Some(deadline),
        transfer: None,
        detach: Some(detach),
    };
    (handle, actor)
}

impl SessionActor {
    pub(crate) async fn run(mut self) {
        debug!("Session {} waiting", self.token.short());

        while !self.state.is_terminal() {
            let waiting = self.state == SessionState::Waiting;

            tokio::select! {
                command = self.commands.recv(), if self.accepting => match command {
                    Some(Command::Attach { cancel, slot, reply }) => {
                        self.handle_attach(cancel, slot, reply);
                    }
                    None => {
                        // Every handle is gone, nobody else can attach.
                        self.accepting = false;
                    }
                },
                _ = deadline_elapsed(&mut self.deadline), if waiting => {
                    info!("Session {} timeout", self.token.short());
                    self.finish(SessionState::TimedOut);
                }
                _ = cancelled(self.producer_cancel.as_ref()), if waiting => {
                    info!("Session {} producer aborted", self.token.short());
                    self.finish(SessionState::Aborted);
                }
                _ = cancelled(self.consumer_cancel.as_ref()), if waiting => {
                    info!("Session {} consumer aborted", self.token.short());
                    self.finish(SessionState::Aborted);
                }
                result = transfer_finished(&mut self.transfer), if self.transfer.is_some() => {
                    self.transfer = None;
                    let state = match result {
                        Ok(Ok(_)) => SessionState::Completed,
                        Ok(Err(_)) => SessionState::Error,
                        Err(e) => {
                            warn!("Session {} transfer task failed: {}", self.token.short(), e);
                            SessionState::Error
                        }
                    };
                    self.finish(state);
                }
                else => {
                    warn!("Session {} has nothing left to wait on", self.token.short());
                    self.finish(SessionState::Aborted);
                }
            }
        }

        // Anything still queued was sent after the session ended; dropping the
        // commands drops their reply senders, which callers read as NotFound.
        self.commands.close();
        while self.commands.try_recv().is_ok() {}
    }

    fn is_attached(&self, role: Role) -> bool {
        match role {
            Role::Producer => self.producer_cancel.is_some(),
            Role::Consumer => self.consumer_cancel.is_some(),
        }
    }

    fn handle_attach(
        &mut self,
        cancel: CancellationToken,
        slot: Slot,
        reply: oneshot::Sender<Result<()>>,
    ) {
        let role = slot.role();

        if self.is_attached(role) {
            debug!("Session {} {} already connected", self.token.short(), role);
            let _ = reply.send(Err(TransferError::SlotOccupied(role)));
            return;
        }

        debug!("Session {} connecting to {}", self.token.short(), role);
        let caller_gone = cancel.clone();
        match slot {
            Slot::Producer(upstream) => {
                self.producer_cancel = Some(cancel);
                self.upstream = Some(upstream);
            }
            Slot::Consumer(sink) => {
                self.consumer_cancel = Some(cancel);
                self.sink = Some(sink);
            }
        }
        match (self.upstream.take(), self.sink.take()) {
            (Some(upstream), Some(sink)) => self.start_transfer(upstream, sink),
            (upstream, sink) => {
                self.upstream = upstream;
                self.sink = sink;
                let deadline = self.clock.now() + self.timeouts.second_connection;
                self.deadline = Some(self.clock.sleep_until(deadline));
                debug!(
                    "Session {} waiting {:?} for {}",
                    self.token.short(),
                    self.timeouts.second_connection,
                    role.other()
                );
            }
        }
        self.publish();

        if reply.send(Ok(())).is_err() {
            // The attach call was dropped while queued; treat it like a disconnect.
            debug!("Session {} {} left before admission", self.token.short(), role);
            caller_gone.cancel();
        }
    }

    fn start_transfer(&mut self, upstream: Upstream, sink: Box<dyn ByteSink>) {
        self.deadline = None;
        self.set_state(SessionState::Paired);
        info!("Session {} paired", self.token.short());

        let token = self.token.clone();
        self.transfer = Some(tokio::spawn(async move {
            run_transfer(&token, upstream, sink).await
        }));
        self.set_state(SessionState::Transferring);
    }

    /// Enter a terminal state: leave the registry first, then wake the callers.
    fn finish(&mut self, state: SessionState) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
        self.deadline = None;
        self.upstream = None;
        self.sink = None;
        self.set_state(state);
        info!("Session {} done: {}", self.token.short(), state);
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        self.snapshot.send_replace(Snapshot {
            state: self.state,
            producer: self.producer_cancel.is_some(),
            consumer: self.consumer_cancel.is_some(),
        });
    }
}

async fn deadline_elapsed(deadline: &mut Option<BoxFuture<'static, ()>>) {
    match deadline {
        Some(sleep) => sleep.await,
        None => std::future::pending().await,
    }
}

async fn cancelled(cancel: Option<&CancellationToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

async fn transfer_finished(
    transfer: &mut Option<JoinHandle<io::Result<u64>>>,
) -> std::result::Result<io::Result<u64>, JoinError> {
    match transfer {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
