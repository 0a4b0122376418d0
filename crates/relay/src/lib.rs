//! Transfer Relay
//!
//! Rendezvous logic: pairs the producer and the consumer that present the
//! same token and streams the producer's bytes to the consumer exactly once.
//!
//! ## Components
//!
//! - **SessionRegistry**: token → session mapping; creates sessions and drops
//!   them the moment they reach a terminal state
//! - **SessionHandle**: entry point for attaching a producer or a consumer;
//!   every attach blocks until the session is terminal
//! - **Session actor**: one task per session that serializes attaches,
//!   cancellations, the deadline and transfer completion
//! - **Transfer runner**: the one-shot copy started when a session pairs

mod clock;
mod registry;
mod session;
mod stream;
mod transfer;

pub use clock::{Clock, ManualClock, TokioClock};
pub use registry::SessionRegistry;
pub use session::SessionHandle;
pub use stream::{ByteSink, Upstream};
pub use transfer::run_transfer;

pub use transfer_core::{
    Result, Role, SessionState, SessionTimeouts, Token, TransferError, TransferMetadata,
};
