//! Roles, session states and transfer metadata

use std::fmt;

use crate::{Result, TransferError};

/// Which side of a session a connection plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Upstream: supplies the bytes
    Producer,
    /// Downstream: receives the bytes
    Consumer,
}

impl Role {
    /// The opposite side of the session
    pub fn other(&self) -> Self {
        match self {
            Self::Producer => Self::Consumer,
            Self::Consumer => Self::Producer,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Producer => f.write_str("producer"),
            Self::Consumer => f.write_str("consumer"),
        }
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Zero or one side attached
    #[default]
    Waiting,
    /// Both sides attached, copy not yet started
    Paired,
    /// Copy in progress
    Transferring,
    /// Copy reached end of input
    Completed,
    /// Copy failed on either side
    Error,
    /// The only attached side went away before pairing
    Aborted,
    /// Deadline elapsed before pairing
    TimedOut,
}

impl SessionState {
    /// Whether the session has finished and left the registry
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Error | Self::Aborted | Self::TimedOut
        )
    }

    /// The result an attach call reports for this state, if terminal
    pub fn outcome(&self) -> Option<Result<()>> {
        match self {
            Self::Completed => Some(Ok(())),
            Self::Error => Some(Err(TransferError::TransferFailed(
                "copy did not complete".to_string(),
            ))),
            Self::Aborted => Some(Err(TransferError::Aborted)),
            Self::TimedOut => Some(Err(TransferError::TimedOut)),
            Self::Waiting | Self::Paired | Self::Transferring => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Waiting => "waiting",
            Self::Paired => "paired",
            Self::Transferring => "transferring",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Aborted => "aborted",
            Self::TimedOut => "timedout",
        };
        f.write_str(name)
    }
}

/// Metadata forwarded from producer to consumer before the first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferMetadata {
    /// Total byte count announced by the producer, if any
    pub content_length: Option<u64>,
}

impl TransferMetadata {
    /// `Content-Disposition` hint for the consumer; relayed bytes are always
    /// offered as a download
    pub fn disposition(&self) -> &'static str {
        "attachment"
    }
}
