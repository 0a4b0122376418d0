use thiserror::Error;

use crate::Role;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Session not found")]
    NotFound,

    #[error("Slot already occupied: {0}")]
    SlotOccupied(Role),

    #[error("Session timed out")]
    TimedOut,

    #[error("Session aborted")]
    Aborted,

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Token generation failed: {0}")]
    TokenGeneration(String),
}

pub type Result<T> = std::result::Result<T, TransferError>;
