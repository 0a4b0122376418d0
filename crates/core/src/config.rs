//! Session timing configuration

use std::time::Duration;

/// Default deadline for the first side of a session to connect
pub const DEFAULT_FIRST_CONNECTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Default deadline for the second side once one side is attached
pub const DEFAULT_SECOND_CONNECTION_TIMEOUT: Duration = Duration::from_secs(300);

/// Arbitration deadlines applied to every new session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    /// How long a fresh session waits for its first attach
    pub first_connection: Duration,
    /// How long a half-attached session waits for the other side
    pub second_connection: Duration,
}

impl SessionTimeouts {
    /// Build timeouts from whole seconds
    pub fn from_secs(first_connection: u64, second_connection: u64) -> Self {
        Self {
            first_connection: Duration::from_secs(first_connection),
            second_connection: Duration::from_secs(second_connection),
        }
    }
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            first_connection: DEFAULT_FIRST_CONNECTION_TIMEOUT,
            second_connection: DEFAULT_SECOND_CONNECTION_TIMEOUT,
        }
    }
}
