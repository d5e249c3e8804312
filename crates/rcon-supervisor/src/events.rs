//! Supervisor lifecycle events.

use std::time::Duration;

/// Events published by the supervisor on its broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// Starting connection attempt number `attempt` (1-based, reset after
    /// every successful connect).
    Connecting {
        /// Attempt number.
        attempt: u32,
    },
    /// A probed connection was installed.
    Ready {
        /// Readiness epoch of the new connection.
        epoch: u64,
    },
    /// An attempt failed; the next one starts after `retry_in`.
    DialFailed {
        /// Attempt number that failed.
        attempt: u32,
        /// Rendered failure.
        error: String,
        /// Backoff delay before the next attempt.
        retry_in: Duration,
    },
    /// A caller reported the connection of `epoch` as dead.
    ConnectionLost {
        /// Epoch of the discarded connection.
        epoch: u64,
        /// Rendered cause.
        reason: String,
    },
    /// The supervisor stopped for good.
    ShutDown,
}
