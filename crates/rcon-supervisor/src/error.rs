//! Error types for rcon-supervisor.

use std::time::Duration;

use rcon_proto::ProtoError;
use thiserror::Error;

/// Failures reported by a transport connection.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket-level failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed, by the peer or by the supervisor.
    #[error("connection closed")]
    Closed,

    /// The server rejected the password.
    #[error("authentication failed")]
    AuthFailed,

    /// No reply arrived in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Malformed or unexpected protocol traffic.
    #[error("protocol error: {0}")]
    Protocol(ProtoError),

    /// Failure from a foreign transport, described by its message.
    #[error("{0}")]
    Other(String),
}

impl From<ProtoError> for TransportError {
    fn from(err: ProtoError) -> Self {
        match err {
            ProtoError::Io(io) => Self::Io(io),
            other => Self::Protocol(other),
        }
    }
}

/// Why a connection attempt did not produce a usable connection.
///
/// Never returned to callers; logged and published as events while the
/// supervisor keeps retrying.
#[derive(Debug, Error)]
pub enum DialError {
    /// Opening or authenticating the transport failed.
    #[error("dial failed: {0}")]
    Dial(#[source] TransportError),

    /// The transport opened but could not run the health probe.
    #[error("health probe failed: {0}")]
    Probe(#[source] TransportError),

    /// Dial and probe together took longer than allowed.
    #[error("dial timed out after {0:?}")]
    TimedOut(Duration),
}

/// Errors returned to callers of [`crate::Console`].
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The deadline elapsed before the connection became ready.
    #[error("RCON connection is not established within deadline threshold")]
    ReadinessTimeout,

    /// The deadline elapsed while the command was queued or on the wire.
    #[error("command did not complete before the deadline")]
    DeadlineExceeded,

    /// The server or transport rejected the command.
    #[error("command execution failed: {0}")]
    Command(#[source] TransportError),

    /// Empty or whitespace-only command.
    #[error("command must not be empty")]
    EmptyCommand,

    /// The supervisor has been shut down.
    #[error("console has shut down")]
    ShutDown,

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ConsoleError {
    /// Whether this error came from the caller's deadline.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::ReadinessTimeout | Self::DeadlineExceeded)
    }
}
