//! Connection state types.

use std::fmt;

/// State of the console connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No live connection and no attempt in progress.
    #[default]
    Disconnected,
    /// Dialing, probing, or waiting out a backoff delay.
    Connecting,
    /// A probed connection is installed and accepting commands.
    Ready,
}

impl ConnectionState {
    /// Lowercase name, as used in logs and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
