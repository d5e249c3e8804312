//! Telling dead connections apart from failed commands.

use std::io;

use crate::error::TransportError;

/// Messages that mark a connection as unusable when all a transport gives
/// us is text.
const LOST_MARKERS: &[&str] = &[
    "use of closed network connection",
    "connection reset by peer",
    "broken pipe",
    "connection aborted",
    "unexpected eof",
    "end of file",
];

/// Outcome of classifying a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The connection itself is dead; reconnect and retry.
    ConnectionLost,
    /// The command failed on a healthy connection; surface it.
    Command,
}

/// Classify a transport failure.
#[must_use]
pub fn classify(err: &TransportError) -> FailureClass {
    let lost = match err {
        TransportError::Closed => true,
        TransportError::Io(io) => is_lost_io(io),
        TransportError::Other(message) => is_lost_message(message),
        TransportError::AuthFailed | TransportError::Timeout(_) | TransportError::Protocol(_) => {
            false
        }
    };

    if lost {
        FailureClass::ConnectionLost
    } else {
        FailureClass::Command
    }
}

/// Shorthand for `classify(err) == FailureClass::ConnectionLost`.
#[must_use]
pub fn is_connection_lost(err: &TransportError) -> bool {
    classify(err) == FailureClass::ConnectionLost
}

fn is_lost_io(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::NotConnected
    ) || is_lost_message(&err.to_string())
}

fn is_lost_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower == "eof" || LOST_MARKERS.iter().any(|marker| lower.contains(marker))
}
