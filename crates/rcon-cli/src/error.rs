//! CLI error types.

use rcon_supervisor::ConsoleError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// The console rejected or could not run a command.
    #[error(transparent)]
    Console(#[from] ConsoleError),

    /// The console did not become ready in time.
    #[error("console not ready after {0}s")]
    NotReady(u64),

    /// Refused to overwrite a file.
    #[error("{0} already exists, pass --force to overwrite")]
    FileExists(String),

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
