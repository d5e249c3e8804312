//! Interactive session: one console command per input line.

use std::io::Write;
use std::time::Duration;

use rcon_supervisor::{Connector, Console};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

use crate::error::CliError;
use crate::output::{CommandFailure, CommandOutput, OutputFormat};

/// Shell command executor.
pub struct ShellCommand {
    timeout: Duration,
}

/// Counts for a finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShellSummary {
    /// Commands that returned a reply.
    pub succeeded: usize,
    /// Commands that returned an error.
    pub failed: usize,
}

impl ShellCommand {
    /// Create a shell with a per-command timeout.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run commands read from `input` until `exit` or end of input.
    ///
    /// A failed command is reported and the session continues.
    pub async fn execute<K, R, W>(
        &self,
        console: &Console<K>,
        input: R,
        writer: &mut W,
        format: &OutputFormat,
    ) -> Result<ShellSummary, CliError>
    where
        K: Connector,
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut summary = ShellSummary::default();
        let mut lines = input.lines();

        while let Some(line) = lines.next_line().await? {
            let command = line.trim();
            if command.is_empty() {
                continue;
            }
            if command == "exit" || command == "quit" {
                break;
            }

            match console.execute_timeout(command, self.timeout).await {
                Ok(response) => {
                    summary.succeeded += 1;
                    format.write(
                        writer,
                        &CommandOutput {
                            command: command.to_string(),
                            response,
                        },
                    )?;
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(command, error = %e, "command failed");
                    format.write(
                        writer,
                        &CommandFailure {
                            command: command.to_string(),
                            error: e.to_string(),
                        },
                    )?;
                }
            }
        }

        Ok(summary)
    }
}
