//! One-shot command execution.

use std::io::Write;
use std::time::Duration;

use rcon_supervisor::{Connector, Console};

use crate::error::CliError;
use crate::output::{CommandOutput, OutputFormat};

/// Exec command executor.
pub struct ExecCommand {
    command: String,
    timeout: Duration,
}

impl ExecCommand {
    /// Create a new exec command.
    #[must_use]
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    /// Run the command and print the reply.
    pub async fn execute<K, W>(
        &self,
        console: &Console<K>,
        writer: &mut W,
        format: &OutputFormat,
    ) -> Result<(), CliError>
    where
        K: Connector,
        W: Write,
    {
        let response = console.execute_timeout(&self.command, self.timeout).await?;
        format.write(
            writer,
            &CommandOutput {
                command: self.command.clone(),
                response,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Format;
    use rcon_supervisor::fake::FakeConnector;
    use rcon_supervisor::{ConsoleError, Endpoint, SupervisorConfig};

    fn console(connector: &FakeConnector) -> Console<FakeConnector> {
        Console::start(
            connector.clone(),
            Endpoint::new("127.0.0.1", 27015, "123456"),
            SupervisorConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_exec_prints_response() {
        let connector = FakeConnector::new().with_response("/version", "1.1.110");
        let console = console(&connector);
        let mut out = Vec::new();

        ExecCommand::new("/version", Duration::from_secs(1))
            .execute(&console, &mut out, &OutputFormat::new(Format::Text))
            .await
            .expect("exec");

        assert_eq!(String::from_utf8(out).expect("utf-8"), "1.1.110\n");
        console.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_exec_times_out_when_unreachable() {
        let connector = FakeConnector::new().fail_next_dials(usize::MAX);
        let console = console(&connector);
        let mut out = Vec::new();

        let err = ExecCommand::new("/version", Duration::from_secs(2))
            .execute(&console, &mut out, &OutputFormat::new(Format::Text))
            .await
            .expect_err("unreachable");

        assert!(matches!(err, CliError::Console(ConsoleError::ReadinessTimeout)));
        assert!(out.is_empty());
        console.shutdown().await;
    }
}
