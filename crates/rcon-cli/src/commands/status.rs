//! Connection status command implementation.

use std::io::Write;
use std::time::Duration;

use rcon_supervisor::{ConsoleError, Connector, Console};
use tokio::time::Instant;

use crate::error::CliError;
use crate::output::{OutputFormat, StatusReport};

/// Status command executor.
pub struct StatusCommand {
    wait: Duration,
}

impl StatusCommand {
    /// Create a status command that waits up to `wait` for readiness.
    #[must_use]
    pub const fn new(wait: Duration) -> Self {
        Self { wait }
    }

    /// Print the connection status. Fails if the console is not ready.
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
        match console.wait_ready(Instant::now() + self.wait).await {
            Ok(_) | Err(ConsoleError::ReadinessTimeout) => {}
            Err(e) => return Err(e.into()),
        }

        let report = StatusReport {
            endpoint: console.supervisor().endpoint().address(),
            state: console.state().to_string(),
            ready: console.is_ready(),
            epoch: console.epoch(),
        };
        format.write(writer, &report)?;

        if report.ready {
            Ok(())
        } else {
            Err(CliError::NotReady(self.wait.as_secs()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Format;
    use rcon_supervisor::fake::FakeConnector;
    use rcon_supervisor::{Endpoint, SupervisorConfig};

    fn console(connector: &FakeConnector) -> Console<FakeConnector> {
        Console::start(
            connector.clone(),
            Endpoint::new("127.0.0.1", 27015, "123456"),
            SupervisorConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_ready_status() {
        let connector = FakeConnector::new();
        let console = console(&connector);
        let mut out = Vec::new();

        StatusCommand::new(Duration::from_secs(1))
            .execute(&console, &mut out, &OutputFormat::new(Format::Json))
            .await
            .expect("ready");

        let value: serde_json::Value = serde_json::from_slice(&out).expect("json");
        assert_eq!(value["state"], "ready");
        assert_eq!(value["ready"], true);
        assert_eq!(value["epoch"], 1);
        assert_eq!(value["endpoint"], "127.0.0.1:27015");
        console.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_status_still_reports() {
        let connector = FakeConnector::new().fail_next_dials(usize::MAX);
        let console = console(&connector);
        let mut out = Vec::new();

        let err = StatusCommand::new(Duration::from_secs(3))
            .execute(&console, &mut out, &OutputFormat::new(Format::Text))
            .await
            .expect_err("not ready");

        assert!(matches!(err, CliError::NotReady(3)));
        let text = String::from_utf8(out).expect("utf-8");
        assert!(text.contains("State:     connecting"));
        assert!(text.contains("Ready:     no"));
        console.shutdown().await;
    }
}
