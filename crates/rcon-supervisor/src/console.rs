//! Command executor: the entry point every caller goes through.
//!
//! [`Console::execute`] waits for readiness, serializes use of the live
//! connection, and on a connection-lost failure reports the connection to the
//! supervisor and retries the same command on its replacement. The caller's
//! deadline is the only bound on retries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

use crate::classify::{classify, FailureClass};
use crate::error::{ConsoleError, TransportError};
use crate::events::SupervisorEvent;
use crate::state::ConnectionState;
use crate::supervisor::{LiveConnection, Supervisor, SupervisorConfig};
use crate::transport::{Connector, Endpoint};

/// Default bound for [`Console::execute_default`].
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared handle for executing console commands.
///
/// Cheap to clone; all clones share one supervisor. The supervisor shuts
/// down when the last clone is dropped or [`Console::shutdown`] is called.
pub struct Console<K: Connector> {
    supervisor: Arc<Supervisor<K>>,
    default_timeout: Duration,
}

impl<K: Connector> Clone for Console<K> {
    fn clone(&self) -> Self {
        Self {
            supervisor: Arc::clone(&self.supervisor),
            default_timeout: self.default_timeout,
        }
    }
}

enum Failure {
    Deadline,
    Transport(TransportError),
}

/// Reports the connection as lost if an exchange is abandoned mid-flight.
///
/// A dropped `execute` future may have stopped part way through writing its
/// request, and nothing at this layer can tell. A `Connection` that returns
/// its own error keeps that knowledge: the TCP transport answers a reply
/// timeout with `Timeout` only after the request was fully flushed, relying
/// on id matching to discard the late reply, and latches itself closed when
/// a write is cut short.
struct InFlight<'a, K: Connector> {
    supervisor: &'a Supervisor<K>,
    epoch: u64,
    armed: bool,
}

impl<'a, K: Connector> InFlight<'a, K> {
    fn new(supervisor: &'a Supervisor<K>, epoch: u64) -> Self {
        Self {
            supervisor,
            epoch,
            armed: true,
        }
    }

    fn complete(mut self) {
        self.armed = false;
    }
}

impl<K: Connector> Drop for InFlight<'_, K> {
    fn drop(&mut self) {
        if self.armed {
            self.supervisor
                .report_lost(self.epoch, "command abandoned before its reply arrived");
        }
    }
}

impl<K: Connector> Console<K> {
    /// Start a supervisor for `endpoint` and wrap it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(connector: K, endpoint: Endpoint, config: SupervisorConfig) -> Self {
        Self::from_supervisor(Arc::new(Supervisor::start(connector, endpoint, config)))
    }

    /// Wrap an existing supervisor.
    #[must_use]
    pub fn from_supervisor(supervisor: Arc<Supervisor<K>>) -> Self {
        Self {
            supervisor,
            default_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Set the bound used by [`Console::execute_default`].
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// The underlying supervisor.
    #[must_use]
    pub fn supervisor(&self) -> &Arc<Supervisor<K>> {
        &self.supervisor
    }

    /// Non-blocking readiness probe, for health checks.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.supervisor.is_ready()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    /// Epoch of the most recent successful connect.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.supervisor.epoch()
    }

    /// Subscribe to supervisor lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.supervisor.subscribe()
    }

    /// Wait until the console is ready or `deadline` passes.
    pub async fn wait_ready(&self, deadline: Instant) -> Result<u64, ConsoleError> {
        self.supervisor.gate().wait_ready(deadline).await
    }

    /// Execute with the configured default timeout.
    pub async fn execute_default(&self, command: &str) -> Result<String, ConsoleError> {
        self.execute_timeout(command, self.default_timeout).await
    }

    /// Execute, giving up after `timeout`.
    pub async fn execute_timeout(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<String, ConsoleError> {
        self.execute(command, Instant::now() + timeout).await
    }

    /// Execute `command` and return the console's raw reply.
    ///
    /// Dropping the returned future cancels the call. A deadline that has
    /// already passed fails with [`ConsoleError::ReadinessTimeout`] without
    /// touching the connection.
    pub async fn execute(&self, command: &str, deadline: Instant) -> Result<String, ConsoleError> {
        if command.trim().is_empty() {
            return Err(ConsoleError::EmptyCommand);
        }
        if Instant::now() >= deadline {
            return Err(ConsoleError::ReadinessTimeout);
        }

        let mut failed_epoch = 0;
        loop {
            let live = self.acquire(failed_epoch, deadline).await?;

            match self.exchange(&live, command, deadline).await {
                Ok(response) => return Ok(response),
                Err(Failure::Deadline) => return Err(ConsoleError::DeadlineExceeded),
                Err(Failure::Transport(err)) => match classify(&err) {
                    FailureClass::Command => return Err(ConsoleError::Command(err)),
                    FailureClass::ConnectionLost => {
                        failed_epoch = live.epoch();
                        self.supervisor.report_lost(failed_epoch, &err.to_string());
                        debug!(
                            epoch = failed_epoch,
                            error = %err,
                            "retrying command on a fresh connection"
                        );
                    }
                },
            }
        }
    }

    /// Stop the supervisor shared by every clone of this console.
    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await;
    }

    /// Current connection if it is newer than `after`, else wait for one.
    async fn acquire(
        &self,
        after: u64,
        deadline: Instant,
    ) -> Result<Arc<LiveConnection<K::Connection>>, ConsoleError> {
        loop {
            if let Some(live) = self.supervisor.current() {
                if live.epoch() > after {
                    return Ok(live);
                }
            }

            timeout_at(deadline, self.supervisor.gate().wait_ready_after(after))
                .await
                .map_err(|_| ConsoleError::ReadinessTimeout)??;
        }
    }

    async fn exchange(
        &self,
        live: &LiveConnection<K::Connection>,
        command: &str,
        deadline: Instant,
    ) -> Result<String, Failure> {
        let mut conn = match timeout_at(deadline, live.lock()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(err)) => return Err(Failure::Transport(err)),
            Err(_) => return Err(Failure::Deadline),
        };

        let in_flight = InFlight::new(&self.supervisor, live.epoch());
        match timeout_at(deadline, live.run(&mut conn, command)).await {
            Ok(result) => {
                in_flight.complete();
                result.map_err(Failure::Transport)
            }
            Err(_) => Err(Failure::Deadline),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeConnector;
    use crate::reconnect::ReconnectConfig;

    fn start(connector: &FakeConnector) -> Console<FakeConnector> {
        let config = SupervisorConfig {
            reconnect: ReconnectConfig {
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(50),
                ..Default::default()
            },
            ..Default::default()
        };
        Console::start(
            connector.clone(),
            Endpoint::new("127.0.0.1", 27015, "secret"),
            config,
        )
    }

    #[tokio::test]
    async fn test_execute_returns_raw_response() {
        let connector = FakeConnector::new().with_response("/version", "1.1.110\n");
        let console = start(&connector);

        let response = console
            .execute_timeout("/version", Duration::from_secs(1))
            .await
            .expect("execute");
        assert_eq!(response, "1.1.110\n");
        console.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_default_uses_configured_timeout() {
        let connector = FakeConnector::new().fail_next_dials(usize::MAX);
        let console = start(&connector).with_default_timeout(Duration::from_secs(2));

        let started = Instant::now();
        let err = console.execute_default("/version").await.expect_err("timeout");
        assert!(matches!(err, ConsoleError::ReadinessTimeout));
        assert_eq!(started.elapsed(), Duration::from_secs(2));
        console.shutdown().await;
    }

    #[tokio::test]
    async fn test_empty_command_rejected_before_waiting() {
        let connector = FakeConnector::new().fail_next_dials(usize::MAX);
        let console = start(&connector);

        let err = console
            .execute_timeout("   ", Duration::from_secs(60))
            .await
            .expect_err("empty");
        assert!(matches!(err, ConsoleError::EmptyCommand));
        console.shutdown().await;
    }

    #[tokio::test]
    async fn test_command_error_is_not_retried() {
        let connector = FakeConnector::new()
            .push_exec_failure(TransportError::Other("Unknown command \"nope\".".to_string()));
        let console = start(&connector);

        let err = console
            .execute_timeout("/nope", Duration::from_secs(1))
            .await
            .expect_err("command error");
        assert!(matches!(err, ConsoleError::Command(TransportError::Other(_))));
        assert_eq!(connector.dial_count(), 1);
        assert_eq!(console.epoch(), 1);
        console.shutdown().await;
    }

    #[tokio::test]
    async fn test_connection_lost_is_retried_transparently() {
        let connector = FakeConnector::new().push_exec_failure(TransportError::Closed);
        let console = start(&connector);

        let response = console
            .execute_timeout("/time", Duration::from_secs(2))
            .await
            .expect("retried");
        assert_eq!(response, "ok: /time");
        assert_eq!(connector.dial_count(), 2);
        assert_eq!(console.epoch(), 2);
        assert_eq!(connector.commands(), vec!["/time", "/time"]);
        console.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_fails_waiting_callers() {
        let connector = FakeConnector::new().fail_next_dials(usize::MAX);
        let console = start(&connector);

        let waiter = {
            let console = console.clone();
            tokio::spawn(async move {
                console
                    .execute_timeout("/version", Duration::from_secs(60))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        console.shutdown().await;

        let err = waiter.await.expect("join").expect_err("shut down");
        assert!(matches!(err, ConsoleError::ShutDown));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_command_in_flight() {
        let connector = FakeConnector::new().with_latency(Duration::from_secs(30));
        let console = start(&connector);
        console
            .wait_ready(Instant::now() + Duration::from_secs(5))
            .await
            .expect("ready");

        let call = {
            let console = console.clone();
            tokio::spawn(async move { console.execute_timeout("/save", Duration::from_secs(60)).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(connector.commands(), vec!["/save"]);

        console.shutdown().await;
        let err = call.await.expect("join").expect_err("shut down");
        assert!(matches!(err, ConsoleError::ShutDown));
        assert_eq!(connector.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacing_connection_interrupts_and_retries_command() {
        let connector = FakeConnector::new().with_latency(Duration::from_secs(30));
        let console = start(&connector);
        console
            .wait_ready(Instant::now() + Duration::from_secs(5))
            .await
            .expect("ready");

        let call = {
            let console = console.clone();
            tokio::spawn(async move { console.execute_timeout("/save", Duration::from_secs(120)).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(console.supervisor().report_lost(1, "server restarted"));

        let response = call.await.expect("join").expect("retried");
        assert_eq!(response, "ok: /save");
        assert_eq!(console.epoch(), 2);
        assert_eq!(connector.commands(), vec!["/save", "/save"]);
        assert_eq!(connector.close_count(), 1);
        console.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_exchange_recycles_connection() {
        let connector = FakeConnector::new().with_latency(Duration::from_secs(10));
        let console = start(&connector);
        console
            .wait_ready(Instant::now() + Duration::from_secs(30))
            .await
            .expect("ready");

        let err = console
            .execute_timeout("/slow", Duration::from_secs(1))
            .await
            .expect_err("deadline");
        assert!(matches!(err, ConsoleError::DeadlineExceeded));

        let epoch = console
            .supervisor()
            .gate()
            .wait_ready_after(1)
            .await
            .expect("reconnected");
        assert_eq!(epoch, 2);
        console.shutdown().await;
    }
}
