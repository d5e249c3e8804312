//! In-memory transport for tests.
//!
//! [`FakeConnector`] hands out [`FakeConnection`]s whose behavior is scripted
//! up front: failing dials, failing probes, failing commands, latency, and
//! "server died" events. It also records what reached the wire so tests can
//! check exclusivity and retry behavior.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::TransportError;
use crate::transport::{Connection, Connector, Endpoint};

#[derive(Default)]
struct Script {
    dial_failures: usize,
    probe_failures: usize,
    exec_failures: VecDeque<TransportError>,
    responses: HashMap<String, String>,
    latency: Duration,
    probe_latency: Duration,
}

#[derive(Default)]
struct Recorder {
    dial_times: Vec<Instant>,
    commands: Vec<String>,
}

struct Inner {
    probe_command: String,
    script: Mutex<Script>,
    recorder: Mutex<Recorder>,
    dials: AtomicUsize,
    probes: AtomicUsize,
    closes: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    killed_up_to: AtomicUsize,
}

/// Scripted connector. Clones share state.
#[derive(Clone)]
pub struct FakeConnector {
    inner: Arc<Inner>,
}

impl Default for FakeConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeConnector {
    /// A connector whose dials and commands all succeed immediately.
    ///
    /// Commands without a scripted response answer `ok: <command>`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                probe_command: "/help".to_string(),
                script: Mutex::new(Script::default()),
                recorder: Mutex::new(Recorder::default()),
                dials: AtomicUsize::new(0),
                probes: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                killed_up_to: AtomicUsize::new(0),
            }),
        }
    }

    /// Treat `command` as the health probe instead of `/help`.
    ///
    /// Must be called before the connector is shared.
    #[must_use]
    pub fn with_probe_command(self, command: impl Into<String>) -> Self {
        let probe_command = command.into();
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                inner.probe_command = probe_command;
                Self {
                    inner: Arc::new(inner),
                }
            }
            Err(inner) => Self { inner },
        }
    }

    /// Fail the next `n` dials with `ConnectionRefused`.
    #[must_use]
    pub fn fail_next_dials(self, n: usize) -> Self {
        self.inner.script.lock().dial_failures = n;
        self
    }

    /// Fail the next `n` health probes.
    #[must_use]
    pub fn fail_next_probes(self, n: usize) -> Self {
        self.inner.script.lock().probe_failures = n;
        self
    }

    /// Fail the next non-probe command with `err`. Failures queue up.
    #[must_use]
    pub fn push_exec_failure(self, err: TransportError) -> Self {
        self.inner.script.lock().exec_failures.push_back(err);
        self
    }

    /// Reply to `command` with `response`.
    #[must_use]
    pub fn with_response(self, command: impl Into<String>, response: impl Into<String>) -> Self {
        self.inner
            .script
            .lock()
            .responses
            .insert(command.into(), response.into());
        self
    }

    /// Delay every non-probe command by `latency`.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.inner.script.lock().latency = latency;
        self
    }

    /// Delay every health probe by `latency`.
    #[must_use]
    pub fn with_probe_latency(self, latency: Duration) -> Self {
        self.inner.script.lock().probe_latency = latency;
        self
    }

    /// Make every connection dialed so far fail its next command with EOF,
    /// as if the server restarted.
    pub fn kill_connections(&self) {
        let dialed = self.inner.dials.load(Ordering::SeqCst);
        self.inner.killed_up_to.store(dialed, Ordering::SeqCst);
    }

    /// Number of dial attempts, successful or not.
    #[must_use]
    pub fn dial_count(&self) -> usize {
        self.inner.dials.load(Ordering::SeqCst)
    }

    /// Number of health probes executed.
    #[must_use]
    pub fn probe_count(&self) -> usize {
        self.inner.probes.load(Ordering::SeqCst)
    }

    /// Number of connections closed.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }

    /// Highest number of commands ever on the wire at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    /// Times at which each dial started.
    #[must_use]
    pub fn dial_times(&self) -> Vec<Instant> {
        self.inner.recorder.lock().dial_times.clone()
    }

    /// Non-probe commands that reached a connection, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.inner.recorder.lock().commands.clone()
    }
}

impl Connector for FakeConnector {
    type Connection = FakeConnection;

    async fn dial(&self, _endpoint: &Endpoint) -> Result<FakeConnection, TransportError> {
        let id = self.inner.dials.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.recorder.lock().dial_times.push(Instant::now());

        {
            let mut script = self.inner.script.lock();
            if script.dial_failures > 0 {
                script.dial_failures -= 1;
                return Err(TransportError::Io(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )));
            }
        }

        Ok(FakeConnection {
            id,
            inner: Arc::clone(&self.inner),
            closed: false,
        })
    }
}

/// Connection handed out by [`FakeConnector`].
pub struct FakeConnection {
    id: usize,
    inner: Arc<Inner>,
    closed: bool,
}

impl FakeConnection {
    /// 1-based dial number that produced this connection.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    async fn probe(&self) -> Result<String, TransportError> {
        self.inner.probes.fetch_add(1, Ordering::SeqCst);
        let (rejected, latency) = {
            let mut script = self.inner.script.lock();
            let rejected = script.probe_failures > 0;
            if rejected {
                script.probe_failures -= 1;
            }
            (rejected, script.probe_latency)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if rejected {
            return Err(TransportError::Other("probe rejected".to_string()));
        }
        Ok("Available commands: /help /version".to_string())
    }

    async fn command(&self, command: &str) -> Result<String, TransportError> {
        self.inner.recorder.lock().commands.push(command.to_string());

        let (failure, response, latency) = {
            let mut script = self.inner.script.lock();
            let failure = script.exec_failures.pop_front();
            let response = script
                .responses
                .get(command)
                .cloned()
                .unwrap_or_else(|| format!("ok: {command}"));
            (failure, response, script.latency)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(response),
        }
    }
}

/// Counts a command as on the wire until dropped, so cancelled commands
/// are released too.
struct Busy<'a> {
    inner: &'a Inner,
}

impl<'a> Busy<'a> {
    fn enter(inner: &'a Inner) -> Self {
        let now = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self { inner }
    }
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Connection for FakeConnection {
    async fn execute(&mut self, command: &str) -> Result<String, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if self.id <= self.inner.killed_up_to.load(Ordering::SeqCst) {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "EOF",
            )));
        }

        let _busy = Busy::enter(&self.inner);
        if command == self.inner.probe_command {
            self.probe().await
        } else {
            self.command(command).await
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.closed {
            self.closed = true;
            self.inner.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint::new("127.0.0.1", 27015, "secret")
    }

    #[tokio::test]
    async fn test_scripted_dial_failures() {
        let connector = FakeConnector::new().fail_next_dials(2);

        assert!(connector.dial(&endpoint()).await.is_err());
        assert!(connector.dial(&endpoint()).await.is_err());
        let conn = connector.dial(&endpoint()).await.expect("third dial");
        assert_eq!(conn.id(), 3);
        assert_eq!(connector.dial_count(), 3);
    }

    #[tokio::test]
    async fn test_probe_is_not_recorded_as_command() {
        let connector = FakeConnector::new();
        let mut conn = connector.dial(&endpoint()).await.expect("dial");

        conn.execute("/help").await.expect("probe");
        conn.execute("/version").await.expect("command");

        assert_eq!(connector.probe_count(), 1);
        assert_eq!(connector.commands(), vec!["/version"]);
    }

    #[tokio::test]
    async fn test_custom_probe_command() {
        let connector = FakeConnector::new()
            .with_probe_command("/version")
            .fail_next_probes(1);
        let mut conn = connector.dial(&endpoint()).await.expect("dial");

        assert!(conn.execute("/version").await.is_err());
        assert!(conn.execute("/help").await.is_ok());
        assert_eq!(connector.probe_count(), 1);
        assert_eq!(connector.commands(), vec!["/help"]);
    }

    #[tokio::test]
    async fn test_kill_connections_only_affects_existing() {
        let connector = FakeConnector::new();
        let mut old = connector.dial(&endpoint()).await.expect("dial");

        connector.kill_connections();
        let mut fresh = connector.dial(&endpoint()).await.expect("dial");

        let err = old.execute("/time").await.expect_err("killed");
        assert!(matches!(err, TransportError::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
        assert!(fresh.execute("/time").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_command_leaves_no_overlap() {
        let connector = FakeConnector::new().with_latency(Duration::from_secs(10));
        let mut first = connector.dial(&endpoint()).await.expect("dial");
        let mut second = connector.dial(&endpoint()).await.expect("dial");

        let cancelled =
            tokio::time::timeout(Duration::from_secs(1), first.execute("/slow")).await;
        assert!(cancelled.is_err());

        second.execute("/after").await.expect("command");
        assert_eq!(connector.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_closed_connection_rejects_commands() {
        let connector = FakeConnector::new();
        let mut conn = connector.dial(&endpoint()).await.expect("dial");

        conn.close().await.expect("close");
        conn.close().await.expect("second close");
        assert!(matches!(conn.execute("/time").await, Err(TransportError::Closed)));
        assert_eq!(connector.close_count(), 1);
    }
}
