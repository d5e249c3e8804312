//! Connection supervisor.
//!
//! Owns the single live connection to the console. A background task dials,
//! probes and installs connections, backing off exponentially between failed
//! attempts, and tears down whatever a caller reports as dead. Callers never
//! hold a connection beyond one command: they borrow the current
//! [`LiveConnection`] per call through [`crate::Console`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, MutexGuard, Notify};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::error::{DialError, TransportError};
use crate::events::SupervisorEvent;
use crate::gate::ReadinessGate;
use crate::reconnect::ReconnectConfig;
use crate::state::ConnectionState;
use crate::transport::{Connection, Connector, Endpoint};

const EVENT_CAPACITY: usize = 64;

/// Tuning for the supervisor loop.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorConfig {
    /// Backoff between failed connection attempts.
    pub reconnect: ReconnectConfig,
    /// Command run on every fresh connection before it is declared ready.
    pub probe_command: String,
    /// Bound on dial plus probe for a single attempt.
    pub dial_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            probe_command: "/help".to_string(),
            dial_timeout: Duration::from_secs(10),
        }
    }
}

/// A connection installed by the supervisor, tagged with its epoch.
///
/// The inner mutex serializes whole request/response exchanges; the close
/// token lets the supervisor abort an exchange that is blocked on a dead
/// socket.
pub(crate) struct LiveConnection<C> {
    epoch: u64,
    conn: tokio::sync::Mutex<C>,
    closed: CancellationToken,
}

impl<C: Connection> LiveConnection<C> {
    fn new(epoch: u64, conn: C) -> Self {
        Self {
            epoch,
            conn: tokio::sync::Mutex::new(conn),
            closed: CancellationToken::new(),
        }
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Take exclusive use of the connection.
    pub(crate) async fn lock(&self) -> Result<MutexGuard<'_, C>, TransportError> {
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(TransportError::Closed),
            guard = self.conn.lock() => Ok(guard),
        }
    }

    /// Run one exchange on a locked connection, aborting if it gets closed.
    pub(crate) async fn run(&self, conn: &mut C, command: &str) -> Result<String, TransportError> {
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(TransportError::Closed),
            result = conn.execute(command) => result,
        }
    }

    async fn close(&self) {
        self.closed.cancel();
        let mut conn = self.conn.lock().await;
        if let Err(e) = conn.close().await {
            debug!(epoch = self.epoch, error = %e, "error while closing connection");
        }
    }
}

struct Shared<K: Connector> {
    connector: K,
    endpoint: Endpoint,
    config: SupervisorConfig,
    gate: ReadinessGate,
    current: RwLock<Option<Arc<LiveConnection<K::Connection>>>>,
    retired: Mutex<Vec<Arc<LiveConnection<K::Connection>>>>,
    reconnect_pending: AtomicBool,
    reconnect: Notify,
    shutdown: CancellationToken,
    events: broadcast::Sender<SupervisorEvent>,
}

/// Keeps one console connection alive for the life of the process.
pub struct Supervisor<K: Connector> {
    shared: Arc<Shared<K>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<K: Connector> Supervisor<K> {
    /// Spawn the supervisor loop and schedule the first connection attempt.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(connector: K, endpoint: Endpoint, config: SupervisorConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let span = info_span!("rcon_supervisor", endpoint = %endpoint.address());

        let shared = Arc::new(Shared {
            connector,
            endpoint,
            config,
            gate: ReadinessGate::new(),
            current: RwLock::new(None),
            retired: Mutex::new(Vec::new()),
            reconnect_pending: AtomicBool::new(false),
            reconnect: Notify::new(),
            shutdown: CancellationToken::new(),
            events,
        });

        shared.request_reconnect();
        let task = tokio::spawn(Arc::clone(&shared).run().instrument(span));

        Self {
            shared,
            task: Mutex::new(Some(task)),
        }
    }

    /// Endpoint this supervisor dials.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }

    /// Readiness gate callers wait on.
    #[must_use]
    pub fn gate(&self) -> &ReadinessGate {
        &self.shared.gate
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.gate.state()
    }

    /// Non-blocking readiness probe.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.shared.gate.is_ready()
    }

    /// Epoch of the most recent successful connect.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.shared.gate.epoch()
    }

    /// Subscribe to lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.shared.events.subscribe()
    }

    /// Report the connection installed at `epoch` as dead.
    ///
    /// Closes it, flips the gate to `Disconnected` and schedules a reconnect.
    /// Reports for a connection that was already replaced, and reports after
    /// shutdown, are ignored. Returns whether the report took effect.
    pub fn report_lost(&self, epoch: u64, reason: &str) -> bool {
        self.shared.report_lost(epoch, reason)
    }

    /// Whether shutdown has begun.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Stop reconnecting, close the live connection and release all waiters.
    ///
    /// Waits for the background task to finish. Idempotent.
    pub async fn shutdown(&self) {
        self.shared.shutdown.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "supervisor task ended abnormally");
            }
        }
    }

    pub(crate) fn current(&self) -> Option<Arc<LiveConnection<K::Connection>>> {
        self.shared.current.read().clone()
    }
}

impl<K: Connector> Drop for Supervisor<K> {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

impl<K: Connector> Shared<K> {
    fn request_reconnect(&self) {
        if self.reconnect_pending.swap(true, Ordering::AcqRel) {
            debug!("reconnect already pending");
            return;
        }
        self.reconnect.notify_one();
    }

    fn report_lost(&self, epoch: u64, reason: &str) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }

        let lost = {
            let mut current = self.current.write();
            if current.as_ref().is_some_and(|live| live.epoch == epoch) {
                self.gate.set_state(ConnectionState::Disconnected);
                current.take()
            } else {
                None
            }
        };
        let Some(live) = lost else {
            debug!(epoch, "ignoring loss report for a connection already replaced");
            return false;
        };

        live.closed.cancel();
        self.retired.lock().push(live);

        warn!(epoch, reason, "RCON connection lost, reconnecting");
        let _ = self.events.send(SupervisorEvent::ConnectionLost {
            epoch,
            reason: reason.to_string(),
        });
        self.request_reconnect();
        true
    }

    async fn run(self: Arc<Self>) {
        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                () = self.reconnect.notified() => {}
            }

            if !self.reconnect_cycle().await {
                break;
            }
        }

        self.teardown().await;
    }

    /// Dial until a connection is installed. Returns `false` on shutdown.
    async fn reconnect_cycle(&self) -> bool {
        self.close_retired().await;
        self.gate.set_state(ConnectionState::Connecting);

        let mut attempt = 0u32;
        loop {
            attempt = attempt.saturating_add(1);
            let _ = self.events.send(SupervisorEvent::Connecting { attempt });
            debug!(attempt, "dialing RCON");

            let outcome = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return false,
                outcome = self.dial_and_probe() => outcome,
            };

            match outcome {
                Ok(conn) => {
                    self.install(conn);
                    return true;
                }
                Err(e) => {
                    let delay = self.config.reconnect.delay_for_attempt(attempt);
                    warn!(
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "failed to establish RCON connection"
                    );
                    let _ = self.events.send(SupervisorEvent::DialFailed {
                        attempt,
                        error: e.to_string(),
                        retry_in: delay,
                    });

                    tokio::select! {
                        biased;
                        () = self.shutdown.cancelled() => return false,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Dial and probe within `dial_timeout`. A connection that opened but
    /// failed or stalled its probe is closed before the error is returned.
    async fn dial_and_probe(&self) -> Result<K::Connection, DialError> {
        let limit = self.config.dial_timeout;
        let deadline = Instant::now() + limit;

        let mut conn = timeout_at(deadline, self.connector.dial(&self.endpoint))
            .await
            .map_err(|_| DialError::TimedOut(limit))?
            .map_err(DialError::Dial)?;

        let failure = match timeout_at(deadline, conn.execute(&self.config.probe_command)).await {
            Ok(Ok(_)) => {
                debug!(probe = %self.config.probe_command, "health probe succeeded");
                return Ok(conn);
            }
            Ok(Err(e)) => DialError::Probe(e),
            Err(_) => DialError::TimedOut(limit),
        };

        match tokio::time::timeout(limit, conn.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "error closing half-open connection"),
            Err(_) => debug!("timed out closing half-open connection"),
        }
        Err(failure)
    }

    fn install(&self, conn: K::Connection) {
        // Cleared before publishing so a failure on the new connection can
        // schedule the next reconnect.
        self.reconnect_pending.store(false, Ordering::Release);

        let epoch = {
            let mut current = self.current.write();
            let epoch = self.gate.epoch() + 1;
            *current = Some(Arc::new(LiveConnection::new(epoch, conn)));
            let opened = self.gate.open();
            debug_assert_eq!(opened, epoch);
            epoch
        };

        info!(epoch, "RCON connection established successfully");
        let _ = self.events.send(SupervisorEvent::Ready { epoch });
    }

    async fn close_retired(&self) {
        let retired = std::mem::take(&mut *self.retired.lock());
        for live in retired {
            let epoch = live.epoch();
            if tokio::time::timeout(self.config.dial_timeout, live.close())
                .await
                .is_err()
            {
                debug!(epoch, "timed out closing retired connection");
            }
        }
    }

    async fn teardown(&self) {
        self.gate.shut_down();

        let live = self.current.write().take();
        if let Some(live) = live {
            self.retired.lock().push(live);
        }
        self.close_retired().await;

        info!("RCON supervisor stopped");
        let _ = self.events.send(SupervisorEvent::ShutDown);
    }
}
