//! Readiness gate between the supervisor and waiting callers.
//!
//! Backed by a `tokio::sync::watch` channel: every waiter looks at the latest
//! published value rather than competing for a one-shot signal, so a
//! transition can never be consumed by one caller and missed by the rest.
//! Each transition to [`ConnectionState::Ready`] bumps the epoch, which lets a
//! caller that just watched a connection die wait for a *newer* one.

use tokio::sync::watch;
use tokio::time::{timeout_at, Instant};

use crate::error::ConsoleError;
use crate::state::ConnectionState;

/// Snapshot of what the gate currently publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    /// Current connection state.
    pub state: ConnectionState,
    /// Number of transitions to `Ready` so far.
    pub epoch: u64,
    /// Set once the supervisor has stopped.
    pub shut_down: bool,
}

impl Readiness {
    fn is_ready_after(&self, epoch: u64) -> bool {
        self.state == ConnectionState::Ready && self.epoch > epoch
    }
}

/// Broadcast gate that callers wait on until the connection is usable.
#[derive(Debug)]
pub struct ReadinessGate {
    tx: watch::Sender<Readiness>,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessGate {
    /// A closed gate at epoch 0.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Readiness::default());
        Self { tx }
    }

    /// Latest published value.
    #[must_use]
    pub fn snapshot(&self) -> Readiness {
        *self.tx.borrow()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.snapshot().state
    }

    /// Whether the connection is currently usable.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Epoch of the most recent transition to `Ready`.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.snapshot().epoch
    }

    /// Wait until ready at any epoch, or until `deadline`.
    pub async fn wait_ready(&self, deadline: Instant) -> Result<u64, ConsoleError> {
        timeout_at(deadline, self.wait_ready_after(0))
            .await
            .map_err(|_| ConsoleError::ReadinessTimeout)?
    }

    /// Wait until ready at an epoch strictly newer than `epoch`.
    ///
    /// Cancel-safe: dropping the future consumes nothing.
    pub async fn wait_ready_after(&self, epoch: u64) -> Result<u64, ConsoleError> {
        let mut rx = self.tx.subscribe();
        let readiness = *rx
            .wait_for(|r| r.shut_down || r.is_ready_after(epoch))
            .await
            .map_err(|_| ConsoleError::ShutDown)?;

        if readiness.shut_down {
            return Err(ConsoleError::ShutDown);
        }
        Ok(readiness.epoch)
    }

    /// Publish a non-ready state. Leaves the epoch untouched.
    pub(crate) fn set_state(&self, state: ConnectionState) {
        debug_assert_ne!(state, ConnectionState::Ready, "use open() to become ready");
        self.tx.send_modify(|r| r.state = state);
    }

    /// Publish `Ready` at the next epoch and return it.
    pub(crate) fn open(&self) -> u64 {
        let mut epoch = 0;
        self.tx.send_modify(|r| {
            r.epoch += 1;
            r.state = ConnectionState::Ready;
            epoch = r.epoch;
        });
        epoch
    }

    /// Close for good and release every waiter with [`ConsoleError::ShutDown`].
    pub(crate) fn shut_down(&self) {
        self.tx.send_modify(|r| {
            r.state = ConnectionState::Disconnected;
            r.shut_down = true;
        });
    }
}
