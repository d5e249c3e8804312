//! # rcon-supervisor
//!
//! A self-healing remote console connection shared by many concurrent
//! callers.
//!
//! A [`Supervisor`] owns the single connection to the game server's RCON
//! port. It dials and health-checks in the background, backing off between
//! failures, and publishes readiness through a [`ReadinessGate`]. Callers go
//! through a [`Console`], which waits for readiness, serializes commands on
//! the connection, and transparently retries a command on a fresh connection
//! when the old one turns out to be dead.
//!
//! ```no_run
//! use std::time::Duration;
//! use rcon_supervisor::{Console, ConsoleConfig};
//!
//! # async fn run() -> Result<(), rcon_supervisor::ConsoleError> {
//! let config = ConsoleConfig::default();
//! let console = Console::start(config.connector(), config.endpoint(), config.supervisor_config());
//! let version = console.execute_timeout("/version", Duration::from_secs(15)).await?;
//! println!("{version}");
//! console.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod classify;
pub mod config;
pub mod console;
pub mod error;
pub mod events;
pub mod fake;
pub mod gate;
pub mod reconnect;
pub mod state;
pub mod supervisor;
pub mod tcp;
pub mod transport;

pub use classify::{classify, is_connection_lost, FailureClass};
pub use config::{ConsoleConfig, ReconnectSection, RconSection};
pub use console::{Console, DEFAULT_COMMAND_TIMEOUT};
pub use error::{ConsoleError, DialError, TransportError};
pub use events::SupervisorEvent;
pub use gate::{Readiness, ReadinessGate};
pub use reconnect::{calculate_backoff, ReconnectConfig};
pub use state::ConnectionState;
pub use supervisor::{Supervisor, SupervisorConfig};
pub use tcp::{RconConnection, RconConnector};
pub use transport::{Connection, Connector, Endpoint};
