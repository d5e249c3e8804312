//! Transport capability consumed by the supervisor.
//!
//! The supervisor only ever talks to a [`Connector`] and the [`Connection`]s
//! it produces, so the TCP implementation in [`crate::tcp`] can be swapped
//! for [`crate::fake::FakeConnector`] in tests.

use std::fmt;
use std::future::Future;

use crate::error::TransportError;

/// Where the console lives and how to authenticate to it.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Hostname or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Shared RCON secret.
    pub password: String,
}

impl Endpoint {
    /// Create an endpoint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            password: password.into(),
        }
    }

    /// `host:port`, bracketing IPv6 literals.
    #[must_use]
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opens connections to an endpoint.
pub trait Connector: Send + Sync + 'static {
    /// Connection type produced by this connector.
    type Connection: Connection;

    /// Open and authenticate a new connection.
    fn dial(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// One open console connection.
///
/// `&mut self` on [`Connection::execute`] makes "one command in flight" a
/// property of the type.
pub trait Connection: Send + 'static {
    /// Send a command and wait for its reply.
    fn execute(
        &mut self,
        command: &str,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;

    /// Close the connection.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
