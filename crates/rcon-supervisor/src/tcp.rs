//! TCP transport speaking Source RCON.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rcon_proto::{
    validate_command, Packet, PacketType, ProtoError, RconCodec, DEFAULT_MAX_INBOUND_SIZE,
};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_util::codec::Framed;
use tracing::{debug, trace};

use crate::error::TransportError;
use crate::transport::{Connection, Connector, Endpoint};

/// Default bound on TCP connect.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on a single request/reply exchange.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Dials RCON servers over TCP.
#[derive(Debug, Clone)]
pub struct RconConnector {
    dial_timeout: Duration,
    io_timeout: Duration,
    max_inbound_size: usize,
}

impl Default for RconConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl RconConnector {
    /// Connector with default timeouts.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            max_inbound_size: DEFAULT_MAX_INBOUND_SIZE,
        }
    }

    /// Bound on TCP connect.
    #[must_use]
    pub const fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Bound on each exchange, authentication included.
    #[must_use]
    pub const fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Largest inbound packet accepted.
    #[must_use]
    pub const fn with_max_inbound_size(mut self, limit: usize) -> Self {
        self.max_inbound_size = limit;
        self
    }

    /// Configured connect timeout.
    #[must_use]
    pub const fn dial_timeout(&self) -> Duration {
        self.dial_timeout
    }

    /// Configured exchange timeout.
    #[must_use]
    pub const fn io_timeout(&self) -> Duration {
        self.io_timeout
    }
}

impl Connector for RconConnector {
    type Connection = RconConnection;

    async fn dial(&self, endpoint: &Endpoint) -> Result<RconConnection, TransportError> {
        let address = endpoint.address();
        let stream = timeout(self.dial_timeout, TcpStream::connect(address.as_str()))
            .await
            .map_err(|_| TransportError::Timeout(self.dial_timeout))??;
        stream.set_nodelay(true)?;

        let codec = RconCodec::new().with_max_inbound_size(self.max_inbound_size);
        let mut conn = RconConnection {
            framed: Framed::new(stream, codec),
            io_timeout: self.io_timeout,
            last_id: 0,
            broken: false,
        };
        conn.authenticate(&endpoint.password).await?;

        debug!(%address, "RCON authenticated");
        Ok(conn)
    }
}

/// An authenticated RCON session.
///
/// Once the stream fails or goes out of sync every further call returns
/// [`TransportError::Closed`].
pub struct RconConnection {
    framed: Framed<TcpStream, RconCodec>,
    io_timeout: Duration,
    last_id: i32,
    broken: bool,
}

impl RconConnection {
    fn next_id(&mut self) -> i32 {
        self.last_id = if self.last_id >= i32::MAX { 1 } else { self.last_id + 1 };
        self.last_id
    }

    async fn send(&mut self, packet: Packet, deadline: Instant) -> Result<(), TransportError> {
        match timeout_at(deadline, self.framed.send(packet)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.broken = true;
                Err(e.into())
            }
            Err(_) => {
                // A partially written frame leaves the stream unusable.
                self.broken = true;
                Err(TransportError::Timeout(self.io_timeout))
            }
        }
    }

    async fn recv(&mut self, deadline: Instant) -> Result<Packet, TransportError> {
        match timeout_at(deadline, self.framed.next()).await {
            Ok(Some(Ok(packet))) => Ok(packet),
            Ok(Some(Err(e))) => {
                self.broken = true;
                Err(e.into())
            }
            Ok(None) => {
                self.broken = true;
                Err(TransportError::Closed)
            }
            Err(_) => Err(TransportError::Timeout(self.io_timeout)),
        }
    }

    async fn authenticate(&mut self, password: &str) -> Result<(), TransportError> {
        let id = self.next_id();
        let deadline = Instant::now() + self.io_timeout;
        self.send(Packet::auth(id, password), deadline).await?;

        loop {
            let packet = self.recv(deadline).await?;
            if packet.is_auth_failure() {
                return Err(TransportError::AuthFailed);
            }
            if packet.kind == PacketType::RESPONSE_VALUE && packet.body.is_empty() {
                trace!(id = packet.id, "skipping empty value before auth response");
                continue;
            }
            if packet.kind == PacketType::AUTH_RESPONSE && packet.id == id {
                return Ok(());
            }
            self.broken = true;
            return Err(ProtoError::UnexpectedPacket {
                id: packet.id,
                kind: packet.kind.raw(),
            }
            .into());
        }
    }
}

impl Connection for RconConnection {
    async fn execute(&mut self, command: &str) -> Result<String, TransportError> {
        if self.broken {
            return Err(TransportError::Closed);
        }
        validate_command(command)?;

        let id = self.next_id();
        let deadline = Instant::now() + self.io_timeout;
        self.send(Packet::exec(id, command), deadline).await?;

        loop {
            let packet = self.recv(deadline).await?;
            if packet.id == id && packet.kind == PacketType::RESPONSE_VALUE {
                return Ok(packet.body);
            }
            trace!(
                id = packet.id,
                expected = id,
                kind = %packet.kind,
                "discarding reply to an earlier request"
            );
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.broken = true;
        match <Framed<TcpStream, RconCodec> as SinkExt<Packet>>::close(&mut self.framed).await {
            Ok(()) => Ok(()),
            Err(ProtoError::Io(e)) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcon_proto::AUTH_FAILED_ID;
    use std::future::Future;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    type ServerStream = Framed<TcpStream, RconCodec>;

    async fn serve_once<F, Fut>(handler: F) -> (SocketAddr, JoinHandle<()>)
    where
        F: FnOnce(ServerStream) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            handler(Framed::new(stream, RconCodec::new())).await;
        });
        (addr, handle)
    }

    async fn accept_auth(server: &mut ServerStream, password: &str) -> bool {
        let packet = server.next().await.expect("auth packet").expect("decode");
        assert_eq!(packet.kind, PacketType::AUTH);
        let ok = packet.body == password;
        let id = if ok { packet.id } else { AUTH_FAILED_ID };
        server
            .send(Packet::new(id, PacketType::AUTH_RESPONSE, ""))
            .await
            .expect("send auth response");
        ok
    }

    fn endpoint(addr: SocketAddr, password: &str) -> Endpoint {
        Endpoint::new(addr.ip().to_string(), addr.port(), password)
    }

    #[tokio::test]
    async fn test_auth_and_execute() {
        let (addr, server) = serve_once(|mut server| async move {
            assert!(accept_auth(&mut server, "secret").await);
            let request = server.next().await.expect("exec").expect("decode");
            assert_eq!(request.kind, PacketType::EXEC_COMMAND);
            assert_eq!(request.body, "/version");
            server
                .send(Packet::new(request.id, PacketType::RESPONSE_VALUE, "1.1.110"))
                .await
                .expect("reply");
        })
        .await;

        let mut conn = RconConnector::new()
            .dial(&endpoint(addr, "secret"))
            .await
            .expect("dial");
        assert_eq!(conn.execute("/version").await.expect("execute"), "1.1.110");
        server.await.expect("server");
    }

    #[tokio::test]
    async fn test_wrong_password_is_auth_failed() {
        let (addr, server) = serve_once(|mut server| async move {
            assert!(!accept_auth(&mut server, "secret").await);
        })
        .await;

        let result = RconConnector::new().dial(&endpoint(addr, "wrong")).await;
        assert!(matches!(result, Err(TransportError::AuthFailed)));
        server.await.expect("server");
    }

    #[tokio::test]
    async fn test_empty_value_before_auth_response_is_skipped() {
        let (addr, server) = serve_once(|mut server| async move {
            let packet = server.next().await.expect("auth").expect("decode");
            server
                .send(Packet::new(packet.id, PacketType::RESPONSE_VALUE, ""))
                .await
                .expect("empty value");
            server
                .send(Packet::new(packet.id, PacketType::AUTH_RESPONSE, ""))
                .await
                .expect("auth response");
        })
        .await;

        RconConnector::new()
            .dial(&endpoint(addr, "secret"))
            .await
            .expect("dial");
        server.await.expect("server");
    }

    #[tokio::test]
    async fn test_stale_replies_are_discarded() {
        let (addr, server) = serve_once(|mut server| async move {
            assert!(accept_auth(&mut server, "secret").await);
            let request = server.next().await.expect("exec").expect("decode");
            server
                .send(Packet::new(request.id - 1, PacketType::RESPONSE_VALUE, "old"))
                .await
                .expect("stale");
            server
                .send(Packet::new(request.id, PacketType::RESPONSE_VALUE, "fresh"))
                .await
                .expect("reply");
        })
        .await;

        let mut conn = RconConnector::new()
            .dial(&endpoint(addr, "secret"))
            .await
            .expect("dial");
        assert_eq!(conn.execute("/time").await.expect("execute"), "fresh");
        server.await.expect("server");
    }

    #[tokio::test]
    async fn test_server_hangup_is_closed() {
        let (addr, server) = serve_once(|mut server| async move {
            assert!(accept_auth(&mut server, "secret").await);
        })
        .await;

        let mut conn = RconConnector::new()
            .dial(&endpoint(addr, "secret"))
            .await
            .expect("dial");
        server.await.expect("server");

        let err = conn.execute("/time").await.expect_err("closed");
        assert!(crate::classify::is_connection_lost(&err), "got {err:?}");
        assert!(matches!(conn.execute("/time").await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_reply_timeout_keeps_connection_and_discards_late_reply() {
        let (addr, server) = serve_once(|mut server| async move {
            assert!(accept_auth(&mut server, "secret").await);
            // Answer the first request only after the second arrives.
            let first = server.next().await.expect("first").expect("decode");
            let second = server.next().await.expect("second").expect("decode");
            server
                .send(Packet::new(first.id, PacketType::RESPONSE_VALUE, "too late"))
                .await
                .expect("late reply");
            server
                .send(Packet::new(second.id, PacketType::RESPONSE_VALUE, "late but fine"))
                .await
                .expect("reply");
        })
        .await;

        let mut conn = RconConnector::new()
            .with_io_timeout(Duration::from_millis(100))
            .dial(&endpoint(addr, "secret"))
            .await
            .expect("dial");

        let err = conn.execute("/first").await.expect_err("timeout");
        assert!(matches!(err, TransportError::Timeout(_)));
        assert_eq!(conn.execute("/second").await.expect("second"), "late but fine");
        server.await.expect("server");
    }

    #[tokio::test]
    async fn test_oversized_command_is_rejected_locally() {
        let (addr, server) = serve_once(|mut server| async move {
            assert!(accept_auth(&mut server, "secret").await);
        })
        .await;

        let mut conn = RconConnector::new()
            .dial(&endpoint(addr, "secret"))
            .await
            .expect("dial");
        let err = conn.execute(&"x".repeat(5000)).await.expect_err("too large");
        assert!(matches!(err, TransportError::Protocol(ProtoError::BodyTooLarge { .. })));
        server.await.expect("server");
    }
}
