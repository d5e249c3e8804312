//! RCON packet model.

use std::fmt;

use crate::error::ProtoError;

/// Size of the `id` and `type` header fields.
pub const HEADER_SIZE: usize = 8;

/// Two trailing NUL bytes terminating every packet.
pub const PADDING_SIZE: usize = 2;

/// Smallest legal value of the size field (empty body).
pub const MIN_PACKET_SIZE: usize = HEADER_SIZE + PADDING_SIZE;

/// Largest body accepted for outbound packets.
pub const MAX_BODY_SIZE: usize = 4096;

/// Packet id a server answers with when authentication is rejected.
pub const AUTH_FAILED_ID: i32 = -1;

/// Raw RCON packet type.
///
/// The protocol reuses value `2` for both `SERVERDATA_AUTH_RESPONSE` and
/// `SERVERDATA_EXECCOMMAND`; the meaning depends on direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketType(i32);

impl PacketType {
    /// `SERVERDATA_AUTH`, client to server.
    pub const AUTH: Self = Self(3);
    /// `SERVERDATA_AUTH_RESPONSE`, server to client.
    pub const AUTH_RESPONSE: Self = Self(2);
    /// `SERVERDATA_EXECCOMMAND`, client to server.
    pub const EXEC_COMMAND: Self = Self(2);
    /// `SERVERDATA_RESPONSE_VALUE`, server to client.
    pub const RESPONSE_VALUE: Self = Self(0);

    /// Wrap a raw wire value.
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// The raw wire value.
    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single RCON packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Client-chosen request id, echoed by the server.
    pub id: i32,
    /// Packet type.
    pub kind: PacketType,
    /// ASCII/UTF-8 body without the trailing terminators.
    pub body: String,
}

impl Packet {
    /// Create a packet.
    #[must_use]
    pub fn new(id: i32, kind: PacketType, body: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    /// Authentication request carrying the password.
    #[must_use]
    pub fn auth(id: i32, password: impl Into<String>) -> Self {
        Self::new(id, PacketType::AUTH, password)
    }

    /// Command execution request.
    #[must_use]
    pub fn exec(id: i32, command: impl Into<String>) -> Self {
        Self::new(id, PacketType::EXEC_COMMAND, command)
    }

    /// Value of the size field this packet is framed with.
    #[must_use]
    pub fn wire_size(&self) -> usize {
        self.body.len() + MIN_PACKET_SIZE
    }

    /// Whether this is the server's rejection of an auth request.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        self.kind == PacketType::AUTH_RESPONSE && self.id == AUTH_FAILED_ID
    }
}

/// Check that a command can be sent in a single exec packet.
pub fn validate_command(command: &str) -> Result<(), ProtoError> {
    if command.trim().is_empty() {
        return Err(ProtoError::EmptyCommand);
    }
    if command.len() > MAX_BODY_SIZE {
        return Err(ProtoError::BodyTooLarge {
            len: command.len(),
            limit: MAX_BODY_SIZE,
        });
    }
    Ok(())
}
