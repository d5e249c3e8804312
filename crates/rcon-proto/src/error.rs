//! Error types for the rcon-proto crate.

use thiserror::Error;

/// Errors that can occur while framing RCON packets.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Underlying I/O failure on the framed stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Declared packet size is below the protocol minimum.
    #[error("packet too small: declared size {0}")]
    PacketTooSmall(i32),

    /// Declared packet size exceeds the inbound limit.
    #[error("packet too large: declared size {size}, limit {limit}")]
    PacketTooLarge {
        /// Size announced in the packet header.
        size: usize,
        /// Configured inbound limit.
        limit: usize,
    },

    /// Outbound body does not fit in a single packet.
    #[error("body too large: {len} bytes, limit {limit}")]
    BodyTooLarge {
        /// Body length in bytes.
        len: usize,
        /// Maximum body length.
        limit: usize,
    },

    /// Command text was empty.
    #[error("command must not be empty")]
    EmptyCommand,

    /// Server replied with a packet that does not fit the exchange.
    #[error("unexpected packet: id {id}, type {kind}")]
    UnexpectedPacket {
        /// Packet id received.
        id: i32,
        /// Raw packet type received.
        kind: i32,
    },
}
