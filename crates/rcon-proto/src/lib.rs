//! # rcon-proto
//!
//! Packet definitions and framing for the Source RCON protocol, the remote
//! console spoken by Factorio and other dedicated game servers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod codec;
pub mod error;
mod packet;

pub use codec::{RconCodec, DEFAULT_MAX_INBOUND_SIZE};
pub use error::ProtoError;
pub use packet::{
    validate_command, Packet, PacketType, AUTH_FAILED_ID, HEADER_SIZE, MAX_BODY_SIZE,
    MIN_PACKET_SIZE, PADDING_SIZE,
};
