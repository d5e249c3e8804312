//! Length-prefixed framing for RCON packets.
//!
//! Wire layout, all integers little-endian:
//!
//! ```text
//! | size: i32 | id: i32 | type: i32 | body ... | 0x00 | 0x00 |
//! ```
//!
//! `size` counts everything after itself.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtoError;
use crate::packet::{Packet, PacketType, MAX_BODY_SIZE, MIN_PACKET_SIZE, PADDING_SIZE};

/// Default cap on the size field of inbound packets.
///
/// Console replies such as `/help` are much larger than the outbound limit.
pub const DEFAULT_MAX_INBOUND_SIZE: usize = 64 * 1024;

const SIZE_FIELD: usize = 4;

/// Codec for use with `tokio_util::codec::Framed`.
#[derive(Debug, Clone)]
pub struct RconCodec {
    max_inbound_size: usize,
}

impl Default for RconCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl RconCodec {
    /// Codec with the default inbound limit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_inbound_size: DEFAULT_MAX_INBOUND_SIZE,
        }
    }

    /// Override the inbound size limit.
    #[must_use]
    pub const fn with_max_inbound_size(mut self, limit: usize) -> Self {
        self.max_inbound_size = limit;
        self
    }

    /// Current inbound size limit.
    #[must_use]
    pub const fn max_inbound_size(&self) -> usize {
        self.max_inbound_size
    }
}

impl Decoder for RconCodec {
    type Item = Packet;
    type Error = ProtoError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, ProtoError> {
        if src.len() < SIZE_FIELD {
            return Ok(None);
        }

        let declared = i32::from_le_bytes([src[0], src[1], src[2], src[3]]);
        if declared < MIN_PACKET_SIZE as i32 {
            return Err(ProtoError::PacketTooSmall(declared));
        }
        let size = declared as usize;
        if size > self.max_inbound_size {
            return Err(ProtoError::PacketTooLarge {
                size,
                limit: self.max_inbound_size,
            });
        }

        let frame_len = SIZE_FIELD + size;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(SIZE_FIELD);
        let id = src.get_i32_le();
        let kind = PacketType::from_raw(src.get_i32_le());
        let body_len = size - MIN_PACKET_SIZE;
        let body = String::from_utf8_lossy(&src[..body_len]).into_owned();
        src.advance(body_len + PADDING_SIZE);

        Ok(Some(Packet { id, kind, body }))
    }
}

impl Encoder<Packet> for RconCodec {
    type Error = ProtoError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<(), ProtoError> {
        let body = packet.body.as_bytes();
        if body.len() > MAX_BODY_SIZE {
            return Err(ProtoError::BodyTooLarge {
                len: body.len(),
                limit: MAX_BODY_SIZE,
            });
        }

        let size = packet.wire_size();
        dst.reserve(SIZE_FIELD + size);
        dst.put_i32_le(size as i32);
        dst.put_i32_le(packet.id);
        dst.put_i32_le(packet.kind.raw());
        dst.put_slice(body);
        dst.put_bytes(0, PADDING_SIZE);
        Ok(())
    }
}
