//! Wire packet format
//!
//! Each datagram carries a 16-byte header followed by an opaque audio
//! payload: 8 bytes stream position, 8 bytes capture timestamp in
//! nanoseconds since the epoch, both little-endian. The payload length is
//! not encoded; the receiver infers it from the datagram length.

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::{MAX_PAYLOAD_SIZE, PACKET_HEADER_SIZE};
use crate::error::NetworkError;

/// Largest datagram either side will produce or accept
pub const MAX_DATAGRAM_SIZE: usize = PACKET_HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// A single stream packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Byte offset of the payload's first byte in the unbounded logical stream
    pub position: u64,
    /// Sender's wall clock at capture, nanoseconds since the epoch
    pub time: u64,
    /// Opaque audio bytes, up to [`MAX_PAYLOAD_SIZE`]
    pub payload: Bytes,
}

impl Packet {
    pub fn new(position: u64, time: u64, payload: Bytes) -> Result<Self, NetworkError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(NetworkError::PacketTooLarge(payload.len()));
        }
        Ok(Self {
            position,
            time,
            payload,
        })
    }

    /// Serialize into a single datagram
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(PACKET_HEADER_SIZE + self.payload.len());
        buf.put_u64_le(self.position);
        buf.put_u64_le(self.time);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Parse a received datagram; the payload length is whatever follows the
    /// header. Runt datagrams are rejected, oversized ones as well.
    pub fn decode(datagram: &[u8]) -> Result<Self, NetworkError> {
        if datagram.len() < PACKET_HEADER_SIZE {
            return Err(NetworkError::InvalidPacket);
        }
        if datagram.len() > MAX_DATAGRAM_SIZE {
            return Err(NetworkError::PacketTooLarge(datagram.len()));
        }
        let mut field = [0u8; 8];
        field.copy_from_slice(&datagram[0..8]);
        let position = u64::from_le_bytes(field);
        field.copy_from_slice(&datagram[8..16]);
        let time = u64::from_le_bytes(field);
        Ok(Self {
            position,
            time,
            payload: Bytes::copy_from_slice(&datagram[PACKET_HEADER_SIZE..]),
        })
    }

    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Length of the encoded datagram
    pub fn wire_len(&self) -> usize {
        PACKET_HEADER_SIZE + self.payload.len()
    }
}
