//! Packet framer and redundant transmitter
//!
//! The framer turns captured chunks into position-tagged packets; the
//! sender puts each packet on the wire twice. The duplicate send trades
//! double bandwidth for resilience to isolated datagram loss; the
//! receiver's overwrite semantics make the copy harmless.

use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::error::NetworkError;
use crate::protocol::Packet;

/// Assigns contiguous stream positions to outgoing chunks
pub struct PacketFramer {
    position: u64,
}

impl PacketFramer {
    pub fn new() -> Self {
        Self { position: 0 }
    }

    /// Build the next packet and advance the running position by the
    /// payload length. Positions are strictly increasing and contiguous.
    pub fn frame(&mut self, payload: Bytes, time_ns: u64) -> Result<Packet, NetworkError> {
        let packet = Packet::new(self.position, time_ns, payload)?;
        self.position += packet.payload_len() as u64;
        Ok(packet)
    }

    pub fn position(&self) -> u64 {
        self.position
    }
}

impl Default for PacketFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters for the periodic stats line
#[derive(Debug, Default, Clone)]
pub struct SenderStats {
    pub packets_framed: u64,
    pub datagrams_sent: u64,
    pub bytes_sent: u64,
    pub send_failures: u64,
}

/// Frames captured chunks and transmits them over a connected socket
pub struct AudioSender {
    socket: UdpSocket,
    framer: PacketFramer,
    stats: SenderStats,
}

impl AudioSender {
    pub fn new(socket: UdpSocket) -> Self {
        Self {
            socket,
            framer: PacketFramer::new(),
            stats: SenderStats::default(),
        }
    }

    /// Frame one chunk and send it twice, back to back. Sends are best
    /// effort: a failed datagram is counted and forgotten, never retried,
    /// since absorbing loss is the receiver's job. Returns the stream
    /// position after this chunk.
    pub fn transmit(&mut self, payload: Bytes, time_ns: u64) -> Result<u64, NetworkError> {
        let packet = self.framer.frame(payload, time_ns)?;
        let wire = packet.encode();
        self.stats.packets_framed += 1;

        // In case of packet loss...
        for _ in 0..2 {
            match self.socket.try_send(&wire) {
                Ok(sent) => {
                    self.stats.datagrams_sent += 1;
                    self.stats.bytes_sent += sent as u64;
                }
                Err(e) => {
                    self.stats.send_failures += 1;
                    debug!("send failed: {e}");
                }
            }
        }

        Ok(self.framer.position())
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }
}
