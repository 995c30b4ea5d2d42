//! Non-blocking datagram drain
//!
//! Pulls everything currently queued on the socket, one datagram per
//! call, decoding each into a [`Packet`]. Malformed datagrams are
//! counted and skipped; an empty socket is not an error.

use tokio::net::UdpSocket;
use tracing::warn;

use crate::error::NetworkError;
use crate::protocol::{Packet, MAX_DATAGRAM_SIZE};

/// Counters for the periodic stats line
#[derive(Debug, Default, Clone)]
pub struct ReceiverStats {
    pub packets_received: u64,
    pub bytes_received: u64,
    pub invalid_datagrams: u64,
}

/// Decoding receiver over a bound socket
pub struct PacketReceiver {
    socket: UdpSocket,
    buf: Box<[u8]>,
    stats: ReceiverStats,
}

impl PacketReceiver {
    pub fn new(socket: UdpSocket) -> Self {
        Self {
            socket,
            // One spare byte so an oversized datagram is detectable
            // instead of silently truncated
            buf: vec![0u8; MAX_DATAGRAM_SIZE + 1].into_boxed_slice(),
            stats: ReceiverStats::default(),
        }
    }

    /// One non-blocking receive. `Ok(None)` means the socket has nothing
    /// pending this instant; malformed datagrams are skipped internally.
    pub fn try_recv_packet(&mut self) -> Result<Option<Packet>, NetworkError> {
        loop {
            match self.socket.try_recv_from(&mut self.buf) {
                Ok((len, _peer)) => match Packet::decode(&self.buf[..len]) {
                    Ok(packet) => {
                        self.stats.packets_received += 1;
                        self.stats.bytes_received += len as u64;
                        return Ok(Some(packet));
                    }
                    Err(e) => {
                        self.stats.invalid_datagrams += 1;
                        warn!("discarding invalid datagram ({len} bytes): {e}");
                    }
                },
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) => return Err(NetworkError::ReceiveFailed(e.to_string())),
            }
        }
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }
}
