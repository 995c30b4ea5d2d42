//! UDP socket construction
//!
//! Both sockets are built with socket2 and handed to tokio non-blocking:
//! the sender connects to a fixed peer, the receiver binds a local port
//! and accepts datagrams from any source (single-peer assumption).

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket as StdUdpSocket};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::error::NetworkError;

/// Resolve a peer host/port pair to the first usable address
pub fn resolve_peer(host: &str, port: u16) -> Result<SocketAddr, NetworkError> {
    (host, port)
        .to_socket_addrs()
        .map_err(|e| NetworkError::ResolveFailed(e.to_string()))?
        .next()
        .ok_or_else(|| NetworkError::ResolveFailed(format!("no addresses for {host}:{port}")))
}

/// Connected, non-blocking socket for the sender
pub fn connect_sender(peer: SocketAddr) -> Result<UdpSocket, NetworkError> {
    let socket = Socket::new(Domain::for_address(peer), Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| NetworkError::ConnectionFailed(e.to_string()))?;
    socket
        .connect(&peer.into())
        .map_err(|e| NetworkError::ConnectionFailed(e.to_string()))?;
    into_tokio(socket).map_err(|e| NetworkError::ConnectionFailed(e.to_string()))
}

/// Bound, non-blocking socket for the receiver
pub fn bind_receiver(port: u16, recv_buffer_size: usize) -> Result<UdpSocket, NetworkError> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| NetworkError::BindFailed(e.to_string()))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| NetworkError::BindFailed(e.to_string()))?;
    if let Err(e) = socket.set_recv_buffer_size(recv_buffer_size) {
        tracing::warn!("could not set receive buffer size: {e}");
    }
    socket
        .bind(&addr.into())
        .map_err(|e| NetworkError::BindFailed(e.to_string()))?;
    into_tokio(socket).map_err(|e| NetworkError::BindFailed(e.to_string()))
}

fn into_tokio(socket: Socket) -> std::io::Result<UdpSocket> {
    socket.set_nonblocking(true)?;
    let std_socket: StdUdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_numeric_addresses() {
        let addr = resolve_peer("127.0.0.1", 4000).unwrap();
        assert_eq!(addr.port(), 4000);
        assert!(addr.ip().is_loopback());
    }

    #[test]
    fn resolve_failure_is_reported() {
        let err = resolve_peer("host.invalid.", 4000).unwrap_err();
        assert!(matches!(err, NetworkError::ResolveFailed(_)));
    }

    #[tokio::test]
    async fn bind_and_connect_loopback() {
        let receiver = bind_receiver(0, 1 << 16).unwrap();
        let port = receiver.local_addr().unwrap().port();

        let sender = connect_sender(([127, 0, 0, 1], port).into()).unwrap();
        sender.send(b"ping").await.unwrap();

        let mut buf = [0u8; 16];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"ping");
    }
}
