//! Network subsystem for UDP stream transport

pub mod receiver;
pub mod sender;
pub mod udp;

pub use receiver::PacketReceiver;
pub use sender::{AudioSender, PacketFramer};
