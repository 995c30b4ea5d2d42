//! # LAN Intercom
//!
//! Low-latency point-to-point audio intercom over UDP.
//!
//! One host captures a mono audio stream and sends it, chunk by chunk, as
//! position-tagged datagrams; the other reconstructs it in real time despite
//! loss, reordering, duplication, and clock drift between the two machines'
//! audio hardware.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────── SENDER ────────────────────────┐
//! │  Microphone ─▶ Capture (audio::capture)                │
//! │                  │ mono / 8 kHz / A-law bytes          │
//! │                  ▼                                     │
//! │  Packet framer (net::sender)                           │
//! │    [position | timestamp | payload], sent twice        │
//! └────────────────────────┬───────────────────────────────┘
//!                          │ UDP (unreliable, unordered)
//! ┌────────────────────────▼─────────────── RECEIVER ──────┐
//! │  Datagram drain (net::receiver)                        │
//! │                  │                                     │
//! │                  ▼                                     │
//! │  Position mapper + jitter window (sync)                │
//! │    position − sender_offset ─▶ window index            │
//! │                  │                                     │
//! │                  ├─▶ rate controller (sync::rate)      │
//! │                  ▼                                     │
//! │  Playback drain ─▶ Speaker (audio::playback)           │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! The receiver's synchronization engine is the heart of the crate: it maps
//! the sender's globally increasing byte position onto a fixed-size local
//! window, recovers hard from unrecoverable drift, and continuously nudges
//! the playback rate so the local drain speed converges on the sender's
//! capture speed.

pub mod audio;
pub mod clock;
pub mod config;
pub mod error;
pub mod net;
pub mod protocol;
pub mod sync;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    use std::time::Duration;

    /// Nominal stream sample rate (mono, one byte per sample)
    pub const NOMINAL_SAMPLE_RATE: f64 = 8000.0;

    /// Maximum packet payload size in bytes
    pub const MAX_PAYLOAD_SIZE: usize = 4096;

    /// Wire header size: 8 bytes position + 8 bytes timestamp
    pub const PACKET_HEADER_SIZE: usize = 16;

    /// Jitter window capacity in bytes (one second of stream at nominal rate)
    pub const JITTER_WINDOW_SIZE: usize = 8000;

    /// Lead time the receiver keeps between buffered audio and its deadline
    pub const TARGET_LATENCY_SECS: f64 = 0.05;

    /// EWMA blend for the smoothed window fill level
    pub const LOCAL_POSITION_BLEND: f64 = 0.05;

    /// EWMA blend for playback-rate convergence
    pub const SAMPLE_RATE_BLEND: f64 = 0.0005;

    /// Rates outside this open band are never applied to the device
    pub const MIN_APPLIED_RATE: f64 = 4000.0;
    pub const MAX_APPLIED_RATE: f64 = 12000.0;

    /// Capture fragment size handed to the framer, in stream bytes
    pub const CAPTURE_FRAGMENT_SIZE: usize = 800;

    /// Playback ring capacity in stream bytes; bounds per-tick drain requests
    pub const PLAYBACK_RING_SIZE: usize = 400;

    /// Control-loop polling quantum
    pub const TICK_INTERVAL: Duration = Duration::from_millis(5);

    /// Receive buffer requested for the listening socket
    pub const RECV_BUFFER_SIZE: usize = 1 << 20;
}
