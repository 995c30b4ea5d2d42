//! Audio subsystem boundary
//!
//! The synchronization engine never talks to audio hardware directly; it
//! sees two narrow, poll-driven contracts. The capture side is pumped for
//! typed events once per control-loop tick; the playback side answers
//! write-space queries and accepts data plus best-effort rate requests.
//! The cpal-backed adapters in [`capture`] and [`playback`] implement the
//! contracts for real devices, converting between the device's native
//! format and the stream's mono 8 kHz A-law bytes.

pub mod capture;
pub mod device;
pub mod g711;
pub mod playback;

pub use capture::AudioCapture;
pub use playback::AudioPlayback;

use bytes::Bytes;

use crate::error::AudioError;

/// Typed notification from a pumped capture endpoint
#[derive(Debug)]
pub enum CaptureEvent {
    /// The underlying stream reached its ready state
    StreamReady,
    /// A chunk of captured stream bytes, ready to frame and send
    Data(Bytes),
}

/// Capture side of the audio contract
pub trait CaptureSource {
    /// Pump pending events once, without blocking. Returns `None` when
    /// nothing is pending this tick.
    fn poll_event(&mut self) -> Option<CaptureEvent>;
}

/// Playback side of the audio contract
pub trait PlaybackSink {
    /// Whether the stream has reached its ready state
    fn is_ready(&self) -> bool;

    /// How many stream bytes the device will currently accept
    fn writable_bytes(&self) -> usize;

    fn is_corked(&self) -> bool;

    /// Resume a paused stream; playback free-runs once any data exists
    fn uncork(&mut self);

    /// Write stream bytes for playback. The caller never offers more than
    /// `writable_bytes()` reported in the same tick.
    fn write(&mut self, data: &[u8]) -> Result<(), AudioError>;

    /// Best-effort dynamic rate change, fire-and-forget; ignored (and
    /// logged) while the stream is not ready.
    fn request_rate(&mut self, rate: u32);
}

#[cfg(test)]
pub(crate) mod mock {
    use super::PlaybackSink;
    use crate::error::AudioError;

    /// Scriptable playback sink for engine tests
    pub struct MockSink {
        pub ready: bool,
        pub corked: bool,
        pub writable: usize,
        pub fail_writes: bool,
        pub written: Vec<u8>,
        pub uncorks: usize,
        pub rate_requests: Vec<u32>,
    }

    impl MockSink {
        pub fn new(writable: usize) -> Self {
            Self {
                ready: true,
                corked: false,
                writable,
                fail_writes: false,
                written: Vec::new(),
                uncorks: 0,
                rate_requests: Vec::new(),
            }
        }
    }

    impl PlaybackSink for MockSink {
        fn is_ready(&self) -> bool {
            self.ready
        }

        fn writable_bytes(&self) -> usize {
            self.writable
        }

        fn is_corked(&self) -> bool {
            self.corked
        }

        fn uncork(&mut self) {
            self.corked = false;
            self.uncorks += 1;
        }

        fn write(&mut self, data: &[u8]) -> Result<(), AudioError> {
            if self.fail_writes {
                return Err(AudioError::WriteFailed("mock failure".into()));
            }
            self.written.extend_from_slice(data);
            Ok(())
        }

        fn request_rate(&mut self, rate: u32) {
            self.rate_requests.push(rate);
        }
    }
}
