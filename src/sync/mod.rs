//! Receiver-side synchronization engine
//!
//! Absorbs arbitrarily ordered, duplicated, or lost packets into a jitter
//! window, recovers hard when the positional mapping becomes invalid, and
//! drives the adaptive playback-rate controller from each accepted packet.

pub mod rate;
pub mod window;

pub use rate::RateController;
pub use window::JitterWindow;

use tracing::{debug, warn};

use crate::audio::PlaybackSink;
use crate::config::SyncConfig;
use crate::protocol::Packet;

/// Outcome of feeding one packet into the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketVerdict {
    /// Payload written into the window, rate loop updated
    Accepted,
    /// Ideal play time already passed; dropped without touching the window
    Late,
    /// Local origin drifted past the packet's position; hard resync
    ResyncAhead,
    /// Packet no longer fits at the window's far end; hard resync
    ResyncBehind,
}

/// Counters for the periodic stats line
#[derive(Debug, Default, Clone)]
pub struct SyncStats {
    pub accepted: u64,
    pub late: u64,
    pub resyncs_ahead: u64,
    pub resyncs_behind: u64,
    pub bytes_played: u64,
}

/// Position mapper, buffer-health policy, and rate loop in one place.
///
/// Owned by the receiver's single control loop; every method takes `&mut
/// self`, so the policy is atomic with respect to itself.
pub struct StreamSync {
    window: JitterWindow,
    rate: RateController,
    target_latency: f64,
    stats: SyncStats,
}

impl StreamSync {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            window: JitterWindow::new(config.window_size),
            rate: RateController::new(config),
            target_latency: config.target_latency_secs,
            stats: SyncStats::default(),
        }
    }

    /// Map one received packet into the window and update the rate loop.
    ///
    /// Policy order matters: lateness first (no mutation), then the two
    /// drift directions (hard resync, sacrificing buffered audio for
    /// alignment), then the steady-state write.
    pub fn handle_packet(&mut self, packet: &Packet, now_ns: u64) -> PacketVerdict {
        let target_ns = (self.target_latency * 1e9) as i128;
        let play_in = (packet.time as i128 + target_ns - now_ns as i128) as f64 / 1e9;
        let local = self.window.local_position(packet.position);

        debug!(
            play_in_secs = play_in,
            local_position = local,
            "packet mapped"
        );

        if play_in < 0.0 {
            self.stats.late += 1;
            debug!(position = packet.position, "packet arrived too late");
            return PacketVerdict::Late;
        }

        if local < 0 {
            self.stats.resyncs_ahead += 1;
            warn!(position = packet.position, "playback too far ahead, resynchronizing");
            self.resync(packet.position);
            return PacketVerdict::ResyncAhead;
        }

        if !self.window.fits(local, packet.payload_len()) {
            self.stats.resyncs_behind += 1;
            warn!(position = packet.position, "playback too far behind, resynchronizing");
            self.resync(packet.position);
            return PacketVerdict::ResyncBehind;
        }

        let wrote = self.window.write_at(local, &packet.payload);
        debug_assert!(wrote, "write inside checked bounds");
        self.rate.observe(local as f64, play_in);
        self.stats.accepted += 1;
        PacketVerdict::Accepted
    }

    /// Re-center the window so the triggering packet maps one target
    /// latency's worth of samples from the front, then restart the rate
    /// loop at nominal. The packet's own payload is sacrificed.
    fn resync(&mut self, position: u64) {
        let lead = (self.rate.rate() * self.target_latency).round() as u64;
        self.window.reset(position.saturating_sub(lead));
        let local = self.window.local_position(position) as f64;
        self.rate.reset(local);
    }

    /// One playback-drain tick: write whatever the device asks for from
    /// the window front, then slide the window. Returns the bytes played.
    ///
    /// A failed device write abandons the tick without mutating the
    /// window; the same bytes are offered again next tick.
    pub fn drain_tick(&mut self, sink: &mut dyn PlaybackSink) -> usize {
        if !sink.is_ready() {
            return 0;
        }

        let requested = sink.writable_bytes().min(self.window.capacity());
        if requested == 0 {
            return 0;
        }

        if sink.is_corked() {
            sink.uncork();
        }

        match sink.write(self.window.front(requested)) {
            Ok(()) => {
                self.window.consume(requested);
                self.stats.bytes_played += requested as u64;
                requested
            }
            Err(e) => {
                warn!("could not write to playback stream: {e}");
                0
            }
        }
    }

    /// The rate to push to the device, when inside the apply band
    pub fn device_rate(&self) -> Option<u32> {
        self.rate.device_rate()
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    #[cfg(test)]
    fn force_sync(&mut self, sender_offset: u64) {
        self.window.reset(sender_offset);
        self.rate.reset(0.0);
    }

    #[cfg(test)]
    fn window(&self) -> &JitterWindow {
        &self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::MockSink;
    use bytes::Bytes;

    const NS: u64 = 1_000_000_000;
    /// A plausible "now", far from both zero and overflow
    const T0: u64 = 1_700_000_000 * NS;

    fn engine() -> StreamSync {
        StreamSync::new(&SyncConfig::default())
    }

    fn packet(position: u64, time: u64, len: usize) -> Packet {
        Packet::new(position, time, Bytes::from(vec![0xABu8; len])).unwrap()
    }

    #[test]
    fn first_packet_forces_a_resync() {
        let mut sync = engine();
        let verdict = sync.handle_packet(&packet(0, T0, 160), T0 + 10_000_000);
        assert!(matches!(
            verdict,
            PacketVerdict::ResyncAhead | PacketVerdict::ResyncBehind
        ));
        // After the resync the mapping is live: the next contiguous packet
        // is accepted.
        let verdict = sync.handle_packet(&packet(160, T0, 160), T0 + 10_000_000);
        assert_eq!(verdict, PacketVerdict::Accepted);
    }

    #[test]
    fn late_packet_dropped_without_mutation() {
        let mut sync = engine();
        sync.force_sync(0);

        // Sent 100 ms ago: even with the 50 ms cushion its deadline passed
        let verdict = sync.handle_packet(&packet(0, T0 - 100_000_000, 160), T0);

        assert_eq!(verdict, PacketVerdict::Late);
        assert_eq!(sync.stats().late, 1);
        assert!(sync.window().contents().iter().all(|&b| b == 0));
        assert_eq!(sync.window().sender_offset(), 0);
    }

    #[test]
    fn position_before_offset_resyncs_ahead() {
        let mut sync = engine();
        sync.force_sync(10_000);

        let verdict = sync.handle_packet(&packet(5_000, T0, 160), T0);
        assert_eq!(verdict, PacketVerdict::ResyncAhead);

        // Window fully zeroed, offset recomputed so the trigger packet maps
        // exactly target_latency * sample_rate = 400 bytes from the front.
        assert!(sync.window().contents().iter().all(|&b| b == 0));
        assert_eq!(sync.window().sender_offset(), 5_000 - 400);
        assert_eq!(sync.window().local_position(5_000), 400);
        assert_eq!(sync.stats().resyncs_ahead, 1);
    }

    #[test]
    fn position_past_window_end_resyncs_behind() {
        let mut sync = engine();
        sync.force_sync(0);

        // 7900 + 160 > 8000: does not fit
        let verdict = sync.handle_packet(&packet(7_900, T0, 160), T0);
        assert_eq!(verdict, PacketVerdict::ResyncBehind);
        assert_eq!(sync.window().sender_offset(), 7_900 - 400);
        assert_eq!(sync.stats().resyncs_behind, 1);
    }

    #[test]
    fn boundary_packet_still_fits() {
        let mut sync = engine();
        sync.force_sync(0);

        // 7840 + 160 == 8000 exactly: the edge is in bounds
        let verdict = sync.handle_packet(&packet(7_840, T0, 160), T0);
        assert_eq!(verdict, PacketVerdict::Accepted);
    }

    #[test]
    fn duplicate_transmission_is_idempotent() {
        let mut sync = engine();
        sync.force_sync(0);

        let p = packet(320, T0, 160);
        assert_eq!(sync.handle_packet(&p, T0), PacketVerdict::Accepted);
        let after_once = sync.window().contents().to_vec();
        assert_eq!(sync.handle_packet(&p, T0), PacketVerdict::Accepted);
        assert_eq!(sync.window().contents(), &after_once[..]);
    }

    /// Stream start, end to end: a 160-byte packet at position 0,
    /// arriving 10 ms after capture.
    #[test]
    fn end_to_end_first_packet() {
        let mut sync = engine();
        sync.force_sync(0);

        let now = T0 + 10_000_000;
        let verdict = sync.handle_packet(&packet(0, T0, 160), now);

        // play_in ≈ 0.04 s, local position 0: accepted, written, and the
        // on-target rate of 0 / 0.04 = 0 must not blow up the controller.
        assert_eq!(verdict, PacketVerdict::Accepted);
        assert_eq!(&sync.window().contents()[..160], &[0xABu8; 160]);
        assert_eq!(sync.device_rate(), Some(8000));
    }

    #[test]
    fn drain_noop_when_not_ready() {
        let mut sync = engine();
        sync.force_sync(0);
        let mut sink = MockSink::new(400);
        sink.ready = false;

        assert_eq!(sync.drain_tick(&mut sink), 0);
        assert!(sink.written.is_empty());
    }

    #[test]
    fn drain_noop_when_no_space() {
        let mut sync = engine();
        sync.force_sync(0);
        let mut sink = MockSink::new(0);

        assert_eq!(sync.drain_tick(&mut sink), 0);
    }

    #[test]
    fn drain_uncorks_then_writes_front() {
        let mut sync = engine();
        sync.force_sync(0);
        sync.handle_packet(&packet(0, T0, 160), T0);

        let mut sink = MockSink::new(100);
        sink.corked = true;

        assert_eq!(sync.drain_tick(&mut sink), 100);
        assert_eq!(sink.uncorks, 1);
        assert_eq!(sink.written, vec![0xABu8; 100]);
        assert_eq!(sync.window().sender_offset(), 100);
        // The remaining 60 payload bytes slid to the front
        assert_eq!(&sync.window().contents()[..60], &[0xABu8; 60]);
        assert_eq!(sync.stats().bytes_played, 100);
    }

    #[test]
    fn drain_request_clamped_to_window() {
        let mut sync = engine();
        sync.force_sync(0);
        let mut sink = MockSink::new(50_000);

        assert_eq!(sync.drain_tick(&mut sink), 8000);
        assert_eq!(sync.window().sender_offset(), 8000);
    }

    #[test]
    fn failed_write_abandons_the_tick() {
        let mut sync = engine();
        sync.force_sync(0);
        sync.handle_packet(&packet(0, T0, 160), T0);

        let mut sink = MockSink::new(100);
        sink.fail_writes = true;

        assert_eq!(sync.drain_tick(&mut sink), 0);
        assert_eq!(sync.window().sender_offset(), 0);
        assert_eq!(&sync.window().contents()[..160], &[0xABu8; 160]);
        assert_eq!(sync.stats().bytes_played, 0);
    }
}
