//! Adaptive playback-rate controller
//!
//! Estimates the sender's capture rate relative to the local playback clock
//! from each accepted packet's window position and deadline, then steers the
//! playback rate toward it slowly enough to ride out jitter.
//!
//! Two guards keep the loop stable: a directional gate that only moves the
//! rate when the single-packet estimate agrees with the smoothed buffer-fill
//! trend, and an apply band outside which a computed rate is held internally
//! but never sent to the device.

use crate::config::SyncConfig;

pub struct RateController {
    nominal_rate: f64,
    rate: f64,
    local_position_avg: f64,
    local_position_blend: f64,
    rate_blend: f64,
    min_applied: f64,
    max_applied: f64,
}

impl RateController {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            nominal_rate: config.nominal_sample_rate,
            rate: config.nominal_sample_rate,
            local_position_avg: 0.0,
            local_position_blend: config.local_position_blend,
            rate_blend: config.sample_rate_blend,
            min_applied: config.min_applied_rate,
            max_applied: config.max_applied_rate,
        }
    }

    /// Current playback rate in samples per second
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Smoothed window fill level the gate compares against
    pub fn local_position_avg(&self) -> f64 {
        self.local_position_avg
    }

    /// The rate to hand to the playback device, if it is inside the sane
    /// band. Out-of-band values are computed but never applied.
    pub fn device_rate(&self) -> Option<u32> {
        (self.rate > self.min_applied && self.rate < self.max_applied).then(|| self.rate as u32)
    }

    /// Feed one accepted packet's observation into the loop.
    ///
    /// `local_position` is the packet's window index, `play_in_secs` the
    /// time left until that audio is due at the device. A non-positive
    /// deadline skips the update entirely: the late-packet policy has
    /// already filtered `play_in < 0`, and the `== 0` boundary would divide
    /// by zero for no usable estimate.
    pub fn observe(&mut self, local_position: f64, play_in_secs: f64) {
        if play_in_secs <= 0.0 {
            return;
        }

        let on_target_rate = local_position / play_in_secs;

        self.local_position_avg = (1.0 - self.local_position_blend) * self.local_position_avg
            + self.local_position_blend * local_position;

        let candidate = (1.0 - self.rate_blend) * self.rate + self.rate_blend * on_target_rate;

        // Only move with the buffer-fill trend, never against it
        if candidate < self.rate && local_position < self.local_position_avg {
            self.rate = candidate;
        } else if candidate > self.rate && local_position > self.local_position_avg {
            self.rate = candidate;
        }
    }

    /// Resynchronization: back to the nominal rate, with the smoothed fill
    /// level restarted at the freshly computed local position.
    pub fn reset(&mut self, local_position: f64) {
        self.rate = self.nominal_rate;
        self.local_position_avg = local_position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> RateController {
        RateController::new(&SyncConfig::default())
    }

    #[test]
    fn starts_at_nominal() {
        let rate = controller();
        assert_eq!(rate.rate(), 8000.0);
        assert_eq!(rate.device_rate(), Some(8000));
    }

    #[test]
    fn zero_local_position_is_harmless() {
        let mut rate = controller();
        // Stream start: the implied on-target rate is 0, not a crash
        rate.observe(0.0, 0.04);
        assert!(rate.rate().is_finite());
    }

    #[test]
    fn non_positive_deadline_skips_update() {
        let mut rate = controller();
        rate.reset(400.0);

        rate.observe(700.0, 0.0);
        assert_eq!(rate.rate(), 8000.0);
        assert_eq!(rate.local_position_avg(), 400.0);

        rate.observe(700.0, -0.5);
        assert_eq!(rate.rate(), 8000.0);
    }

    #[test]
    fn increase_needs_fill_above_average() {
        let mut rate = controller();
        rate.reset(400.0);

        // Position above the average and an estimate above the current
        // rate: 700 / 0.05 = 14000 > 8000, so the rate may rise.
        rate.observe(700.0, 0.05);
        assert!(rate.rate() > 8000.0);
    }

    #[test]
    fn decrease_needs_fill_below_average() {
        let mut rate = controller();
        rate.reset(400.0);

        // Position below the average with a low estimate: 100 / 0.05 = 2000
        rate.observe(100.0, 0.05);
        assert!(rate.rate() < 8000.0);
    }

    #[test]
    fn disagreement_holds_the_rate() {
        let mut rate = controller();
        rate.reset(400.0);

        // Estimate says speed up (12000), but the fill is below average:
        // the gate must hold the rate.
        rate.observe(360.0, 0.03);
        assert_eq!(rate.rate(), 8000.0);
    }

    #[test]
    fn gating_never_moves_against_the_trend() {
        let mut rate = controller();
        rate.reset(400.0);

        // Oscillate the fill level around the average; after every step the
        // rate change direction must match the side we were on.
        let samples = [500.0, 300.0, 550.0, 250.0, 600.0, 200.0];
        for &local in &samples {
            let before = rate.rate();
            let avg_before = rate.local_position_avg();
            rate.observe(local, 0.05);
            let delta = rate.rate() - before;
            if local > avg_before {
                assert!(delta >= 0.0, "rate fell while above average");
            } else {
                assert!(delta <= 0.0, "rate rose while below average");
            }
        }
    }

    #[test]
    fn out_of_band_rate_not_applied_but_state_keeps_moving() {
        let mut config = SyncConfig::default();
        // A huge blend so a single observation can push the rate out of band
        config.sample_rate_blend = 0.9;
        let mut rate = RateController::new(&config);
        rate.reset(0.0);

        // 700 bytes due in 50 ms implies 14000 Hz; with blend 0.9 the new
        // rate lands way above the band.
        rate.observe(700.0, 0.05);
        assert!(rate.rate() > 12000.0);
        assert_eq!(rate.device_rate(), None);

        // The internal state still took the update per the gating rule
        assert!(rate.local_position_avg() > 0.0);
    }

    #[test]
    fn band_is_exclusive() {
        let mut config = SyncConfig::default();
        config.nominal_sample_rate = 12000.0;
        let rate = RateController::new(&config);
        assert_eq!(rate.device_rate(), None);

        config.nominal_sample_rate = 4000.0;
        let rate = RateController::new(&config);
        assert_eq!(rate.device_rate(), None);
    }

    #[test]
    fn reset_restores_nominal_and_seeds_average() {
        let mut rate = controller();
        rate.reset(400.0);
        rate.observe(700.0, 0.05);
        assert_ne!(rate.rate(), 8000.0);

        rate.reset(123.0);
        assert_eq!(rate.rate(), 8000.0);
        assert_eq!(rate.local_position_avg(), 123.0);
    }
}
