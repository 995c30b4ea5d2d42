//! Application configuration
//!
//! All tunables have defaults mirroring [`crate::constants`]; an optional
//! `lan-intercom.toml` (working directory first, then the platform config
//! directory) can override any subset of them. Command-line arguments
//! override the network section.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::Error;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub sync: SyncConfig,
    pub audio: AudioConfig,
}

/// Network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Receive buffer requested for the listening socket
    pub recv_buffer_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            recv_buffer_size: RECV_BUFFER_SIZE,
        }
    }
}

/// Synchronization-engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Jitter window capacity in stream bytes
    pub window_size: usize,
    /// Lead time kept between buffered audio and its playback deadline
    pub target_latency_secs: f64,
    /// Stream rate playback starts from and resets to
    pub nominal_sample_rate: f64,
    /// EWMA blend for the smoothed window fill level
    pub local_position_blend: f64,
    /// EWMA blend for playback-rate convergence
    pub sample_rate_blend: f64,
    /// Rates at or below this are never applied to the device
    pub min_applied_rate: f64,
    /// Rates at or above this are never applied to the device
    pub max_applied_rate: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            window_size: JITTER_WINDOW_SIZE,
            target_latency_secs: TARGET_LATENCY_SECS,
            nominal_sample_rate: NOMINAL_SAMPLE_RATE,
            local_position_blend: LOCAL_POSITION_BLEND,
            sample_rate_blend: SAMPLE_RATE_BLEND,
            min_applied_rate: MIN_APPLIED_RATE,
            max_applied_rate: MAX_APPLIED_RATE,
        }
    }
}

/// Audio adapter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture fragment size handed to the framer, in stream bytes
    pub capture_fragment_bytes: usize,
    /// Playback ring capacity in stream bytes
    pub playback_ring_bytes: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            capture_fragment_bytes: CAPTURE_FRAGMENT_SIZE,
            playback_ring_bytes: PLAYBACK_RING_SIZE,
        }
    }
}

impl AppConfig {
    /// Load configuration from the first file found, or defaults if none
    /// exists. A present-but-malformed file is a fatal configuration error.
    pub fn load() -> Result<Self, Error> {
        for path in Self::candidate_paths() {
            if path.is_file() {
                return Self::from_path(&path);
            }
        }
        Ok(Self::default())
    }

    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("lan-intercom.toml")];
        if let Some(dirs) = ProjectDirs::from("", "", "lan-intercom") {
            paths.push(dirs.config_dir().join("config.toml"));
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_constants() {
        let config = AppConfig::default();
        assert_eq!(config.sync.window_size, JITTER_WINDOW_SIZE);
        assert_eq!(config.sync.nominal_sample_rate, NOMINAL_SAMPLE_RATE);
        assert_eq!(config.audio.capture_fragment_bytes, CAPTURE_FRAGMENT_SIZE);
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let config: AppConfig = toml::from_str(
            r#"
            [sync]
            target_latency_secs = 0.1
            "#,
        )
        .unwrap();
        assert_eq!(config.sync.target_latency_secs, 0.1);
        assert_eq!(config.sync.window_size, JITTER_WINDOW_SIZE);
        assert_eq!(config.audio.playback_ring_bytes, PLAYBACK_RING_SIZE);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let parsed: Result<AppConfig, _> = toml::from_str("sync = 3");
        assert!(parsed.is_err());
    }
}
