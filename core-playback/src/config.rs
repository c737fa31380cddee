//! # Playback Configuration
//!
//! Configuration types for the read-ahead worker.

use core_runtime::config::ReadaheadTuning;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Read-ahead worker configuration.
///
/// Controls how fast the file about to play is pulled from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadaheadConfig {
    /// Bytes read per step.
    ///
    /// Default: 32 KiB.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Pause between two reads.
    ///
    /// Default: 125 ms, i.e. about 256 KiB/s with the default chunk size.
    #[serde(default = "default_chunk_delay")]
    pub chunk_delay: Duration,

    /// Delay between a `set_source` and the first read. Requests arriving
    /// within this window replace each other, so skipping through a queue
    /// does not touch every file on the way.
    ///
    /// Default: 1 second.
    #[serde(default = "default_debounce")]
    pub debounce: Duration,
}

impl Default for ReadaheadConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_delay: default_chunk_delay(),
            debounce: default_debounce(),
        }
    }
}

impl ReadaheadConfig {
    /// Tight timings for tests and benchmarks.
    pub fn fast() -> Self {
        Self {
            chunk_size: 4 * 1024,
            chunk_delay: Duration::from_millis(1),
            debounce: Duration::from_millis(20),
        }
    }

    /// Approximate sustained read rate in bytes per second.
    pub fn bytes_per_second(&self) -> f64 {
        self.chunk_size as f64 / self.chunk_delay.as_secs_f64().max(f64::EPSILON)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be > 0".to_string());
        }

        if self.chunk_delay.is_zero() {
            return Err("chunk_delay must be > 0".to_string());
        }

        Ok(())
    }
}

impl From<&ReadaheadTuning> for ReadaheadConfig {
    fn from(tuning: &ReadaheadTuning) -> Self {
        Self {
            chunk_size: tuning.chunk_size,
            chunk_delay: Duration::from_millis(tuning.chunk_delay_ms),
            debounce: Duration::from_millis(tuning.debounce_ms),
        }
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_chunk_size() -> usize {
    32 * 1024
}

fn default_chunk_delay() -> Duration {
    Duration::from_millis(125)
}

fn default_debounce() -> Duration {
    Duration::from_secs(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReadaheadConfig::default();
        assert_eq!(config.chunk_size, 32 * 1024);
        assert_eq!(config.chunk_delay, Duration::from_millis(125));
        assert_eq!(config.debounce, Duration::from_secs(1));
        assert!(config.validate().is_ok());
        assert_eq!(config.bytes_per_second().round() as u64, 256 * 1024);
    }

    #[test]
    fn test_invalid_config() {
        let config = ReadaheadConfig {
            chunk_size: 0,
            ..ReadaheadConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ReadaheadConfig {
            chunk_delay: Duration::ZERO,
            ..ReadaheadConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_tuning_matches_defaults() {
        let config = ReadaheadConfig::from(&ReadaheadTuning::default());
        assert_eq!(config, ReadaheadConfig::default());
    }

    #[test]
    fn test_zero_debounce_is_allowed() {
        let config = ReadaheadConfig {
            debounce: Duration::ZERO,
            ..ReadaheadConfig::fast()
        };
        assert!(config.validate().is_ok());
    }
}
