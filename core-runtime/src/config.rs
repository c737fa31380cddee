//! # Core Configuration Module
//!
//! Provides configuration management for the playback core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance holding the database location, the user's playback preferences and
//! the read-ahead tuning. Validation is fail-fast: `build()` refuses a config
//! the core could not run with.
//!
//! Playback preferences are owned by the host's preference screens. The core
//! only reads them, either once at build time or on demand through
//! [`PlaybackSettings::load`] when a `SettingsStore` is injected.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, PlaybackSettings};
//!
//! let config = CoreConfig::builder()
//!     .database_path("/data/user/0/app/databases/playcounts.db")
//!     .playback(PlaybackSettings::default())
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // No database location was given.
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing database location");
//! ```

use crate::error::{Error, Result};
use bridge_traits::SettingsStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Preference keys read from the host [`SettingsStore`].
pub mod keys {
    pub const ENABLE_TRACK_REPLAYGAIN: &str = "enable_track_replaygain";
    pub const ENABLE_ALBUM_REPLAYGAIN: &str = "enable_album_replaygain";
    pub const REPLAYGAIN_BUMP: &str = "replaygain_bump";
    pub const REPLAYGAIN_UNTAGGED_DEBUMP: &str = "replaygain_untagged_debump";
    pub const ENABLE_READAHEAD: &str = "enable_readahead";
    pub const VOLUME_DURING_DUCKING: &str = "volume_during_ducking";
}

/// Upper bound of the bump and de-bump sliders.
pub const GAIN_SLIDER_MAX: u8 = 150;

// ============================================================================
// Replay gain
// ============================================================================

/// Replay-gain preferences.
///
/// `bump` and `untagged_debump` are slider positions on a 0..=150 scale. The
/// bump slider is centered at 75 (0 dB) and spans ±15 dB; the de-bump slider
/// rests at 150 (0 dB) and only attenuates, down to -15 dB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayGainSettings {
    #[serde(default)]
    pub track_enabled: bool,

    #[serde(default)]
    pub album_enabled: bool,

    #[serde(default = "default_bump")]
    pub bump: u8,

    #[serde(default = "default_untagged_debump")]
    pub untagged_debump: u8,
}

impl Default for ReplayGainSettings {
    fn default() -> Self {
        Self {
            track_enabled: false,
            album_enabled: false,
            bump: default_bump(),
            untagged_debump: default_untagged_debump(),
        }
    }
}

fn default_bump() -> u8 {
    75
}

fn default_untagged_debump() -> u8 {
    150
}

impl ReplayGainSettings {
    /// Whether either replay-gain mode is on.
    pub fn is_enabled(&self) -> bool {
        self.track_enabled || self.album_enabled
    }

    /// Extra gain applied to tagged tracks, in dB.
    pub fn bump_db(&self) -> f32 {
        2.0 * (self.bump as f32 - 75.0) / 10.0
    }

    /// Gain applied to tracks without any replay-gain tag, in dB (never positive).
    pub fn untagged_debump_db(&self) -> f32 {
        (self.untagged_debump as f32 - 150.0) / 10.0
    }

    pub fn validate(&self) -> Result<()> {
        if self.bump > GAIN_SLIDER_MAX {
            return Err(Error::Config(format!(
                "replaygain bump {} exceeds maximum of {}",
                self.bump, GAIN_SLIDER_MAX
            )));
        }
        if self.untagged_debump > GAIN_SLIDER_MAX {
            return Err(Error::Config(format!(
                "untagged de-bump {} exceeds maximum of {}",
                self.untagged_debump, GAIN_SLIDER_MAX
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Playback preferences
// ============================================================================

/// User preferences that influence playback resource management.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    #[serde(default)]
    pub replay_gain: ReplayGainSettings,

    /// Prefetch the playing file from slow storage.
    #[serde(default)]
    pub readahead_enabled: bool,

    /// Output volume while ducked, in percent of full scale.
    #[serde(default = "default_volume_during_ducking")]
    pub volume_during_ducking: u8,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            replay_gain: ReplayGainSettings::default(),
            readahead_enabled: false,
            volume_during_ducking: default_volume_during_ducking(),
        }
    }
}

fn default_volume_during_ducking() -> u8 {
    20
}

impl PlaybackSettings {
    /// Linear volume factor used while ducked.
    pub fn ducking_factor(&self) -> f32 {
        self.volume_during_ducking.min(100) as f32 / 100.0
    }

    pub fn validate(&self) -> Result<()> {
        self.replay_gain.validate()?;
        if self.volume_during_ducking > 100 {
            return Err(Error::Config(format!(
                "volume during ducking must be 0-100%, got {}",
                self.volume_during_ducking
            )));
        }
        Ok(())
    }

    /// Read preferences from the host store.
    ///
    /// Missing keys take their defaults. Out-of-range slider values are
    /// clamped rather than rejected, since the host owns the preference UI.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Settings`] when the store itself fails.
    pub async fn load(store: &dyn SettingsStore) -> Result<Self> {
        let defaults = Self::default();

        let track_enabled = store
            .get_bool(keys::ENABLE_TRACK_REPLAYGAIN)
            .await?
            .unwrap_or(defaults.replay_gain.track_enabled);
        let album_enabled = store
            .get_bool(keys::ENABLE_ALBUM_REPLAYGAIN)
            .await?
            .unwrap_or(defaults.replay_gain.album_enabled);
        let bump = read_slider(
            store,
            keys::REPLAYGAIN_BUMP,
            defaults.replay_gain.bump,
            GAIN_SLIDER_MAX,
        )
        .await?;
        let untagged_debump = read_slider(
            store,
            keys::REPLAYGAIN_UNTAGGED_DEBUMP,
            defaults.replay_gain.untagged_debump,
            GAIN_SLIDER_MAX,
        )
        .await?;
        let readahead_enabled = store
            .get_bool(keys::ENABLE_READAHEAD)
            .await?
            .unwrap_or(defaults.readahead_enabled);
        let volume_during_ducking = read_slider(
            store,
            keys::VOLUME_DURING_DUCKING,
            defaults.volume_during_ducking,
            100,
        )
        .await?;

        Ok(Self {
            replay_gain: ReplayGainSettings {
                track_enabled,
                album_enabled,
                bump,
                untagged_debump,
            },
            readahead_enabled,
            volume_during_ducking,
        })
    }
}

async fn read_slider(store: &dyn SettingsStore, key: &str, default: u8, max: u8) -> Result<u8> {
    let Some(raw) = store.get_i64(key).await? else {
        return Ok(default);
    };
    let clamped = raw.clamp(0, max as i64) as u8;
    if clamped as i64 != raw {
        tracing::warn!(key, raw, clamped, "preference out of range, clamping");
    }
    Ok(clamped)
}

// ============================================================================
// Read-ahead tuning
// ============================================================================

/// Read-ahead pacing.
///
/// The defaults read 32 KiB every 125 ms (about 256 KiB/s) after a 1 s
/// debounce, enough to keep slow storage spun up without competing with
/// foreground I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadaheadTuning {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for ReadaheadTuning {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_delay_ms: default_chunk_delay_ms(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_chunk_size() -> usize {
    32 * 1024
}

fn default_chunk_delay_ms() -> u64 {
    125
}

fn default_debounce_ms() -> u64 {
    1000
}

impl ReadaheadTuning {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config(
                "read-ahead chunk size must be greater than 0".to_string(),
            ));
        }
        if self.chunk_size > 4 * 1024 * 1024 {
            return Err(Error::Config(
                "read-ahead chunk size exceeds maximum of 4 MiB".to_string(),
            ));
        }
        if self.chunk_delay_ms == 0 {
            return Err(Error::Config(
                "read-ahead chunk delay must be greater than 0ms".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Core configuration
// ============================================================================

/// Where the play-count ledger lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    /// Private in-memory database, lost on shutdown.
    InMemory,
}

/// Core configuration for the playback core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Location of the SQLite play-count store
    pub database: DatabaseLocation,

    /// Playback preferences in effect at startup
    pub playback: PlaybackSettings,

    /// Read-ahead pacing
    pub readahead: ReadaheadTuning,

    /// Capacity of the per-path replay-gain cache
    pub gain_cache_capacity: usize,

    /// Rows sampled per play-count GC pass
    pub gc_sample_size: u32,

    /// Host preference store, consulted on settings refresh (optional)
    pub settings_store: Option<Arc<dyn SettingsStore>>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database", &self.database)
            .field("playback", &self.playback)
            .field("readahead", &self.readahead)
            .field("gain_cache_capacity", &self.gain_cache_capacity)
            .field("gc_sample_size", &self.gc_sample_size)
            .field(
                "settings_store",
                &self.settings_store.as_ref().map(|_| "SettingsStore { ... }"),
            )
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let DatabaseLocation::File(path) = &self.database {
            if path.as_os_str().is_empty() {
                return Err(Error::Config("Database path cannot be empty".to_string()));
            }
        }

        if self.gain_cache_capacity == 0 {
            return Err(Error::Config(
                "Gain cache capacity must be greater than 0".to_string(),
            ));
        }

        if self.gc_sample_size == 0 {
            return Err(Error::Config(
                "GC sample size must be greater than 0".to_string(),
            ));
        }

        self.playback.validate()?;
        self.readahead.validate()?;
        Ok(())
    }

    /// Path of the database file, if the store is file-backed.
    pub fn database_path(&self) -> Option<&Path> {
        match &self.database {
            DatabaseLocation::File(path) => Some(path),
            DatabaseLocation::InMemory => None,
        }
    }
}

#[derive(Default)]
pub struct CoreConfigBuilder {
    database: Option<DatabaseLocation>,
    playback: Option<PlaybackSettings>,
    readahead: Option<ReadaheadTuning>,
    gain_cache_capacity: Option<usize>,
    gc_sample_size: Option<u32>,
    settings_store: Option<Arc<dyn SettingsStore>>,
}

impl CoreConfigBuilder {
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database = Some(DatabaseLocation::File(path.into()));
        self
    }

    pub fn in_memory_database(mut self) -> Self {
        self.database = Some(DatabaseLocation::InMemory);
        self
    }

    pub fn playback(mut self, settings: PlaybackSettings) -> Self {
        self.playback = Some(settings);
        self
    }

    pub fn readahead(mut self, tuning: ReadaheadTuning) -> Self {
        self.readahead = Some(tuning);
        self
    }

    pub fn gain_cache_capacity(mut self, capacity: usize) -> Self {
        self.gain_cache_capacity = Some(capacity);
        self
    }

    pub fn gc_sample_size(mut self, size: u32) -> Self {
        self.gc_sample_size = Some(size);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when no database location was given
    /// - [`Error::Config`] when any value is out of range
    pub fn build(self) -> Result<CoreConfig> {
        let database = self.database.ok_or_else(|| Error::CapabilityMissing {
            capability: "Database".to_string(),
            message: "A play-count database location is required. \
                      Call database_path() for a persistent store or \
                      in_memory_database() for an ephemeral one."
                .to_string(),
        })?;

        let config = CoreConfig {
            database,
            playback: self.playback.unwrap_or_default(),
            readahead: self.readahead.unwrap_or_default(),
            gain_cache_capacity: self.gain_cache_capacity.unwrap_or(64),
            gc_sample_size: self.gc_sample_size.unwrap_or(10),
            settings_store: self.settings_store,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = CoreConfig::builder()
            .database_path("/tmp/playcounts.db")
            .build()
            .unwrap();

        assert_eq!(
            config.database_path(),
            Some(Path::new("/tmp/playcounts.db"))
        );
        assert_eq!(config.playback, PlaybackSettings::default());
        assert_eq!(config.readahead, ReadaheadTuning::default());
        assert_eq!(config.gain_cache_capacity, 64);
        assert_eq!(config.gc_sample_size, 10);
        assert!(config.settings_store.is_none());
    }

    #[test]
    fn test_missing_database_is_capability_error() {
        let err = CoreConfig::builder().build().unwrap_err();
        assert!(matches!(err, Error::CapabilityMissing { ref capability, .. } if capability == "Database"));
    }

    #[test]
    fn test_empty_database_path_rejected() {
        let err = CoreConfig::builder().database_path("").build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_sizes_rejected() {
        assert!(CoreConfig::builder()
            .in_memory_database()
            .gain_cache_capacity(0)
            .build()
            .is_err());
        assert!(CoreConfig::builder()
            .in_memory_database()
            .gc_sample_size(0)
            .build()
            .is_err());
        assert!(CoreConfig::builder()
            .in_memory_database()
            .readahead(ReadaheadTuning {
                chunk_size: 0,
                ..ReadaheadTuning::default()
            })
            .build()
            .is_err());
    }

    #[test]
    fn test_slider_conversions() {
        let mut rg = ReplayGainSettings::default();
        assert_eq!(rg.bump_db(), 0.0);
        assert_eq!(rg.untagged_debump_db(), 0.0);

        rg.bump = 150;
        assert_eq!(rg.bump_db(), 15.0);
        rg.bump = 0;
        assert_eq!(rg.bump_db(), -15.0);

        rg.untagged_debump = 0;
        assert_eq!(rg.untagged_debump_db(), -15.0);
    }

    #[test]
    fn test_out_of_range_sliders_rejected() {
        let settings = PlaybackSettings {
            replay_gain: ReplayGainSettings {
                bump: 151,
                ..ReplayGainSettings::default()
            },
            ..PlaybackSettings::default()
        };
        assert!(settings.validate().is_err());

        let settings = PlaybackSettings {
            volume_during_ducking: 101,
            ..PlaybackSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_ducking_factor() {
        assert!((PlaybackSettings::default().ducking_factor() - 0.2).abs() < f32::EPSILON);
        let silent = PlaybackSettings {
            volume_during_ducking: 0,
            ..PlaybackSettings::default()
        };
        assert_eq!(silent.ducking_factor(), 0.0);
    }

    #[test]
    fn test_settings_serde_defaults() {
        let settings: PlaybackSettings =
            serde_json::from_str(r#"{"replay_gain":{"track_enabled":true}}"#).unwrap();
        assert!(settings.replay_gain.track_enabled);
        assert!(!settings.replay_gain.album_enabled);
        assert_eq!(settings.replay_gain.bump, 75);
        assert_eq!(settings.replay_gain.untagged_debump, 150);
        assert!(!settings.readahead_enabled);
        assert_eq!(settings.volume_during_ducking, 20);

        let tuning: ReadaheadTuning = serde_json::from_str("{}").unwrap();
        assert_eq!(tuning, ReadaheadTuning::default());
    }
}
