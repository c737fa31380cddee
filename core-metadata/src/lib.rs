//! # Core Metadata
//!
//! Replay-gain extraction for the playback core.
//!
//! - [`replaygain`] reads track, album and Opus header gains with `lofty` and
//!   parses free-form gain strings.
//! - [`cache`] keeps the per-path results in a bounded LRU cache so a track is
//!   only parsed once while it stays in rotation.

pub mod cache;
pub mod error;
pub mod replaygain;

pub use cache::{GainSource, ReplayGainCache, DEFAULT_GAIN_CACHE_CAPACITY};
pub use error::{MetadataError, Result};
pub use replaygain::{opus_header_gain, parse_gain_value, GainValues, ReplayGainReader};
