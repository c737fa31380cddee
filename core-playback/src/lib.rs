//! # Playback Resource Module
//!
//! Keeps audio flowing across track boundaries and manages the resources
//! that takes.
//!
//! ## Overview
//!
//! This module handles:
//! - Gapless chaining of two native players ([`GaplessPlaybackChain`])
//! - Prefetching the sounding file from slow storage ([`ReadaheadScheduler`])
//! - Output volume arbitration between replay gain and ducking ([`VolumeArbiter`])
//! - Replay-gain resolution from tag values and user preferences
//! - Audio-effects session lifetime ([`EffectsSession`])
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{GaplessPlaybackChain, TrackHandle};
//!
//! let mut chain = GaplessPlaybackChain::new(factory, effects)?;
//! chain.open(&TrackHandle::untagged(1, "/music/a.flac"))?;
//! chain.prepare_next(&TrackHandle::untagged(2, "/music/b.flac"))?;
//! chain.start()?;
//! ```

pub mod chain;
pub mod config;
pub mod effects;
pub mod error;
pub mod gain;
pub mod readahead;
pub mod track;
pub mod volume;

pub use chain::{ChainSnapshot, GaplessPlaybackChain, Handoff, SlotKind, SlotSnapshot, SlotState};
pub use config::ReadaheadConfig;
pub use effects::EffectsSession;
pub use error::{PlaybackError, Result};
pub use gain::{db_to_linear, resolve_replay_gain};
pub use readahead::{ReadaheadHandle, ReadaheadScheduler, ReadaheadStats};
pub use track::TrackHandle;
pub use volume::{VolumeArbiter, VolumeState, DEFAULT_DUCKING_FACTOR};
