//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and the host.
//! The core never touches a native audio player, the platform effects service
//! or the preference store directly; it talks to these traits instead.
//!
//! ## Traits
//!
//! ### Playback
//! - [`NativePlayer`](playback::NativePlayer) - One native audio-player resource
//! - [`NativePlayerFactory`](playback::NativePlayerFactory) - Allocates players
//! - [`AudioEffectsBridge`](playback::AudioEffectsBridge) - Per-session effects control
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Read-only key-value preferences
//!
//! ### Utilities
//! - [`LoggerSink`](log::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should report a missing media file as `SourceNotFound` (or an `Io` error of
//! kind `NotFound`) so the core can tell "file gone" apart from "file broken".
//!
//! ## Testing
//!
//! The `test-support` feature exposes in-memory fakes of every bridge in
//! [`testing`], sharing a ledger of effects and teardown events.
//!
//! ## Example
//!
//! ```ignore
//! use bridge_traits::playback::{NativePlayerFactory, NativePlayer};
//!
//! fn warm_up(factory: &dyn NativePlayerFactory) -> bridge_traits::error::Result<()> {
//!     let mut player = factory.create_player()?;
//!     player.set_data_source(std::path::Path::new("/music/a.flac"))?;
//!     player.prepare()?;
//!     player.release();
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod log;
pub mod playback;
pub mod storage;

#[cfg(feature = "test-support")]
pub mod testing;

pub use error::BridgeError;

// Re-export commonly used types
pub use log::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use playback::{
    AudioEffectsBridge, AudioSessionId, NativePlayer, NativePlayerFactory, NoopAudioEffects,
};
pub use storage::SettingsStore;
