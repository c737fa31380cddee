//! Playback bridge traits.
//!
//! These abstractions let the core playback layer drive the host's native
//! audio players (Android `MediaPlayer`, AVFoundation, a desktop engine, ...)
//! and the platform audio-effects service without knowing anything about
//! them. Host applications provide concrete implementations.
//!
//! ## Threading
//!
//! Native players are driven from a single playback-control thread. Calls may
//! block briefly (opening and preparing a data source touches storage), so the
//! traits are synchronous and players only need to be `Send`.
//!
//! ## Linking
//!
//! Gapless playback is expressed by linking a player to its successor. The link
//! is made by audio-session id: the host resolves the id back to the native
//! player it handed out from [`NativePlayerFactory::create_player`].

use std::path::Path;

use crate::error::Result;

/// Platform identifier for a player's audio output session.
///
/// Effects sessions are keyed by this id.
pub type AudioSessionId = i32;

/// A single native audio-player resource.
///
/// The lifecycle mirrors a typical platform player:
/// `set_data_source` → `prepare` → `start`/`pause`/`stop` → `reset` or
/// `release`. After `release` the player must not be used again.
pub trait NativePlayer: Send {
    /// Audio session this player outputs to.
    fn audio_session_id(&self) -> AudioSessionId;

    /// Point the player at a local file.
    ///
    /// Implementations should report a missing file as
    /// [`BridgeError::SourceNotFound`](crate::BridgeError::SourceNotFound) or an
    /// `Io` error of kind `NotFound`.
    fn set_data_source(&mut self, path: &Path) -> Result<()>;

    /// Synchronously prepare the configured data source for playback.
    fn prepare(&mut self) -> Result<()>;

    /// Begin or resume playback.
    fn start(&mut self) -> Result<()>;

    /// Pause playback, keeping the current position.
    fn pause(&mut self) -> Result<()>;

    /// Stop playback.
    fn stop(&mut self) -> Result<()>;

    /// Set the output volume, `0.0..=1.0`.
    fn set_volume(&mut self, volume: f32);

    /// Link (or with `None`, unlink) the player that starts when this one
    /// finishes.
    fn set_next_player(&mut self, next: Option<AudioSessionId>) -> Result<()>;

    /// Whether the player is currently producing audio.
    fn is_playing(&self) -> bool;

    /// Return to the unconfigured state. The player may be reused.
    fn reset(&mut self);

    /// Free the native resource.
    fn release(&mut self);
}

/// Allocates native players.
pub trait NativePlayerFactory: Send + Sync {
    /// Allocate a fresh, unconfigured player.
    fn create_player(&self) -> Result<Box<dyn NativePlayer>>;
}

/// Platform audio-effects service (equalizers, virtualizers, ...).
///
/// Every `open_session` for an id must be followed by exactly one
/// `close_session` for the same id before the owning player is reset or
/// released, or the platform leaks the effects session.
pub trait AudioEffectsBridge: Send + Sync {
    /// Attach an effects control session to `session`.
    fn open_session(&self, session: AudioSessionId) -> Result<()>;

    /// Detach the effects control session from `session`.
    fn close_session(&self, session: AudioSessionId) -> Result<()>;
}

/// Effects bridge for hosts without an effects service.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAudioEffects;

impl AudioEffectsBridge for NoopAudioEffects {
    fn open_session(&self, _session: AudioSessionId) -> Result<()> {
        Ok(())
    }

    fn close_session(&self, _session: AudioSessionId) -> Result<()> {
        Ok(())
    }
}
