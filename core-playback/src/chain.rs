//! # Gapless Playback Chain
//!
//! Owns two native players and links them so the second starts the instant
//! the first finishes.
//!
//! ## Slots
//!
//! The *current* slot holds the sounding player. The optional *next* slot is
//! staged by [`prepare_next`](GaplessPlaybackChain::prepare_next) and linked
//! as the current player's successor. When the platform reports completion
//! the slots swap roles and the finished player is reset for reuse, so at
//! most two players are ever allocated.
//!
//! ```text
//! Idle → Prepared → Playing ⇄ Paused → Completed | Stopped → Released
//! ```
//!
//! ## Resource safety
//!
//! Every slot holds its effects session as an [`EffectsSession`] guard. Each
//! path that resets or releases a player closes that guard first.
//!
//! ## Volume
//!
//! Each slot has its own [`VolumeArbiter`], so gain staged for the next track
//! never touches the sounding one. Ducking applies to both.

use std::fmt;
use std::mem;
use std::path::PathBuf;
use std::sync::Arc;

use bridge_traits::{AudioEffectsBridge, AudioSessionId, NativePlayer, NativePlayerFactory};
use core_metadata::GainValues;
use core_runtime::config::{PlaybackSettings, ReplayGainSettings};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::effects::EffectsSession;
use crate::error::{PlaybackError, Result};
use crate::gain::resolve_replay_gain;
use crate::readahead::ReadaheadHandle;
use crate::track::TrackHandle;
use crate::volume::{VolumeArbiter, VolumeState, DEFAULT_DUCKING_FACTOR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SlotState {
    Idle,
    Prepared,
    Playing,
    Paused,
    Completed,
    Stopped,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SlotKind {
    Current,
    Next,
}

/// Outcome of [`GaplessPlaybackChain::on_completion`].
#[derive(Debug, Clone, PartialEq)]
pub enum Handoff {
    /// The linked successor took over without a gap.
    Advanced {
        finished: Option<TrackHandle>,
        current: TrackHandle,
    },
    /// Nothing was linked; playback has ended.
    Ended { finished: Option<TrackHandle> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotSnapshot {
    pub session: AudioSessionId,
    pub state: SlotState,
    pub path: Option<PathBuf>,
    pub media_id: Option<i64>,
    pub volume: VolumeState,
    pub resolved_volume: f32,
    pub effects_open: bool,
}

/// Read-only view of the chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainSnapshot {
    pub current: SlotSnapshot,
    pub next: Option<SlotSnapshot>,
    /// Whether the current player has a linked successor
    pub linked: bool,
    pub released: bool,
}

impl ChainSnapshot {
    /// Audio sessions with an effects session attached.
    pub fn effects_sessions(&self) -> Vec<AudioSessionId> {
        std::iter::once(&self.current)
            .chain(self.next.as_ref())
            .filter(|slot| slot.effects_open)
            .map(|slot| slot.session)
            .collect()
    }
}

// ============================================================================
// Player slot
// ============================================================================

struct PlayerSlot {
    player: Box<dyn NativePlayer>,
    state: SlotState,
    track: Option<TrackHandle>,
    has_successor: bool,
    volume: VolumeArbiter,
    effects: Option<EffectsSession>,
}

impl PlayerSlot {
    fn new(player: Box<dyn NativePlayer>, volume: VolumeArbiter) -> Self {
        Self {
            player,
            state: SlotState::Idle,
            track: None,
            has_successor: false,
            volume,
            effects: None,
        }
    }

    fn session(&self) -> AudioSessionId {
        self.player.audio_session_id()
    }

    fn path(&self) -> Option<PathBuf> {
        self.track.as_ref().map(|t| t.path.clone())
    }

    fn load(&mut self, track: &TrackHandle) -> Result<()> {
        if self.state != SlotState::Idle {
            self.teardown();
        }

        let loaded = self
            .player
            .set_data_source(&track.path)
            .and_then(|_| self.player.prepare());

        if let Err(e) = loaded {
            self.teardown();
            return Err(PlaybackError::from_source(&track.path, e));
        }

        self.track = Some(track.clone());
        self.state = SlotState::Prepared;
        Ok(())
    }

    fn link(&mut self, next: Option<AudioSessionId>) -> Result<()> {
        self.player.set_next_player(next)?;
        self.has_successor = next.is_some();
        Ok(())
    }

    fn open_effects(&mut self, bridge: &Arc<dyn AudioEffectsBridge>) -> Result<()> {
        if self.effects.is_none() {
            self.effects = Some(EffectsSession::open(Arc::clone(bridge), self.session())?);
        }
        Ok(())
    }

    fn close_effects(&mut self) {
        if let Some(effects) = self.effects.take() {
            if let Err(e) = effects.close() {
                warn!(error = %e, "Audio effects session did not close cleanly");
            }
        }
    }

    /// Close effects, then reset the player to `Idle`.
    fn teardown(&mut self) {
        self.close_effects();
        self.player.reset();
        self.state = SlotState::Idle;
        self.track = None;
        self.has_successor = false;
    }

    /// Close effects, then free the player.
    fn release(&mut self) {
        if self.state == SlotState::Released {
            return;
        }
        self.close_effects();
        self.player.release();
        self.state = SlotState::Released;
        self.track = None;
        self.has_successor = false;
    }

    fn apply_volume(&mut self) -> f32 {
        let volume = self.volume.resolve();
        self.player.set_volume(volume);
        volume
    }

    fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            session: self.session(),
            state: self.state,
            path: self.path(),
            media_id: self.track.as_ref().map(|t| t.media_id),
            volume: self.volume.state(),
            resolved_volume: self.volume.resolve(),
            effects_open: self.effects.is_some(),
        }
    }
}

// ============================================================================
// Chain
// ============================================================================

pub struct GaplessPlaybackChain {
    factory: Arc<dyn NativePlayerFactory>,
    effects: Arc<dyn AudioEffectsBridge>,
    current: PlayerSlot,
    next: Option<PlayerSlot>,
    readahead: Option<ReadaheadHandle>,
    replay_gain: ReplayGainSettings,
    ducking: bool,
    ducking_factor: f32,
    released: bool,
}

impl GaplessPlaybackChain {
    /// Allocate the first player.
    pub fn new(
        factory: Arc<dyn NativePlayerFactory>,
        effects: Arc<dyn AudioEffectsBridge>,
    ) -> Result<Self> {
        let player = factory.create_player()?;
        debug!(session = player.audio_session_id(), "Playback chain created");

        Ok(Self {
            factory,
            effects,
            current: PlayerSlot::new(player, VolumeArbiter::new()),
            next: None,
            readahead: None,
            replay_gain: ReplayGainSettings::default(),
            ducking: false,
            ducking_factor: DEFAULT_DUCKING_FACTOR,
            released: false,
        })
    }

    /// Apply replay-gain and ducking preferences.
    pub fn with_settings(mut self, settings: &PlaybackSettings) -> Self {
        self.replay_gain = settings.replay_gain;
        self.set_ducking_factor(settings.ducking_factor());
        self
    }

    /// Warm the sounding file through `readahead`, or stop warming with `None`.
    pub fn set_readahead(&mut self, readahead: Option<ReadaheadHandle>) {
        if let Some(old) = self.readahead.take() {
            old.pause();
        }
        self.readahead = readahead;
        if self.current.state == SlotState::Playing {
            self.warm_current();
        }
    }

    pub fn current_track(&self) -> Option<&TrackHandle> {
        self.current.track.as_ref()
    }

    pub fn next_track(&self) -> Option<&TrackHandle> {
        self.next.as_ref().and_then(|slot| slot.track.as_ref())
    }

    pub fn is_playing(&self) -> bool {
        !self.released && self.current.player.is_playing()
    }

    /// Load `track` into the current slot, replacing whatever was there.
    #[instrument(skip(self, track), fields(media_id = track.media_id))]
    pub fn open(&mut self, track: &TrackHandle) -> Result<()> {
        self.ensure_usable()?;
        self.pause_readahead();

        self.current.load(track)?;
        let settings = self.replay_gain;
        self.apply_gain(SlotKind::Current, &track.gain, &settings);
        debug!(file = ?track.path.file_name(), "Track opened");
        Ok(())
    }

    /// Stage `track` to start as soon as the current one finishes.
    ///
    /// Re-issuing the path that is already staged only restores a missing
    /// link; a different path replaces the staged track.
    #[instrument(skip(self, track), fields(media_id = track.media_id))]
    pub fn prepare_next(&mut self, track: &TrackHandle) -> Result<()> {
        self.ensure_usable()?;
        if self.current.track.is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }

        let already_staged = self.next.as_ref().is_some_and(|slot| {
            slot.state == SlotState::Prepared && slot.path().as_deref() == Some(track.path())
        });

        if already_staged {
            if !self.current.has_successor {
                self.link_next()?;
            }
            return Ok(());
        }

        if self.current.has_successor {
            self.current.link(None)?;
        }

        let mut slot = match self.next.take() {
            Some(slot) => slot,
            None => self.new_slot()?,
        };
        let loaded = slot.load(track);
        self.next = Some(slot);
        loaded?;

        let settings = self.replay_gain;
        self.apply_gain(SlotKind::Next, &track.gain, &settings);
        self.link_next()?;

        debug!(file = ?track.path.file_name(), "Next track staged");
        Ok(())
    }

    /// Unlink the staged successor without tearing it down.
    pub fn clear_next(&mut self) -> Result<()> {
        self.ensure_usable()?;
        if self.current.has_successor {
            self.current.link(None)?;
            debug!("Next track unlinked");
        }
        Ok(())
    }

    /// Start or resume the current track.
    pub fn start(&mut self) -> Result<()> {
        self.ensure_usable()?;
        match self.current.state {
            SlotState::Idle => return Err(PlaybackError::NoTrackLoaded),
            SlotState::Released => return Err(PlaybackError::Released),
            SlotState::Playing => return Ok(()),
            SlotState::Stopped => {
                let path = self.current.path().ok_or(PlaybackError::NoTrackLoaded)?;
                self.current
                    .player
                    .prepare()
                    .map_err(|e| PlaybackError::from_source(&path, e))?;
            }
            SlotState::Prepared | SlotState::Paused | SlotState::Completed => {}
        }

        if let Err(e) = self.open_audio_effects() {
            warn!(error = %e, "Starting without audio effects");
        }

        self.current.apply_volume();
        self.current.player.start()?;
        self.current.state = SlotState::Playing;
        self.warm_current();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.ensure_usable()?;
        if self.current.state == SlotState::Playing {
            self.current.player.pause()?;
            self.current.state = SlotState::Paused;
        }
        self.pause_readahead();
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.ensure_usable()?;
        match self.current.state {
            SlotState::Playing
            | SlotState::Paused
            | SlotState::Prepared
            | SlotState::Completed => {
                self.current.player.stop()?;
                self.current.state = SlotState::Stopped;
            }
            _ => {}
        }
        self.current.close_effects();
        self.pause_readahead();
        Ok(())
    }

    /// The current player finished. Swap in the linked successor if any.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::NoTrackLoaded`] when the current slot is empty.
    pub fn on_completion(&mut self) -> Result<Handoff> {
        self.ensure_usable()?;
        if self.current.track.is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }
        let finished = self.current.track.clone();

        let successor_ready = self.current.has_successor
            && self
                .next
                .as_ref()
                .is_some_and(|slot| slot.state == SlotState::Prepared);

        if !successor_ready {
            self.current.state = SlotState::Completed;
            self.current.close_effects();
            self.pause_readahead();
            info!("Playback ended");
            return Ok(Handoff::Ended { finished });
        }
        let Some(mut next) = self.next.take() else {
            return Err(PlaybackError::NoTrackLoaded);
        };

        // Linked players normally start on their own.
        if !next.player.is_playing() {
            if let Err(e) = next.player.start() {
                self.next = Some(next);
                return Err(e.into());
            }
        }
        next.state = SlotState::Playing;
        let mut old = mem::replace(&mut self.current, next);
        old.teardown();
        self.next = Some(old);

        self.current.apply_volume();
        if let Err(e) = self.open_audio_effects() {
            warn!(error = %e, "Continuing without audio effects");
        }
        self.warm_current();

        let current = self
            .current
            .track
            .clone()
            .ok_or(PlaybackError::NoTrackLoaded)?;
        info!(media_id = current.media_id, "Gapless handoff");
        Ok(Handoff::Advanced { finished, current })
    }

    /// The current player failed mid-playback. Returns the failed track.
    pub fn on_playback_error(&mut self) -> Option<TrackHandle> {
        if self.released {
            return None;
        }
        let failed = self.current.track.clone();
        self.pause_readahead();
        self.current.teardown();
        warn!(media_id = ?failed.as_ref().map(|t| t.media_id), "Playback error, slot reset");
        failed
    }

    /// Latch the replay-gain factor for `gain` on one slot and apply it to
    /// that player only. Returns the resulting volume, or `None` if the slot
    /// is not allocated.
    pub fn apply_gain(
        &mut self,
        slot: SlotKind,
        gain: &GainValues,
        settings: &ReplayGainSettings,
    ) -> Option<f32> {
        self.replay_gain = *settings;
        let factor = resolve_replay_gain(gain, settings);
        let slot = self.slot_mut(slot)?;
        slot.volume.set_replay_gain(factor);
        Some(slot.apply_volume())
    }

    /// Re-resolve replay gain of both slots under new preferences.
    pub fn refresh_replay_gain(&mut self, settings: &ReplayGainSettings) {
        self.replay_gain = *settings;
        for kind in [SlotKind::Current, SlotKind::Next] {
            let gain = self
                .slot_mut(kind)
                .and_then(|slot| slot.track.as_ref().map(|t| t.gain));
            if let Some(gain) = gain {
                self.apply_gain(kind, &gain, settings);
            }
        }
    }

    pub fn set_ducking(&mut self, is_ducking: bool) {
        self.ducking = is_ducking;
        self.for_each_slot(|slot| slot.volume.set_ducking(is_ducking));
    }

    pub fn set_ducking_factor(&mut self, factor: f32) {
        self.ducking_factor = factor;
        self.for_each_slot(|slot| slot.volume.set_ducking_factor(factor));
    }

    /// Attach an effects session to the current player if none is attached.
    pub fn open_audio_effects(&mut self) -> Result<()> {
        self.ensure_usable()?;
        self.current.open_effects(&self.effects)
    }

    pub fn close_audio_effects(&mut self) {
        self.current.close_effects();
    }

    /// Return both slots to `Idle`.
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_usable()?;
        self.pause_readahead();
        self.current.teardown();
        if let Some(next) = self.next.as_mut() {
            next.teardown();
        }
        debug!("Playback chain reset");
        Ok(())
    }

    /// Free both players. Further operations fail with
    /// [`PlaybackError::Released`].
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.pause_readahead();
        self.current.release();
        if let Some(next) = self.next.as_mut() {
            next.release();
        }
        self.released = true;
        debug!("Playback chain released");
    }

    /// Audio sessions of all allocated players.
    pub fn audio_sessions(&self) -> Vec<AudioSessionId> {
        std::iter::once(&self.current)
            .chain(self.next.as_ref())
            .map(PlayerSlot::session)
            .collect()
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot {
            current: self.current.snapshot(),
            next: self.next.as_ref().map(PlayerSlot::snapshot),
            linked: self.current.has_successor,
            released: self.released,
        }
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.released {
            return Err(PlaybackError::Released);
        }
        Ok(())
    }

    fn new_slot(&self) -> Result<PlayerSlot> {
        let player = self.factory.create_player()?;
        let mut volume = VolumeArbiter::new();
        volume.set_ducking_factor(self.ducking_factor);
        volume.set_ducking(self.ducking);
        Ok(PlayerSlot::new(player, volume))
    }

    fn link_next(&mut self) -> Result<()> {
        let session = self
            .next
            .as_ref()
            .map(PlayerSlot::session)
            .ok_or(PlaybackError::NoTrackLoaded)?;
        self.current.link(Some(session))
    }

    fn slot_mut(&mut self, kind: SlotKind) -> Option<&mut PlayerSlot> {
        match kind {
            SlotKind::Current => Some(&mut self.current),
            SlotKind::Next => self.next.as_mut(),
        }
    }

    fn for_each_slot(&mut self, mut f: impl FnMut(&mut PlayerSlot)) {
        for slot in std::iter::once(&mut self.current).chain(self.next.as_mut()) {
            f(slot);
            slot.apply_volume();
        }
    }

    fn warm_current(&self) {
        if let (Some(readahead), Some(track)) = (&self.readahead, &self.current.track) {
            readahead.set_source(&track.path);
        }
    }

    fn pause_readahead(&self) {
        if let Some(readahead) = &self.readahead {
            readahead.pause();
        }
    }
}

impl Drop for GaplessPlaybackChain {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for GaplessPlaybackChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GaplessPlaybackChain")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::testing::{FakePlayerFactory, RecordingEffects, SessionLedger};

    fn chain() -> (GaplessPlaybackChain, Arc<FakePlayerFactory>, Arc<SessionLedger>) {
        let ledger = SessionLedger::new();
        let factory = FakePlayerFactory::new(ledger.clone());
        let effects = RecordingEffects::new(ledger.clone());
        let chain = GaplessPlaybackChain::new(factory.clone(), effects).unwrap();
        (chain, factory, ledger)
    }

    #[test]
    fn test_start_requires_track() {
        let (mut chain, _, _) = chain();
        assert!(matches!(chain.start(), Err(PlaybackError::NoTrackLoaded)));
        assert!(matches!(
            chain.prepare_next(&TrackHandle::untagged(1, "/m/a.mp3")),
            Err(PlaybackError::NoTrackLoaded)
        ));
    }

    #[test]
    fn test_open_start_pause_resume() {
        let (mut chain, factory, _) = chain();
        chain.open(&TrackHandle::untagged(1, "/m/a.mp3")).unwrap();
        assert_eq!(chain.snapshot().current.state, SlotState::Prepared);

        chain.start().unwrap();
        assert!(chain.is_playing());

        chain.pause().unwrap();
        assert_eq!(chain.snapshot().current.state, SlotState::Paused);
        assert!(!factory.player(1).unwrap().playing);

        chain.start().unwrap();
        assert_eq!(chain.snapshot().current.state, SlotState::Playing);
    }

    #[test]
    fn test_start_after_stop_prepares_again() {
        let (mut chain, factory, _) = chain();
        chain.open(&TrackHandle::untagged(1, "/m/a.mp3")).unwrap();
        chain.start().unwrap();
        chain.stop().unwrap();
        assert!(!factory.player(1).unwrap().prepared);

        chain.start().unwrap();
        assert!(factory.player(1).unwrap().playing);
    }

    #[test]
    fn test_ducking_applies_to_new_next_slot() {
        let (mut chain, factory, _) = chain();
        chain.set_ducking(true);
        chain.open(&TrackHandle::untagged(1, "/m/a.mp3")).unwrap();
        chain.prepare_next(&TrackHandle::untagged(2, "/m/b.mp3")).unwrap();

        assert_eq!(factory.player(2).unwrap().volume, DEFAULT_DUCKING_FACTOR);
    }

    #[test]
    fn test_completion_on_empty_slot_is_rejected() {
        let (mut chain, _, _) = chain();
        assert!(matches!(
            chain.on_completion(),
            Err(PlaybackError::NoTrackLoaded)
        ));
        assert_eq!(chain.snapshot().current.state, SlotState::Idle);
        assert!(matches!(chain.start(), Err(PlaybackError::NoTrackLoaded)));
    }

    #[test]
    fn test_released_chain_rejects_operations() {
        let (mut chain, _, _) = chain();
        chain.release();
        chain.release();
        assert!(matches!(chain.start(), Err(PlaybackError::Released)));
        assert!(matches!(
            chain.open(&TrackHandle::untagged(1, "/m/a.mp3")),
            Err(PlaybackError::Released)
        ));
        assert!(chain.snapshot().released);
    }
}
