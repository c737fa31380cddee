//! In-memory bridge implementations for tests.
//!
//! Enabled with the `test-support` feature. The fakes share a
//! [`SessionLedger`] so a test can check that every effects session opened
//! for a player was closed before that player was reset or released.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{BridgeError, Result};
use crate::playback::{AudioEffectsBridge, AudioSessionId, NativePlayer, NativePlayerFactory};
use crate::storage::SettingsStore;

/// One resource event observed by the fakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEvent {
    EffectsOpened(AudioSessionId),
    EffectsClosed(AudioSessionId),
    PlayerReset(AudioSessionId),
    PlayerReleased(AudioSessionId),
}

/// Ordered log of effects and player teardown events.
#[derive(Debug, Default)]
pub struct SessionLedger {
    events: Mutex<Vec<LedgerEvent>>,
}

impl SessionLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, event: LedgerEvent) {
        self.events.lock().push(event);
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().clone()
    }

    /// Sessions with an open effects session that was never closed.
    pub fn open_sessions(&self) -> HashSet<AudioSessionId> {
        let mut open = HashSet::new();
        for event in self.events.lock().iter() {
            match *event {
                LedgerEvent::EffectsOpened(id) => {
                    open.insert(id);
                }
                LedgerEvent::EffectsClosed(id) => {
                    open.remove(&id);
                }
                _ => {}
            }
        }
        open
    }

    /// Reset/release events that happened while the player's effects
    /// session was still open.
    pub fn leaks(&self) -> Vec<LedgerEvent> {
        let mut open = HashSet::new();
        let mut leaks = Vec::new();
        for event in self.events.lock().iter() {
            match *event {
                LedgerEvent::EffectsOpened(id) => {
                    open.insert(id);
                }
                LedgerEvent::EffectsClosed(id) => {
                    open.remove(&id);
                }
                LedgerEvent::PlayerReset(id) | LedgerEvent::PlayerReleased(id) => {
                    if open.contains(&id) {
                        leaks.push(*event);
                    }
                }
            }
        }
        leaks
    }

    pub fn count(&self, event: LedgerEvent) -> usize {
        self.events.lock().iter().filter(|e| **e == event).count()
    }
}

/// Observable state of one fake player.
#[derive(Debug, Clone, PartialEq)]
pub struct FakePlayerState {
    pub session: AudioSessionId,
    pub data_source: Option<PathBuf>,
    pub prepared: bool,
    pub playing: bool,
    pub volume: f32,
    pub next: Option<AudioSessionId>,
    pub link_calls: usize,
    pub released: bool,
}

impl FakePlayerState {
    fn new(session: AudioSessionId) -> Self {
        Self {
            session,
            data_source: None,
            prepared: false,
            playing: false,
            volume: 1.0,
            next: None,
            link_calls: 0,
            released: false,
        }
    }
}

#[derive(Default)]
struct SourceRules {
    missing: HashSet<PathBuf>,
    broken: HashSet<PathBuf>,
}

struct FakePlayer {
    state: Arc<Mutex<FakePlayerState>>,
    rules: Arc<Mutex<SourceRules>>,
    ledger: Arc<SessionLedger>,
}

impl FakePlayer {
    fn ensure_alive(&self) -> Result<()> {
        if self.state.lock().released {
            return Err(BridgeError::InvalidState("player released".into()));
        }
        Ok(())
    }
}

impl NativePlayer for FakePlayer {
    fn audio_session_id(&self) -> AudioSessionId {
        self.state.lock().session
    }

    fn set_data_source(&mut self, path: &Path) -> Result<()> {
        self.ensure_alive()?;
        if self.rules.lock().missing.contains(path) {
            return Err(BridgeError::SourceNotFound(path.to_path_buf()));
        }
        self.state.lock().data_source = Some(path.to_path_buf());
        Ok(())
    }

    fn prepare(&mut self) -> Result<()> {
        self.ensure_alive()?;
        let mut state = self.state.lock();
        let source = state
            .data_source
            .clone()
            .ok_or_else(|| BridgeError::InvalidState("no data source".into()))?;
        if self.rules.lock().broken.contains(&source) {
            return Err(BridgeError::OperationFailed(format!(
                "cannot decode {}",
                source.display()
            )));
        }
        state.prepared = true;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.ensure_alive()?;
        let mut state = self.state.lock();
        if !state.prepared {
            return Err(BridgeError::InvalidState("start before prepare".into()));
        }
        state.playing = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.state.lock().playing = false;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.ensure_alive()?;
        let mut state = self.state.lock();
        state.playing = false;
        state.prepared = false;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.state.lock().volume = volume;
    }

    fn set_next_player(&mut self, next: Option<AudioSessionId>) -> Result<()> {
        self.ensure_alive()?;
        let mut state = self.state.lock();
        state.next = next;
        state.link_calls += 1;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn reset(&mut self) {
        let session = {
            let mut state = self.state.lock();
            let session = state.session;
            *state = FakePlayerState {
                link_calls: state.link_calls,
                ..FakePlayerState::new(session)
            };
            session
        };
        self.ledger.record(LedgerEvent::PlayerReset(session));
    }

    fn release(&mut self) {
        let session = {
            let mut state = self.state.lock();
            state.released = true;
            state.playing = false;
            state.prepared = false;
            state.data_source = None;
            state.next = None;
            state.session
        };
        self.ledger.record(LedgerEvent::PlayerReleased(session));
    }
}

/// Factory handing out [`FakePlayer`]s with sequential session ids
/// starting at 1.
pub struct FakePlayerFactory {
    next_session: AtomicI32,
    players: Mutex<Vec<Arc<Mutex<FakePlayerState>>>>,
    rules: Arc<Mutex<SourceRules>>,
    ledger: Arc<SessionLedger>,
    fail_create: AtomicBool,
}

impl FakePlayerFactory {
    pub fn new(ledger: Arc<SessionLedger>) -> Arc<Self> {
        Arc::new(Self {
            next_session: AtomicI32::new(1),
            players: Mutex::new(Vec::new()),
            rules: Arc::new(Mutex::new(SourceRules::default())),
            ledger,
            fail_create: AtomicBool::new(false),
        })
    }

    /// `set_data_source` for `path` fails as not found.
    pub fn mark_missing(&self, path: impl Into<PathBuf>) {
        self.rules.lock().missing.insert(path.into());
    }

    /// `prepare` for `path` fails as undecodable.
    pub fn mark_broken(&self, path: impl Into<PathBuf>) {
        self.rules.lock().broken.insert(path.into());
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.players.lock().len()
    }

    pub fn player(&self, session: AudioSessionId) -> Option<FakePlayerState> {
        self.players
            .lock()
            .iter()
            .map(|p| p.lock().clone())
            .find(|p| p.session == session)
    }

    pub fn players(&self) -> Vec<FakePlayerState> {
        self.players.lock().iter().map(|p| p.lock().clone()).collect()
    }
}

impl NativePlayerFactory for FakePlayerFactory {
    fn create_player(&self) -> Result<Box<dyn NativePlayer>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(BridgeError::NotAvailable("no audio output".into()));
        }
        let session = self.next_session.fetch_add(1, Ordering::SeqCst);
        let state = Arc::new(Mutex::new(FakePlayerState::new(session)));
        self.players.lock().push(Arc::clone(&state));
        Ok(Box::new(FakePlayer {
            state,
            rules: Arc::clone(&self.rules),
            ledger: Arc::clone(&self.ledger),
        }))
    }
}

/// Effects bridge that records into a [`SessionLedger`].
pub struct RecordingEffects {
    ledger: Arc<SessionLedger>,
    fail_open: AtomicBool,
}

impl RecordingEffects {
    pub fn new(ledger: Arc<SessionLedger>) -> Arc<Self> {
        Arc::new(Self {
            ledger,
            fail_open: AtomicBool::new(false),
        })
    }

    pub fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }
}

impl AudioEffectsBridge for RecordingEffects {
    fn open_session(&self, session: AudioSessionId) -> Result<()> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(BridgeError::NotAvailable("effects service gone".into()));
        }
        self.ledger.record(LedgerEvent::EffectsOpened(session));
        Ok(())
    }

    fn close_session(&self, session: AudioSessionId) -> Result<()> {
        self.ledger.record(LedgerEvent::EffectsClosed(session));
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum SettingValue {
    Text(String),
    Bool(bool),
    Int(i64),
}

/// Settings store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    values: Mutex<HashMap<String, SettingValue>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_string(&self, key: &str, value: &str) {
        self.values
            .lock()
            .insert(key.to_string(), SettingValue::Text(value.to_string()));
    }

    pub fn set_bool(&self, key: &str, value: bool) {
        self.values
            .lock()
            .insert(key.to_string(), SettingValue::Bool(value));
    }

    pub fn set_i64(&self, key: &str, value: i64) {
        self.values
            .lock()
            .insert(key.to_string(), SettingValue::Int(value));
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(match self.values.lock().get(key) {
            Some(SettingValue::Text(v)) => Some(v.clone()),
            _ => None,
        })
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        Ok(match self.values.lock().get(key) {
            Some(SettingValue::Bool(v)) => Some(*v),
            _ => None,
        })
    }

    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        Ok(match self.values.lock().get(key) {
            Some(SettingValue::Int(v)) => Some(*v),
            _ => None,
        })
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.values.lock().contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_flags_reset_with_open_effects() {
        let ledger = SessionLedger::new();
        ledger.record(LedgerEvent::EffectsOpened(3));
        ledger.record(LedgerEvent::PlayerReset(3));
        ledger.record(LedgerEvent::EffectsClosed(3));
        ledger.record(LedgerEvent::PlayerReleased(3));

        assert_eq!(ledger.leaks(), vec![LedgerEvent::PlayerReset(3)]);
        assert!(ledger.open_sessions().is_empty());
    }

    #[test]
    fn fake_player_reports_missing_source() {
        let ledger = SessionLedger::new();
        let factory = FakePlayerFactory::new(ledger);
        factory.mark_missing("/music/gone.mp3");

        let mut player = factory.create_player().unwrap();
        let err = player
            .set_data_source(Path::new("/music/gone.mp3"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn in_memory_settings_are_typed() {
        let store = InMemorySettingsStore::new();
        store.set_bool("enable_readahead", true);
        store.set_i64("replaygain_bump", 90);

        assert_eq!(store.get_bool("enable_readahead").await.unwrap(), Some(true));
        assert_eq!(store.get_i64("replaygain_bump").await.unwrap(), Some(90));
        assert_eq!(store.get_bool("replaygain_bump").await.unwrap(), None);
        assert!(!store.has_key("missing").await.unwrap());
    }
}
