//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (native players,
//! audio effects, the media catalog, settings) into the playback core. Hosts
//! build a [`PlaybackCore`] once and drive it from their playback-control
//! code; the external timeline decides what plays next and reports
//! completions and skips back through [`PlaybackCore::record_event`].
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::PlaybackCore;
//!
//! let config = CoreConfig::builder().database_path("/data/playcounts.db").build()?;
//! let core = PlaybackCore::builder(config)
//!     .player_factory(factory)
//!     .catalog(catalog)
//!     .build()
//!     .await?;
//!
//! core.play(42, "/music/track.flac").await?;
//! ```

pub mod error;

pub use core_runtime::logging::{init_logging, LoggingConfig};
pub use error::{CoreError, Result};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bridge_traits::{AudioEffectsBridge, NativePlayerFactory, NoopAudioEffects};
use core_library::db::{create_pool, DatabaseConfig};
use core_library::{GcReport, MediaCatalog, MediaType, PlayCountStore, PlayCounts};
use core_metadata::{GainSource, GainValues, ReplayGainCache, ReplayGainReader};
use core_playback::{
    ChainSnapshot, GaplessPlaybackChain, Handoff, ReadaheadConfig, ReadaheadScheduler,
    ReadaheadStats, TrackHandle,
};
use core_runtime::config::{CoreConfig, DatabaseLocation, PlaybackSettings};
use parking_lot::{Mutex, RwLock};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

/// Aggregated handle to the bridge dependencies the core requires.
pub struct CoreDependencies {
    pub player_factory: Arc<dyn NativePlayerFactory>,
    pub audio_effects: Arc<dyn AudioEffectsBridge>,
    pub catalog: Arc<dyn MediaCatalog>,
    /// Replaces tag reading from disk when set.
    pub gain_source: Option<Arc<dyn GainSource>>,
}

impl CoreDependencies {
    /// Bundle without audio effects, reading replay gain from file tags.
    pub fn new(
        player_factory: Arc<dyn NativePlayerFactory>,
        catalog: Arc<dyn MediaCatalog>,
    ) -> Self {
        Self {
            player_factory,
            audio_effects: Arc::new(NoopAudioEffects),
            catalog,
            gain_source: None,
        }
    }
}

/// Builder for [`PlaybackCore`].
pub struct PlaybackCoreBuilder {
    config: CoreConfig,
    player_factory: Option<Arc<dyn NativePlayerFactory>>,
    audio_effects: Option<Arc<dyn AudioEffectsBridge>>,
    catalog: Option<Arc<dyn MediaCatalog>>,
    gain_source: Option<Arc<dyn GainSource>>,
}

impl PlaybackCoreBuilder {
    pub fn player_factory(mut self, factory: Arc<dyn NativePlayerFactory>) -> Self {
        self.player_factory = Some(factory);
        self
    }

    pub fn audio_effects(mut self, effects: Arc<dyn AudioEffectsBridge>) -> Self {
        self.audio_effects = Some(effects);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn MediaCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn gain_source(mut self, source: Arc<dyn GainSource>) -> Self {
        self.gain_source = Some(source);
        self
    }

    /// # Errors
    ///
    /// [`CoreError::CapabilityMissing`] when no player factory or catalog was
    /// provided, otherwise anything [`PlaybackCore::new`] returns.
    pub async fn build(self) -> Result<PlaybackCore> {
        let player_factory = self
            .player_factory
            .ok_or_else(|| missing("NativePlayerFactory", "Native audio players are required."))?;
        let catalog = self.catalog.ok_or_else(|| {
            missing(
                "MediaCatalog",
                "The play-count ledger needs the media catalog to collect stale rows.",
            )
        })?;

        let mut deps = CoreDependencies::new(player_factory, catalog);
        if let Some(effects) = self.audio_effects {
            deps.audio_effects = effects;
        }
        deps.gain_source = self.gain_source;

        PlaybackCore::new(self.config, deps).await
    }
}

fn missing(capability: &str, message: &str) -> CoreError {
    CoreError::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

/// Primary façade exposed to host applications.
///
/// Field order matters: the chain is released before the read-ahead worker
/// is joined.
pub struct PlaybackCore {
    chain: Mutex<GaplessPlaybackChain>,
    readahead: ReadaheadScheduler,
    gains: Arc<ReplayGainCache>,
    ledger: PlayCountStore,
    settings: RwLock<PlaybackSettings>,
    pool: SqlitePool,
    config: CoreConfig,
}

impl PlaybackCore {
    pub fn builder(config: CoreConfig) -> PlaybackCoreBuilder {
        PlaybackCoreBuilder {
            config,
            player_factory: None,
            audio_effects: None,
            catalog: None,
            gain_source: None,
        }
    }

    /// Open the ledger, start the read-ahead worker and allocate the chain.
    ///
    /// Preferences come from the configured settings store when there is one;
    /// if it cannot be read the configured defaults are used.
    pub async fn new(config: CoreConfig, deps: CoreDependencies) -> Result<Self> {
        config.validate()?;

        let mut settings = config.playback;
        if let Some(store) = &config.settings_store {
            match PlaybackSettings::load(store.as_ref()).await {
                Ok(loaded) => settings = loaded,
                Err(e) => warn!(error = %e, "Failed to load playback settings, using defaults"),
            }
        }

        let database = match &config.database {
            DatabaseLocation::File(path) => DatabaseConfig::new(path),
            DatabaseLocation::InMemory => DatabaseConfig::in_memory(),
        };
        let pool = create_pool(database).await?;
        let ledger = PlayCountStore::from_pool(pool.clone(), deps.catalog)
            .with_gc_sample_size(config.gc_sample_size);

        let source = deps
            .gain_source
            .unwrap_or_else(|| Arc::new(ReplayGainReader::new()) as Arc<dyn GainSource>);
        let gains = Arc::new(ReplayGainCache::with_source(
            source,
            config.gain_cache_capacity,
        ));

        let readahead = ReadaheadScheduler::new(ReadaheadConfig::from(&config.readahead))?;

        let mut chain = GaplessPlaybackChain::new(deps.player_factory, deps.audio_effects)?
            .with_settings(&settings);
        if settings.readahead_enabled {
            chain.set_readahead(Some(readahead.handle()));
        }

        info!(
            database = ?config.database_path().and_then(Path::file_name),
            readahead = settings.readahead_enabled,
            replay_gain = settings.replay_gain.is_enabled(),
            "Playback core initialized"
        );

        Ok(Self {
            chain: Mutex::new(chain),
            readahead,
            gains,
            ledger,
            settings: RwLock::new(settings),
            pool,
            config,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------------

    /// Build a [`TrackHandle`] with replay-gain values from the cache.
    pub async fn resolve_track(&self, media_id: i64, path: impl Into<PathBuf>) -> TrackHandle {
        let path = path.into();
        let gains = Arc::clone(&self.gains);
        let lookup = path.clone();

        let gain = match tokio::task::spawn_blocking(move || gains.get(&lookup)).await {
            Ok(gain) => gain,
            Err(e) => {
                warn!(media_id, error = %e, "Replay-gain lookup task failed");
                GainValues::untagged()
            }
        };
        TrackHandle::new(media_id, path, gain)
    }

    /// Load a track into the sounding slot without starting it.
    pub async fn open(&self, media_id: i64, path: impl Into<PathBuf>) -> Result<TrackHandle> {
        let track = self.resolve_track(media_id, path).await;
        self.chain.lock().open(&track)?;
        Ok(track)
    }

    /// Load and start a track, replacing whatever is playing.
    pub async fn play(&self, media_id: i64, path: impl Into<PathBuf>) -> Result<TrackHandle> {
        let track = self.resolve_track(media_id, path).await;
        let mut chain = self.chain.lock();
        chain.open(&track)?;
        chain.start()?;
        Ok(track)
    }

    /// Stage the track that follows the sounding one.
    pub async fn prepare_next(
        &self,
        media_id: i64,
        path: impl Into<PathBuf>,
    ) -> Result<TrackHandle> {
        let track = self.resolve_track(media_id, path).await;
        self.chain.lock().prepare_next(&track)?;
        Ok(track)
    }

    pub fn clear_next(&self) -> Result<()> {
        Ok(self.chain.lock().clear_next()?)
    }

    pub fn start(&self) -> Result<()> {
        Ok(self.chain.lock().start()?)
    }

    pub fn pause(&self) -> Result<()> {
        Ok(self.chain.lock().pause()?)
    }

    pub fn stop(&self) -> Result<()> {
        Ok(self.chain.lock().stop()?)
    }

    pub fn on_completion(&self) -> Result<Handoff> {
        Ok(self.chain.lock().on_completion()?)
    }

    pub fn on_playback_error(&self) -> Option<TrackHandle> {
        self.chain.lock().on_playback_error()
    }

    pub fn set_ducking(&self, is_ducking: bool) {
        self.chain.lock().set_ducking(is_ducking);
    }

    pub fn is_playing(&self) -> bool {
        self.chain.lock().is_playing()
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        self.chain.lock().snapshot()
    }

    pub fn readahead_stats(&self) -> ReadaheadStats {
        self.readahead.stats()
    }

    /// Forget cached replay gain for `path`, e.g. after its tags changed.
    pub fn invalidate_gain(&self, path: &Path) -> bool {
        self.gains.invalidate(path)
    }

    // ------------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------------

    pub fn settings(&self) -> PlaybackSettings {
        *self.settings.read()
    }

    /// Apply new preferences to the running chain.
    pub fn apply_settings(&self, settings: PlaybackSettings) -> Result<()> {
        settings.validate()?;
        *self.settings.write() = settings;

        let mut chain = self.chain.lock();
        chain.refresh_replay_gain(&settings.replay_gain);
        chain.set_ducking_factor(settings.ducking_factor());
        chain.set_readahead(
            settings
                .readahead_enabled
                .then(|| self.readahead.handle()),
        );

        debug!(?settings, "Playback settings applied");
        Ok(())
    }

    /// Re-read preferences from the settings store and apply them.
    ///
    /// Without a settings store the current preferences are kept.
    pub async fn refresh_settings(&self) -> Result<PlaybackSettings> {
        let Some(store) = &self.config.settings_store else {
            return Ok(self.settings());
        };
        let settings = PlaybackSettings::load(store.as_ref()).await?;
        self.apply_settings(settings)?;
        Ok(settings)
    }

    // ------------------------------------------------------------------------
    // Play counts
    // ------------------------------------------------------------------------

    /// Count a completed play or a skip. Storage failures are logged.
    pub async fn record_event(&self, media_type: MediaType, media_id: i64, was_played: bool) {
        self.ledger
            .record_event(media_type, media_id, was_played)
            .await;
    }

    pub async fn top_played(&self, media_type: MediaType, limit: u32) -> Result<Vec<i64>> {
        Ok(self.ledger.top_played(media_type, limit).await?)
    }

    pub async fn play_counts(&self, media_type: MediaType, media_id: i64) -> Result<PlayCounts> {
        Ok(self.ledger.counts(media_type, media_id).await?)
    }

    /// Check every ledger row of `media_type` against the catalog.
    pub async fn full_sweep(&self, media_type: MediaType) -> Result<GcReport> {
        Ok(self.ledger.full_sweep(media_type).await?)
    }

    /// Release the players and close the ledger.
    pub async fn shutdown(self) {
        self.chain.lock().release();
        self.pool.close().await;
        info!("Playback core shut down");
    }
}
