//! # Replay-Gain Cache
//!
//! Tag parsing touches storage, so gain values are computed once per path and
//! kept in a bounded LRU cache. Failures are cached too: a file whose tags
//! cannot be read is treated as untagged until it is invalidated.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::replaygain::{GainValues, ReplayGainReader};

/// Default number of paths kept in the cache.
pub const DEFAULT_GAIN_CACHE_CAPACITY: usize = 64;

/// Source of replay-gain values for a path.
#[cfg_attr(test, mockall::automock)]
pub trait GainSource: Send + Sync {
    fn read_gain(&self, path: &Path) -> Result<GainValues>;
}

impl GainSource for ReplayGainReader {
    fn read_gain(&self, path: &Path) -> Result<GainValues> {
        self.read(path)
    }
}

/// Bounded per-path cache of [`GainValues`].
pub struct ReplayGainCache {
    entries: Mutex<LruCache<PathBuf, GainValues>>,
    source: Arc<dyn GainSource>,
}

impl ReplayGainCache {
    /// Cache backed by [`ReplayGainReader`] with the default capacity.
    pub fn new() -> Self {
        Self::with_source(
            Arc::new(ReplayGainReader::new()),
            DEFAULT_GAIN_CACHE_CAPACITY,
        )
    }

    /// A zero `capacity` is raised to one.
    pub fn with_source(source: Arc<dyn GainSource>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            source,
        }
    }

    /// Gain values for `path`, reading the file on a miss.
    ///
    /// Never fails. Read errors are logged and cached as untagged values.
    pub fn get(&self, path: &Path) -> GainValues {
        if let Some(values) = self.entries.lock().get(path) {
            return *values;
        }

        // Read outside the lock; a concurrent miss for the same path just
        // reads twice.
        let values = match self.source.read_gain(path) {
            Ok(values) => values,
            Err(e) => {
                warn!(file = ?path.file_name(), error = %e, "Replay gain unavailable, treating as untagged");
                GainValues::untagged()
            }
        };

        self.entries.lock().put(path.to_path_buf(), values);
        debug!(file = ?path.file_name(), "Cached replay gain");
        values
    }

    /// Drop the cached entry for `path`, e.g. after its tags were rewritten.
    pub fn invalidate(&self, path: &Path) -> bool {
        self.entries.lock().pop(path).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }
}

impl Default for ReplayGainCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetadataError;

    fn tagged(track: f32) -> GainValues {
        GainValues {
            base: 0.0,
            album: 0.0,
            track,
            found: true,
        }
    }

    #[test]
    fn test_hit_does_not_reread() {
        let mut source = MockGainSource::new();
        source
            .expect_read_gain()
            .withf(|path| path == Path::new("/music/a.flac"))
            .times(1)
            .returning(|_| Ok(tagged(-4.0)));

        let cache = ReplayGainCache::with_source(Arc::new(source), 4);
        assert_eq!(cache.get(Path::new("/music/a.flac")).track, -4.0);
        assert_eq!(cache.get(Path::new("/music/a.flac")).track, -4.0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failure_cached_as_untagged() {
        let mut source = MockGainSource::new();
        source
            .expect_read_gain()
            .times(1)
            .returning(|p| Err(MetadataError::FileNotFound(p.display().to_string())));

        let cache = ReplayGainCache::with_source(Arc::new(source), 4);
        assert_eq!(cache.get(Path::new("/gone.mp3")), GainValues::untagged());
        assert_eq!(cache.get(Path::new("/gone.mp3")), GainValues::untagged());
    }

    #[test]
    fn test_capacity_bounds_entries() {
        let mut source = MockGainSource::new();
        source
            .expect_read_gain()
            .times(4)
            .returning(|_| Ok(tagged(1.0)));

        let cache = ReplayGainCache::with_source(Arc::new(source), 2);
        cache.get(Path::new("/1"));
        cache.get(Path::new("/2"));
        cache.get(Path::new("/3"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.capacity(), 2);

        // "/1" was evicted and is read again.
        cache.get(Path::new("/1"));
    }

    #[test]
    fn test_invalidate_forces_reread() {
        let mut source = MockGainSource::new();
        source
            .expect_read_gain()
            .times(2)
            .returning(|_| Ok(tagged(-2.0)));

        let cache = ReplayGainCache::with_source(Arc::new(source), 4);
        cache.get(Path::new("/a"));
        assert!(cache.invalidate(Path::new("/a")));
        assert!(!cache.invalidate(Path::new("/a")));
        cache.get(Path::new("/a"));
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(ReplayGainCache::new().capacity(), DEFAULT_GAIN_CACHE_CAPACITY);
    }
}
