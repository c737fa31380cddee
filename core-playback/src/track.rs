use std::path::{Path, PathBuf};

use core_metadata::GainValues;
use serde::{Deserialize, Serialize};

/// A track resolved for playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackHandle {
    pub media_id: i64,
    pub path: PathBuf,
    pub gain: GainValues,
}

impl TrackHandle {
    pub fn new(media_id: i64, path: impl Into<PathBuf>, gain: GainValues) -> Self {
        Self {
            media_id,
            path: path.into(),
            gain,
        }
    }

    /// Track without replay-gain information.
    pub fn untagged(media_id: i64, path: impl Into<PathBuf>) -> Self {
        Self::new(media_id, path, GainValues::untagged())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
