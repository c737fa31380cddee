//! # Playback Error Types
//!
//! Errors surfaced by the playback chain. Read-ahead and volume arbitration
//! never fail outward; only native-resource operations return these.

use bridge_traits::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// The data source does not exist.
    #[error("Track not found: {}", .0.display())]
    TrackNotFound(PathBuf),

    /// The data source exists but could not be opened or prepared.
    #[error("Failed to open audio source {}: {message}", path.display())]
    SourceError { path: PathBuf, message: String },

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// The platform refused to attach or detach an audio-effects session.
    #[error("Audio effects session {session} failed: {message}")]
    EffectsSession { session: i32, message: String },

    /// A native player could not be allocated or driven.
    #[error("Audio player error: {0}")]
    Player(#[from] BridgeError),

    /// The operation needs a loaded track.
    #[error("No track loaded")]
    NoTrackLoaded,

    /// The chain was released and can no longer be used.
    #[error("Playback chain released")]
    Released,

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Read-ahead worker could not be started.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PlaybackError {
    /// Map a bridge failure while loading `path` onto the source taxonomy.
    pub fn from_source(path: &std::path::Path, err: BridgeError) -> Self {
        if err.is_not_found() {
            PlaybackError::TrackNotFound(path.to_path_buf())
        } else {
            PlaybackError::SourceError {
                path: path.to_path_buf(),
                message: err.to_string(),
            }
        }
    }

    /// Returns `true` if the failure is about the track's file rather than
    /// the player. The timeline usually skips to the next track on these.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::TrackNotFound(_) | PlaybackError::SourceError { .. }
        )
    }

    /// Returns `true` if retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::EffectsSession { .. }
                | PlaybackError::Player(BridgeError::NotAvailable(_))
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_missing_source_maps_to_track_not_found() {
        let err = PlaybackError::from_source(
            Path::new("/music/a.mp3"),
            BridgeError::SourceNotFound("/music/a.mp3".into()),
        );
        assert!(matches!(err, PlaybackError::TrackNotFound(_)));
        assert!(err.is_source_error());

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = PlaybackError::from_source(Path::new("/music/a.mp3"), BridgeError::Io(io));
        assert!(matches!(err, PlaybackError::TrackNotFound(_)));
    }

    #[test]
    fn test_unreadable_source_maps_to_source_error() {
        let err = PlaybackError::from_source(
            Path::new("/music/a.mp3"),
            BridgeError::OperationFailed("unsupported codec".into()),
        );
        assert!(matches!(err, PlaybackError::SourceError { .. }));
        assert!(err.to_string().contains("unsupported codec"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_classification() {
        let effects = PlaybackError::EffectsSession {
            session: 3,
            message: "busy".into(),
        };
        assert!(effects.is_transient());
        assert!(!effects.is_source_error());
        assert!(!PlaybackError::Released.is_transient());
    }
}
