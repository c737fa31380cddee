//! Domain models for the play-count ledger

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use crate::error::LibraryError;

// =============================================================================
// Media Type
// =============================================================================

/// Kind of library entity a counter belongs to.
///
/// Stored as an INTEGER in the `type` column; the discriminants are part of
/// the on-disk format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[repr(i64)]
pub enum MediaType {
    Artist = 1,
    Album = 2,
    Song = 3,
    Playlist = 4,
    Genre = 5,
}

impl MediaType {
    pub const ALL: [MediaType; 5] = [
        MediaType::Artist,
        MediaType::Album,
        MediaType::Song,
        MediaType::Playlist,
        MediaType::Genre,
    ];

    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Artist => "artist",
            MediaType::Album => "album",
            MediaType::Song => "song",
            MediaType::Playlist => "playlist",
            MediaType::Genre => "genre",
        }
    }
}

impl TryFrom<i64> for MediaType {
    type Error = LibraryError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        MediaType::ALL
            .into_iter()
            .find(|t| t.as_i64() == value)
            .ok_or_else(|| LibraryError::InvalidInput {
                field: "media_type".to_string(),
                message: format!("unknown media type {}", value),
            })
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Play Counts
// =============================================================================

/// One row of the `playcounts` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PlayCountRow {
    #[sqlx(rename = "type")]
    pub media_type: MediaType,
    #[sqlx(rename = "type_id")]
    pub media_id: i64,
    #[sqlx(rename = "playcount")]
    pub play_count: i64,
    #[sqlx(rename = "skipcount")]
    pub skip_count: i64,
}

/// Counters for one entity. Entities never played or skipped read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayCounts {
    pub play_count: i64,
    pub skip_count: i64,
}

impl From<PlayCountRow> for PlayCounts {
    fn from(row: PlayCountRow) -> Self {
        Self {
            play_count: row.play_count,
            skip_count: row.skip_count,
        }
    }
}

/// Outcome of one consistency sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcReport {
    /// Rows checked against the catalog
    pub checked: usize,
    /// Rows deleted because the catalog no longer knows the id
    pub removed: usize,
    /// Rows skipped because the catalog or the delete failed
    pub failed: usize,
}
