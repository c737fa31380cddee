//! Replay-Gain Tag Extraction
//!
//! Reads loudness-normalization values from audio file tags using `lofty`.
//!
//! ## Sources
//!
//! - `REPLAYGAIN_TRACK_GAIN` / `REPLAYGAIN_ALBUM_GAIN` in any tag format
//!   lofty understands (ID3v2 `TXXX`, Vorbis comments, APE, MP4 freeform).
//! - `R128_TRACK_GAIN` / `R128_ALBUM_GAIN` Vorbis comments in Opus files.
//!   These are Q7.8 fixed-point values relative to -23 LUFS and are shifted
//!   by +5 dB to the -18 LUFS replay-gain reference.
//! - The Opus identification header's output gain, which every Opus decoder
//!   applies and which the R128 values are relative to. It is reported as
//!   [`GainValues::base`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::replaygain::ReplayGainReader;
//! use std::path::Path;
//!
//! let reader = ReplayGainReader::new();
//! let gain = reader.read(Path::new("/music/track.opus"))?;
//! if gain.found {
//!     println!("track {} dB, album {} dB", gain.track, gain.album);
//! }
//! ```

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use lofty::config::ParseOptions;
use lofty::file::{FileType, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::ItemKey;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{MetadataError, Result};

const R128_TRACK_GAIN: &str = "R128_TRACK_GAIN";
const R128_ALBUM_GAIN: &str = "R128_ALBUM_GAIN";

/// Offset between the R128 (-23 LUFS) and replay-gain (-18 LUFS) references.
const R128_TO_REPLAYGAIN_DB: f32 = 5.0;

/// How far into an Ogg stream the `OpusHead` packet is searched for.
const OPUS_HEAD_SCAN_BYTES: usize = 512;

/// Replay-gain values of one file, in dB.
///
/// Zero means "not present" for `album` and `track`. `found` is set when any
/// replay-gain or R128 tag was present, which decides between the bump and
/// the untagged de-bump adjustment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GainValues {
    /// Gain every decoder applies regardless of tags (Opus output gain)
    pub base: f32,
    pub album: f32,
    pub track: f32,
    pub found: bool,
}

impl GainValues {
    /// Values for a file with no replay-gain information.
    pub fn untagged() -> Self {
        Self::default()
    }
}

/// Parse a gain tag such as `"-3.50 dB"` into dB.
///
/// Everything but digits, `.` and `-` is dropped before parsing. Anything
/// that still does not parse yields `0.0`, the same as a missing tag.
pub fn parse_gain_value(raw: &str) -> f32 {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse::<f32>().unwrap_or(0.0)
}

/// Parse an R128 Q7.8 gain into replay-gain dB.
fn parse_r128_value(raw: &str) -> Option<f32> {
    let value = raw.trim().parse::<i32>().ok()?;
    Some(value as f32 / 256.0 + R128_TO_REPLAYGAIN_DB)
}

/// Output gain from the `OpusHead` identification header, in dB.
///
/// `bytes` should be the start of an Ogg Opus stream. Returns `None` when no
/// identification header is found.
pub fn opus_header_gain(bytes: &[u8]) -> Option<f32> {
    const MAGIC: &[u8] = b"OpusHead";
    // magic(8) version(1) channels(1) pre-skip(2) rate(4) gain(2)
    const GAIN_OFFSET: usize = 16;

    let start = bytes.windows(MAGIC.len()).position(|w| w == MAGIC)?;
    let raw = bytes.get(start + GAIN_OFFSET..start + GAIN_OFFSET + 2)?;
    let q78 = i16::from_le_bytes([raw[0], raw[1]]);
    Some(q78 as f32 / 256.0)
}

/// Reads [`GainValues`] from files on disk.
pub struct ReplayGainReader {
    parse_options: ParseOptions,
}

impl ReplayGainReader {
    pub fn new() -> Self {
        // Only tags are needed; skip decoding stream properties.
        Self {
            parse_options: ParseOptions::new().read_properties(false),
        }
    }

    pub fn with_options(parse_options: ParseOptions) -> Self {
        Self { parse_options }
    }

    /// Read the replay-gain values of `path`.
    ///
    /// A readable file without any gain tag yields `found == false`; that is
    /// not an error.
    ///
    /// # Errors
    ///
    /// - [`MetadataError::FileNotFound`] if `path` does not exist
    /// - [`MetadataError::ExtractionFailed`] if the file cannot be parsed
    pub fn read(&self, path: &Path) -> Result<GainValues> {
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => MetadataError::FileNotFound(path.display().to_string()),
            _ => MetadataError::Io(e),
        })?;

        let tagged_file = Probe::new(BufReader::new(file))
            .options(self.parse_options)
            .guess_file_type()
            .map_err(|e| MetadataError::ExtractionFailed(format!("Failed to probe file: {}", e)))?
            .read()
            .map_err(|e| MetadataError::ExtractionFailed(format!("Failed to parse file: {}", e)))?;

        let mut gain = GainValues::default();

        for tag in tagged_file.tags() {
            for item in tag.items() {
                let Some(text) = item.value().text() else {
                    continue;
                };

                match item.key() {
                    ItemKey::ReplayGainTrackGain => {
                        gain.track = parse_gain_value(text);
                        gain.found = true;
                    }
                    ItemKey::ReplayGainAlbumGain => {
                        gain.album = parse_gain_value(text);
                        gain.found = true;
                    }
                    ItemKey::Unknown(key) if key.eq_ignore_ascii_case(R128_TRACK_GAIN) => {
                        if let Some(value) = parse_r128_value(text) {
                            gain.track = value;
                            gain.found = true;
                        }
                    }
                    ItemKey::Unknown(key) if key.eq_ignore_ascii_case(R128_ALBUM_GAIN) => {
                        if let Some(value) = parse_r128_value(text) {
                            gain.album = value;
                            gain.found = true;
                        }
                    }
                    _ => {}
                }
            }
        }

        if tagged_file.file_type() == FileType::Opus {
            gain.base = read_opus_base_gain(path)?;
        }

        debug!(
            file = ?path.file_name(),
            track = gain.track,
            album = gain.album,
            base = gain.base,
            found = gain.found,
            "Read replay gain"
        );

        Ok(gain)
    }
}

impl Default for ReplayGainReader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_opus_base_gain(path: &Path) -> Result<f32> {
    let mut head = Vec::with_capacity(OPUS_HEAD_SCAN_BYTES);
    File::open(path)?
        .take(OPUS_HEAD_SCAN_BYTES as u64)
        .read_to_end(&mut head)?;

    let base = opus_header_gain(&head).unwrap_or_else(|| {
        trace!("OpusHead not found in first {} bytes", OPUS_HEAD_SCAN_BYTES);
        0.0
    });
    Ok(base)
}
