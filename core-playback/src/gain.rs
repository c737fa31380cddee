//! Replay-gain resolution.
//!
//! Turns the dB values read from a file's tags plus the user's replay-gain
//! preferences into a linear volume factor in `[0, 1]`.
//!
//! Album mode prefers the album value and falls back to the track value;
//! track mode does the opposite. Tagged files get the user's bump on top of
//! the stream's base gain, untagged files get the untagged de-bump. Positive
//! results are clipped at unity since players cannot amplify.

use core_metadata::GainValues;
use core_runtime::config::ReplayGainSettings;

/// Linear factor for `gain` under `settings`.
///
/// Returns `1.0` when replay gain is disabled.
pub fn resolve_replay_gain(gain: &GainValues, settings: &ReplayGainSettings) -> f32 {
    if !settings.is_enabled() {
        return 1.0;
    }

    let mut adjust = 0.0_f32;

    if settings.album_enabled {
        adjust = first_nonzero(gain.album, gain.track);
    }

    if settings.track_enabled || (settings.album_enabled && adjust == 0.0) {
        adjust = first_nonzero(gain.track, gain.album);
    }

    // Tagged vs. untagged is decided by whether any gain tag was present,
    // not by `adjust == 0`, so a file tagged 0.00 dB still gets the bump.
    if gain.found {
        adjust += gain.base + settings.bump_db();
    } else {
        adjust = settings.untagged_debump_db();
    }

    db_to_linear(adjust).clamp(0.0, 1.0)
}

pub fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

fn first_nonzero(preferred: f32, fallback: f32) -> f32 {
    if preferred != 0.0 {
        preferred
    } else {
        fallback
    }
}
