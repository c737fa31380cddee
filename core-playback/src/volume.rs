//! Output volume arbitration between replay gain and ducking.
//!
//! Ducking, while active, always wins over replay gain. With neither set the
//! output runs at unity gain. The result only depends on the current inputs,
//! never on the order they were set in.

use serde::{Deserialize, Serialize};

/// Volume factor used while ducked unless configured otherwise (about -14 dB).
pub const DEFAULT_DUCKING_FACTOR: f32 = 0.2;

/// Inputs currently latched on an arbiter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeState {
    pub replay_gain: Option<f32>,
    pub ducking: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeArbiter {
    replay_gain: Option<f32>,
    ducked: bool,
    ducking_factor: f32,
}

impl Default for VolumeArbiter {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumeArbiter {
    pub fn new() -> Self {
        Self {
            replay_gain: None,
            ducked: false,
            ducking_factor: DEFAULT_DUCKING_FACTOR,
        }
    }

    /// Latch a linear replay-gain factor. `NaN` clears it.
    pub fn set_replay_gain(&mut self, value: f32) {
        self.replay_gain = if value.is_nan() {
            None
        } else {
            Some(value.clamp(0.0, 1.0))
        };
    }

    pub fn clear_replay_gain(&mut self) {
        self.replay_gain = None;
    }

    pub fn set_ducking(&mut self, is_ducking: bool) {
        self.ducked = is_ducking;
    }

    /// Factor applied while ducked. `NaN` turns ducking into a no-op.
    pub fn set_ducking_factor(&mut self, factor: f32) {
        self.ducking_factor = if factor.is_nan() {
            f32::NAN
        } else {
            factor.clamp(0.0, 1.0)
        };
    }

    pub fn ducking_factor(&self) -> f32 {
        self.ducking_factor
    }

    pub fn is_ducking(&self) -> bool {
        self.ducked
    }

    pub fn state(&self) -> VolumeState {
        let ducking = (self.ducked && !self.ducking_factor.is_nan()).then_some(self.ducking_factor);
        VolumeState {
            replay_gain: self.replay_gain,
            ducking,
        }
    }

    /// Volume the sounding player should use right now.
    pub fn resolve(&self) -> f32 {
        let state = self.state();
        state.ducking.or(state.replay_gain).unwrap_or(1.0)
    }
}
