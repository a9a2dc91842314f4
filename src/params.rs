// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Per-voice runtime parameters: armed sample, gain, pan and playback rate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::KnobMapping;
use crate::voices::{Voice, VoiceId, VoiceRegistry};

/// Lowest gain a voice can be set to. Silence is a near-zero floor rather than
/// a true zero so downstream gain curves stay finite.
pub const GAIN_FLOOR: f32 = 0.0001;

/// The runtime state of one voice.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceParams {
    /// Position in the voice pool's flattened leaf order.
    cursor: usize,
    /// The armed sample.
    current_sample: PathBuf,
    gain: f32,
    pan: f32,
    playback_rate: f32,
}

impl VoiceParams {
    /// Creates the initial state for a voice: first leaf armed, unity gain,
    /// centered, unpitched.
    pub fn new(voice: &Voice) -> VoiceParams {
        VoiceParams {
            cursor: 0,
            current_sample: voice
                .pool()
                .first()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            gain: 1.0,
            pan: 0.0,
            playback_rate: 1.0,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current_sample(&self) -> &Path {
        &self.current_sample
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn playback_rate(&self) -> f32 {
        self.playback_rate
    }

    /// Sets the gain, clamped to [GAIN_FLOOR, 1]. Returns the applied value.
    pub fn set_gain(&mut self, value: f32) -> f32 {
        self.gain = if value.is_nan() {
            GAIN_FLOOR
        } else {
            value.clamp(GAIN_FLOOR, 1.0)
        };
        self.gain
    }

    /// Sets the pan, clamped to [-1, 1] with 0 as center. Returns the applied value.
    pub fn set_pan(&mut self, value: f32) -> f32 {
        self.pan = if value.is_nan() {
            0.0
        } else {
            value.clamp(-1.0, 1.0)
        };
        self.pan
    }

    /// Sets the playback rate from a pitch knob position. The rate is
    /// 2^((knob - center) / range), so the knob is linear in octaves.
    pub fn set_pitch(&mut self, knob: f32, mapping: &KnobMapping) -> f32 {
        let knob = if knob.is_nan() { 0.0 } else { knob };
        self.playback_rate = 2f32.powf(mapping.offset(knob));
        self.playback_rate
    }

    /// Moves the cursor to the next leaf of the pool, wrapping after the last,
    /// and arms it. Does not load or play the sample.
    pub fn advance(&mut self, voice: &Voice) -> &Path {
        let pool = voice.pool();
        if !pool.is_empty() {
            self.cursor = (self.cursor + 1) % pool.len();
            if let Some(leaf) = pool.leaf(self.cursor) {
                self.current_sample = leaf.to_path_buf();
            }
        }
        &self.current_sample
    }
}

/// Runtime parameters for every voice in a registry.
#[derive(Debug, Clone)]
pub struct ParameterState {
    params: HashMap<VoiceId, VoiceParams>,
    pitch_knob: KnobMapping,
}

impl ParameterState {
    pub fn new(registry: &VoiceRegistry, pitch_knob: KnobMapping) -> ParameterState {
        ParameterState {
            params: registry
                .iter()
                .map(|voice| (voice.id().clone(), VoiceParams::new(voice)))
                .collect(),
            pitch_knob,
        }
    }

    pub fn get(&self, id: &VoiceId) -> Option<&VoiceParams> {
        self.params.get(id)
    }

    pub fn get_mut(&mut self, id: &VoiceId) -> Option<&mut VoiceParams> {
        self.params.get_mut(id)
    }

    pub fn pitch_knob(&self) -> &KnobMapping {
        &self.pitch_knob
    }

    /// Restores every voice to its initial state.
    pub fn reset(&mut self, registry: &VoiceRegistry) {
        *self = ParameterState::new(registry, self.pitch_knob);
    }
}
