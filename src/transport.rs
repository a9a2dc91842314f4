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

//! The transport state machine: play state, position and tempo. The clock
//! itself lives in the engine; this type only tracks where playback is.

use std::time::Duration;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Stopped,
    Playing,
}

#[derive(Debug, Clone)]
pub struct Transport {
    mode: TransportMode,
    current_step: usize,
    active_grid: usize,
    tempo_bpm: f64,
    /// Incremented every time a clock is started or stopped. A clock task only
    /// ticks while its generation matches.
    generation: u64,
}

/// The slowest clock the transport will run. Tempos below roughly 0.0042 BPM
/// would exceed it.
pub const MAX_TICK_INTERVAL: Duration = Duration::from_secs(3600);

/// Sixteenth-note interval for a tempo, if the clock can run at it.
fn interval_for(bpm: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(60.0 / bpm / 4.0)
        .ok()
        .filter(|interval| !interval.is_zero() && *interval <= MAX_TICK_INTERVAL)
}

/// Checks that a tempo is a positive, finite number of beats per minute whose
/// tick interval is non-zero and no longer than [MAX_TICK_INTERVAL].
pub fn validate_tempo(bpm: f64) -> Result<f64, EngineError> {
    interval_for(bpm)
        .map(|_| bpm)
        .ok_or(EngineError::InvalidTempo(bpm))
}

impl Transport {
    pub fn new(tempo_bpm: f64) -> Transport {
        Transport {
            mode: TransportMode::Stopped,
            current_step: 0,
            active_grid: 0,
            tempo_bpm,
            generation: 0,
        }
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    pub fn is_playing(&self) -> bool {
        self.mode == TransportMode::Playing
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn active_grid(&self) -> usize {
        self.active_grid
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.tempo_bpm
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The time between ticks. Each tick is a sixteenth note.
    pub fn tick_interval(&self) -> Duration {
        // Tempos reaching the transport have passed validate_tempo.
        interval_for(self.tempo_bpm).unwrap_or(MAX_TICK_INTERVAL)
    }

    /// Enters the playing state at step 0 of `first_grid`. Returns the new
    /// clock generation.
    pub(crate) fn begin(&mut self, first_grid: usize) -> u64 {
        self.mode = TransportMode::Playing;
        self.current_step = 0;
        self.active_grid = first_grid;
        self.bump()
    }

    /// Enters the stopped state. Position is kept until the next start.
    pub(crate) fn end(&mut self) -> u64 {
        self.mode = TransportMode::Stopped;
        self.bump()
    }

    /// Invalidates the running clock without moving the position.
    pub(crate) fn bump(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }

    pub(crate) fn set_tempo(&mut self, bpm: f64) {
        self.tempo_bpm = bpm;
    }

    pub(crate) fn set_active_grid(&mut self, grid: usize) {
        self.active_grid = grid;
    }

    /// Moves to the next step. Returns true when the step wrapped back to 0.
    pub(crate) fn advance_step(&mut self, steps_per_pattern: usize) -> bool {
        self.current_step = (self.current_step + 1) % steps_per_pattern.max(1);
        self.current_step == 0
    }

    pub(crate) fn reset(&mut self, tempo_bpm: f64) {
        let generation = self.generation;
        *self = Transport::new(tempo_bpm);
        self.generation = generation.wrapping_add(1);
    }
}
