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

//! The engine's owned state: voices, patterns, per-voice parameters and the
//! transport, mutated only through the operations below. Every operation is
//! synchronous and leaves the state consistent when it returns.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::audio::AudioSink;
use crate::config::{ConfigError, EngineConfig, EngineSettings, PatternFile};
use crate::error::EngineError;
use crate::params::{ParameterState, VoiceParams};
use crate::pattern::PatternStore;
use crate::samples::SampleStore;
use crate::transport::{validate_tempo, Transport};
use crate::trigger::{self, UnresolvedSample};
use crate::voices::{sample_label, VoiceId, VoiceRegistry};

/// What a single clock tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A step was rendered.
    Rendered {
        grid: usize,
        step: usize,
        fired: Vec<VoiceId>,
        misses: usize,
    },
    /// No grid was active, so the transport stopped itself.
    Stopped,
    /// The transport was not playing.
    Idle,
}

/// What a manual pad trigger did.
#[derive(Debug, Clone, PartialEq)]
pub enum PadOutcome {
    /// The voice's current sample was sent to the sink.
    Played,
    /// The voice's current sample isn't loaded yet.
    Missed(UnresolvedSample),
    /// The engine is in change-samples mode; the voice moved to a new sample
    /// instead of sounding.
    Resampled { path: PathBuf, label: String },
}

pub struct EngineState {
    settings: EngineSettings,
    registry: VoiceRegistry,
    patterns: PatternStore,
    params: ParameterState,
    transport: Transport,
    visible_grid: usize,
    change_samples_mode: bool,
    miss_count: u64,
}

impl EngineState {
    pub fn new(settings: EngineSettings, registry: VoiceRegistry) -> EngineState {
        let patterns = PatternStore::new(
            settings.grid_count(),
            registry.len(),
            settings.steps_per_pattern(),
        );
        let params = ParameterState::new(&registry, settings.pitch_knob());
        let transport = Transport::new(settings.default_tempo_bpm());
        EngineState {
            settings,
            registry,
            patterns,
            params,
            transport,
            visible_grid: 0,
            change_samples_mode: false,
            miss_count: 0,
        }
    }

    /// Validates the configuration and builds the voice registry from it.
    pub fn from_config(config: &EngineConfig) -> Result<EngineState, ConfigError> {
        config.validate()?;
        let registry = VoiceRegistry::from_config(config)?;
        Ok(EngineState::new(config.settings().clone(), registry))
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn registry(&self) -> &VoiceRegistry {
        &self.registry
    }

    pub fn patterns(&self) -> &PatternStore {
        &self.patterns
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn visible_grid(&self) -> usize {
        self.visible_grid
    }

    pub fn change_samples_mode(&self) -> bool {
        self.change_samples_mode
    }

    /// The number of hits dropped because their sample wasn't loaded.
    pub fn miss_count(&self) -> u64 {
        self.miss_count
    }

    fn row(&self, voice: &VoiceId) -> Result<usize, EngineError> {
        self.registry
            .row_of(voice)
            .ok_or_else(|| EngineError::UnknownVoice(voice.clone()))
    }

    pub fn voice_params(&self, voice: &VoiceId) -> Result<&VoiceParams, EngineError> {
        self.params
            .get(voice)
            .ok_or_else(|| EngineError::UnknownVoice(voice.clone()))
    }

    fn voice_params_mut(&mut self, voice: &VoiceId) -> Result<&mut VoiceParams, EngineError> {
        self.params
            .get_mut(voice)
            .ok_or_else(|| EngineError::UnknownVoice(voice.clone()))
    }

    pub fn cell(&self, grid: usize, voice: &VoiceId, step: usize) -> Result<bool, EngineError> {
        self.patterns.cell(grid, self.row(voice)?, step)
    }

    /// Flips a cell and returns its new value.
    pub fn toggle_cell(
        &mut self,
        grid: usize,
        voice: &VoiceId,
        step: usize,
    ) -> Result<bool, EngineError> {
        let row = self.row(voice)?;
        self.patterns.toggle_cell(grid, row, step)
    }

    pub fn set_cell(
        &mut self,
        grid: usize,
        voice: &VoiceId,
        step: usize,
        value: bool,
    ) -> Result<(), EngineError> {
        let row = self.row(voice)?;
        self.patterns.set_cell(grid, row, step, value)
    }

    pub fn clear_grid(&mut self, grid: usize) -> Result<(), EngineError> {
        self.patterns.clear_grid(grid)
    }

    /// Sets a grid's active flag. If the grid playback targets is no longer
    /// active, playback moves forward to the next active grid. With no grid
    /// active the target is left alone and the next tick stops the transport.
    pub fn set_grid_active(&mut self, grid: usize, active: bool) -> Result<(), EngineError> {
        self.patterns.set_active(grid, active)?;
        self.retarget_active_grid();
        Ok(())
    }

    fn retarget_active_grid(&mut self) {
        let current = self.transport.active_grid();
        if let Some(next) = self.patterns.next_active(current, true) {
            if next != current {
                debug!(from = current, to = next, "Moving playback to next active grid");
                self.transport.set_active_grid(next);
            }
        }
    }

    /// Records the grid the view is showing. Has no effect on playback.
    pub fn switch_visible_grid(&mut self, grid: usize) -> Result<(), EngineError> {
        self.patterns.grid(grid)?;
        self.visible_grid = grid;
        Ok(())
    }

    /// Sets a voice's gain. Returns the applied (clamped) value.
    pub fn set_gain(&mut self, voice: &VoiceId, value: f32) -> Result<f32, EngineError> {
        Ok(self.voice_params_mut(voice)?.set_gain(value))
    }

    /// Sets a voice's pan. Returns the applied (clamped) value.
    pub fn set_pan(&mut self, voice: &VoiceId, value: f32) -> Result<f32, EngineError> {
        Ok(self.voice_params_mut(voice)?.set_pan(value))
    }

    /// Sets a voice's playback rate from a pitch knob position. Returns the rate.
    pub fn set_pitch(&mut self, voice: &VoiceId, knob: f32) -> Result<f32, EngineError> {
        let mapping = *self.params.pitch_knob();
        Ok(self.voice_params_mut(voice)?.set_pitch(knob, &mapping))
    }

    /// Sets a voice's gain from a gain knob position.
    pub fn set_gain_knob(&mut self, voice: &VoiceId, knob: f32) -> Result<f32, EngineError> {
        let gain = self.settings.gain_knob().fraction(knob);
        self.set_gain(voice, gain)
    }

    /// Sets a voice's pan from a pan knob position.
    pub fn set_pan_knob(&mut self, voice: &VoiceId, knob: f32) -> Result<f32, EngineError> {
        let pan = self.settings.pan_knob().offset(knob);
        self.set_pan(voice, pan)
    }

    /// Arms the next sample of the voice's pool and returns it.
    pub fn advance_sample(&mut self, voice: &VoiceId) -> Result<PathBuf, EngineError> {
        let definition = self
            .registry
            .get(voice)
            .ok_or_else(|| EngineError::UnknownVoice(voice.clone()))?;
        let params = self
            .params
            .get_mut(voice)
            .ok_or_else(|| EngineError::UnknownVoice(voice.clone()))?;
        Ok(params.advance(definition).to_path_buf())
    }

    pub fn current_sample(&self, voice: &VoiceId) -> Result<&Path, EngineError> {
        Ok(self.voice_params(voice)?.current_sample())
    }

    /// Flips change-samples mode and returns the new value.
    pub fn toggle_change_samples_mode(&mut self) -> bool {
        self.change_samples_mode = !self.change_samples_mode;
        info!(enabled = self.change_samples_mode, "Change samples mode");
        self.change_samples_mode
    }

    /// Starts playback from step 0 of the first active grid. Returns the new
    /// clock generation, or None if already playing.
    pub fn start(&mut self) -> Result<Option<u64>, EngineError> {
        if self.transport.is_playing() {
            return Ok(None);
        }
        let first = self
            .patterns
            .next_active(0, true)
            .ok_or(EngineError::NoActiveGrid)?;
        let generation = self.transport.begin(first);
        info!(
            grid = first,
            tempo = self.transport.tempo_bpm(),
            "Transport started"
        );
        Ok(Some(generation))
    }

    /// Stops playback. Returns false if it was already stopped.
    pub fn stop(&mut self) -> bool {
        if !self.transport.is_playing() {
            return false;
        }
        self.transport.end();
        info!(
            grid = self.transport.active_grid(),
            step = self.transport.current_step(),
            "Transport stopped"
        );
        true
    }

    /// Changes the tempo. Returns the generation of a clock that must be
    /// (re)started at the new interval, or None if the transport is stopped.
    ///
    /// While playing, the default behaviour is a stop and restart, which puts
    /// playback back at step 0. With `reset_on_tempo_change` disabled the
    /// position is kept and only the clock is retimed.
    pub fn set_tempo(&mut self, bpm: f64) -> Result<Option<u64>, EngineError> {
        let bpm = validate_tempo(bpm)?;
        self.transport.set_tempo(bpm);
        info!(tempo = bpm, "Tempo changed");

        if !self.transport.is_playing() {
            return Ok(None);
        }
        if self.settings.reset_on_tempo_change() {
            self.stop();
            self.start()
        } else {
            Ok(Some(self.transport.bump()))
        }
    }

    /// Advances the transport by one step, rendering the step through the sink.
    pub fn tick(&mut self, store: &SampleStore, sink: &dyn AudioSink) -> TickOutcome {
        if !self.transport.is_playing() {
            return TickOutcome::Idle;
        }
        if !self.patterns.any_active() {
            info!("No active grids, stopping transport");
            self.transport.end();
            return TickOutcome::Stopped;
        }

        self.retarget_active_grid();
        let grid = self.transport.active_grid();
        let step = self.transport.current_step();
        let Ok(pattern) = self.patterns.grid(grid) else {
            self.transport.end();
            return TickOutcome::Stopped;
        };

        let stats = trigger::on_tick(pattern, step, &self.registry, &self.params, store, sink);
        self.miss_count += stats.misses as u64;

        if self.transport.advance_step(self.patterns.steps()) {
            let after = (grid + 1) % self.patterns.grid_count();
            if let Some(next) = self.patterns.next_active(after, true) {
                self.transport.set_active_grid(next);
            }
        }

        TickOutcome::Rendered {
            grid,
            step,
            fired: stats.fired,
            misses: stats.misses,
        }
    }

    /// Handles a pad press. In change-samples mode the voice moves to its next
    /// sample without sounding; otherwise its current sample is played.
    pub fn trigger_voice(
        &mut self,
        voice: &VoiceId,
        store: &SampleStore,
        sink: &dyn AudioSink,
    ) -> Result<PadOutcome, EngineError> {
        if self.change_samples_mode {
            let path = self.advance_sample(voice)?;
            let label = sample_label(&path);
            info!(voice = %voice, sample = label, "Voice resampled");
            return Ok(PadOutcome::Resampled { path, label });
        }

        let definition = self
            .registry
            .get(voice)
            .ok_or_else(|| EngineError::UnknownVoice(voice.clone()))?;
        match trigger::resolve(definition, &self.params, store) {
            Ok(event) => {
                trigger::render(sink, event);
                Ok(PadOutcome::Played)
            }
            Err(unresolved) => {
                debug!(err = %unresolved, "Pad trigger missed");
                self.miss_count += 1;
                Ok(PadOutcome::Missed(unresolved))
            }
        }
    }

    /// Seeds grids from a pattern file. Grids the file doesn't mention keep
    /// their contents. Nothing changes if any entry is invalid.
    pub fn apply_pattern(&mut self, file: &PatternFile) -> Result<(), EngineError> {
        let mut patterns = self.patterns.clone();
        for (grid, contents) in file.grids().iter().enumerate() {
            patterns.clear_grid(grid)?;
            patterns.set_active(grid, contents.is_active())?;
            for (voice, steps) in contents.cells() {
                let row = self.row(&VoiceId::new(voice))?;
                for step in steps {
                    patterns.set_cell(grid, row, *step, true)?;
                }
            }
        }
        self.patterns = patterns;
        self.retarget_active_grid();
        Ok(())
    }

    /// Restores patterns, parameters and transport to their initial state.
    pub fn reset(&mut self) {
        self.patterns = PatternStore::new(
            self.settings.grid_count(),
            self.registry.len(),
            self.settings.steps_per_pattern(),
        );
        self.params.reset(&self.registry);
        self.transport.reset(self.settings.default_tempo_bpm());
        self.visible_grid = 0;
        self.change_samples_mode = false;
        self.miss_count = 0;
        info!("Engine state reset");
    }
}
