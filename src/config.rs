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

//! Engine configuration, loaded from YAML with the `config` crate.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use serde::Deserialize;

use crate::transport::validate_tempo;

pub mod audio;
pub mod error;
pub mod pattern;
pub mod voices;

pub use self::audio::Audio;
pub use self::error::ConfigError;
pub use self::pattern::{GridPattern, PatternFile};
pub use self::voices::VoiceDefinition;

/// Default number of steps in every pattern.
pub const DEFAULT_STEPS_PER_PATTERN: usize = 32;

/// Default number of pattern grids.
pub const DEFAULT_GRID_COUNT: usize = 4;

/// Default tempo in beats per minute.
pub const DEFAULT_TEMPO_BPM: f64 = 120.0;

const DEFAULT_SAMPLES_ROOT: &str = "samples";

/// Maps a knob position onto a semantic range.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct KnobMapping {
    /// Lowest knob position.
    min: f32,
    /// Highest knob position.
    max: f32,
    /// Knob position that maps to the neutral value.
    center: f32,
    /// Distance from the center that maps to one unit of offset.
    range: f32,
}

impl KnobMapping {
    pub const fn new(min: f32, max: f32, center: f32, range: f32) -> KnobMapping {
        KnobMapping {
            min,
            max,
            center,
            range,
        }
    }

    /// Clamps a knob position into the knob's travel.
    pub fn clamp(&self, knob: f32) -> f32 {
        knob.clamp(self.min, self.max)
    }

    /// Signed offset from center in units of range. With the default 0-100
    /// knob this yields -1.0..=1.0.
    pub fn offset(&self, knob: f32) -> f32 {
        (self.clamp(knob) - self.center) / self.range
    }

    /// Position as a fraction of the full travel, 0.0..=1.0.
    pub fn fraction(&self, knob: f32) -> f32 {
        (self.clamp(knob) - self.min) / (self.max - self.min)
    }

    fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        let finite = [self.min, self.max, self.center, self.range]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.min >= self.max || self.range <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field,
                reason: format!(
                    "min ({}), max ({}), center ({}) and range ({}) must be finite, \
                     with min below max and a positive range",
                    self.min, self.max, self.center, self.range
                ),
            });
        }
        Ok(())
    }
}

impl Default for KnobMapping {
    fn default() -> Self {
        KnobMapping::new(0.0, 100.0, 50.0, 50.0)
    }
}

/// Engine-level settings that don't depend on any voice.
#[derive(Deserialize, Clone, Debug)]
pub struct EngineSettings {
    #[serde(default = "default_steps_per_pattern")]
    steps_per_pattern: usize,

    #[serde(default = "default_grid_count")]
    grid_count: usize,

    #[serde(default = "default_tempo_bpm")]
    default_tempo_bpm: f64,

    /// Whether a tempo change during playback restarts the pattern from step 0.
    #[serde(default = "default_reset_on_tempo_change")]
    reset_on_tempo_change: bool,

    #[serde(default)]
    pitch_knob: KnobMapping,

    #[serde(default)]
    pan_knob: KnobMapping,

    #[serde(default)]
    gain_knob: KnobMapping,
}

fn default_steps_per_pattern() -> usize {
    DEFAULT_STEPS_PER_PATTERN
}

fn default_grid_count() -> usize {
    DEFAULT_GRID_COUNT
}

fn default_tempo_bpm() -> f64 {
    DEFAULT_TEMPO_BPM
}

fn default_reset_on_tempo_change() -> bool {
    true
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            steps_per_pattern: DEFAULT_STEPS_PER_PATTERN,
            grid_count: DEFAULT_GRID_COUNT,
            default_tempo_bpm: DEFAULT_TEMPO_BPM,
            reset_on_tempo_change: true,
            pitch_knob: KnobMapping::default(),
            pan_knob: KnobMapping::default(),
            gain_knob: KnobMapping::default(),
        }
    }
}

impl EngineSettings {
    pub fn with_steps_per_pattern(mut self, steps: usize) -> Self {
        self.steps_per_pattern = steps;
        self
    }

    pub fn with_grid_count(mut self, grids: usize) -> Self {
        self.grid_count = grids;
        self
    }

    pub fn with_default_tempo(mut self, bpm: f64) -> Self {
        self.default_tempo_bpm = bpm;
        self
    }

    pub fn with_reset_on_tempo_change(mut self, reset: bool) -> Self {
        self.reset_on_tempo_change = reset;
        self
    }

    pub fn steps_per_pattern(&self) -> usize {
        self.steps_per_pattern
    }

    pub fn grid_count(&self) -> usize {
        self.grid_count
    }

    pub fn default_tempo_bpm(&self) -> f64 {
        self.default_tempo_bpm
    }

    pub fn reset_on_tempo_change(&self) -> bool {
        self.reset_on_tempo_change
    }

    pub fn pitch_knob(&self) -> KnobMapping {
        self.pitch_knob
    }

    pub fn pan_knob(&self) -> KnobMapping {
        self.pan_knob
    }

    pub fn gain_knob(&self) -> KnobMapping {
        self.gain_knob
    }

    /// Checks that the settings describe a usable engine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.steps_per_pattern == 0 {
            return Err(ConfigError::InvalidValue {
                field: "steps_per_pattern",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.grid_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "grid_count",
                reason: "must be at least 1".to_string(),
            });
        }
        if let Err(e) = validate_tempo(self.default_tempo_bpm) {
            return Err(ConfigError::InvalidValue {
                field: "default_tempo_bpm",
                reason: e.to_string(),
            });
        }
        self.pitch_knob.validate("pitch_knob")?;
        self.pan_knob.validate("pan_knob")?;
        self.gain_knob.validate("gain_knob")?;
        Ok(())
    }
}

/// The full engine configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct EngineConfig {
    #[serde(flatten)]
    settings: EngineSettings,

    /// Directory that sample paths are relative to, itself relative to the config file.
    samples_root: Option<PathBuf>,

    /// The voices, in declaration order.
    voices: Vec<VoiceDefinition>,

    /// Canonical voice ordering mapping voices to pattern rows. Defaults to declaration order.
    #[serde(default)]
    order: Vec<String>,

    /// Audio output configuration.
    audio: Option<Audio>,

    /// The directory the config was loaded from.
    #[serde(skip)]
    base_path: PathBuf,
}

impl EngineConfig {
    /// Creates a config programmatically.
    pub fn new(settings: EngineSettings, voices: Vec<VoiceDefinition>) -> EngineConfig {
        EngineConfig {
            settings,
            samples_root: None,
            voices,
            order: Vec::new(),
            audio: None,
            base_path: PathBuf::from("."),
        }
    }

    /// Loads and validates a config file. Relative paths inside it resolve
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<EngineConfig, ConfigError> {
        let mut config: EngineConfig = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;
        config.base_path = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a YAML config from a string.
    pub fn parse(yaml: &str, base_path: &Path) -> Result<EngineConfig, ConfigError> {
        let mut config: EngineConfig = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        config.base_path = base_path.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    pub fn with_samples_root(mut self, samples_root: PathBuf) -> Self {
        self.samples_root = Some(samples_root);
        self
    }

    pub fn with_order(mut self, order: Vec<String>) -> Self {
        self.order = order;
        self
    }

    pub fn with_base_path(mut self, base_path: PathBuf) -> Self {
        self.base_path = base_path;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn voices(&self) -> &[VoiceDefinition] {
        &self.voices
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Returns the voice ids in canonical (row) order.
    pub fn voice_order(&self) -> Vec<&str> {
        if self.order.is_empty() {
            self.voices.iter().map(|voice| voice.id()).collect()
        } else {
            self.order.iter().map(String::as_str).collect()
        }
    }

    /// Returns the resolved samples directory.
    pub fn samples_root(&self) -> PathBuf {
        let root = self
            .samples_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SAMPLES_ROOT));
        if root.is_absolute() {
            root
        } else {
            self.base_path.join(root)
        }
    }

    /// Returns the audio configuration, or the defaults if none was given.
    pub fn audio(&self) -> Audio {
        self.audio.clone().unwrap_or_default()
    }

    /// Validates settings, voice ids and the canonical ordering.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.settings.validate()?;

        if self.voices.is_empty() {
            return Err(ConfigError::NoVoices);
        }

        let mut ids = HashSet::new();
        for voice in &self.voices {
            if !ids.insert(voice.id()) {
                return Err(ConfigError::DuplicateVoice(voice.id().to_string()));
            }
        }

        if !self.order.is_empty() {
            let mut seen = HashSet::new();
            for id in &self.order {
                if !ids.contains(id.as_str()) {
                    return Err(ConfigError::UnknownVoiceInOrder(id.clone()));
                }
                if !seen.insert(id.as_str()) {
                    return Err(ConfigError::IncompleteOrder);
                }
            }
            if seen.len() != ids.len() {
                return Err(ConfigError::IncompleteOrder);
            }
        }

        Ok(())
    }
}
