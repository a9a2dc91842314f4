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
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::error::ConfigError;

/// Accent color used when a voice doesn't declare one.
pub const DEFAULT_VOICE_COLOR: &str = "#ffffff";

/// A YAML representation of a voice (one pad and one row in every grid).
#[derive(Deserialize, Clone, Debug)]
pub struct VoiceDefinition {
    /// The stable voice identifier.
    id: String,

    /// The pad label. Defaults to the id.
    label: Option<String>,

    /// The accent color used by the view for this voice.
    color: Option<String>,

    /// Path to a JSON sound list, relative to the config file.
    sound_list: Option<PathBuf>,

    /// An inline sound pool, in the same shape as a sound list file.
    pool: Option<serde_json::Value>,
}

impl VoiceDefinition {
    /// Creates a voice definition with an inline pool.
    pub fn new(id: &str, pool: serde_json::Value) -> VoiceDefinition {
        VoiceDefinition {
            id: id.to_string(),
            label: None,
            color: None,
            sound_list: None,
            pool: Some(pool),
        }
    }

    /// Creates a voice definition whose pool is read from a sound list file.
    pub fn from_sound_list(id: &str, sound_list: PathBuf) -> VoiceDefinition {
        VoiceDefinition {
            id: id.to_string(),
            label: None,
            color: None,
            sound_list: Some(sound_list),
            pool: None,
        }
    }

    pub fn with_label(mut self, label: &str) -> VoiceDefinition {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_color(mut self, color: &str) -> VoiceDefinition {
        self.color = Some(color.to_string());
        self
    }

    /// Returns the voice id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the pad label.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    /// Returns the accent color.
    pub fn color(&self) -> &str {
        self.color.as_deref().unwrap_or(DEFAULT_VOICE_COLOR)
    }

    /// Returns the raw pool JSON, reading the sound list file if one is configured.
    /// An inline pool takes precedence over a sound list.
    pub fn pool_json(&self, base_path: &Path) -> Result<serde_json::Value, ConfigError> {
        if let Some(pool) = &self.pool {
            return Ok(pool.clone());
        }

        let sound_list = match &self.sound_list {
            Some(sound_list) => sound_list,
            None => return Err(ConfigError::MissingPool(self.id.clone())),
        };
        let path = if sound_list.is_absolute() {
            sound_list.clone()
        } else {
            base_path.join(sound_list)
        };

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Json { path, source })
    }
}
