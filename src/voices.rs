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

//! The voice registry: the static catalog of instrument slots.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::config::{ConfigError, EngineConfig};

mod pool;

pub use pool::{sample_label, PoolError, SoundPool, SoundPoolNode};

/// The stable identity of a voice.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(String);

impl VoiceId {
    pub fn new(id: &str) -> VoiceId {
        VoiceId(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VoiceId {
    fn from(id: &str) -> Self {
        VoiceId::new(id)
    }
}

/// One instrument slot.
#[derive(Debug, Clone)]
pub struct Voice {
    id: VoiceId,
    label: String,
    color: String,
    /// The pattern matrix row, assigned by the registry from the canonical ordering.
    row: usize,
    pool: SoundPool,
}

impl Voice {
    /// Creates a voice. The row is assigned when the voice joins a registry.
    pub fn new(id: &str, label: &str, color: &str, pool: SoundPool) -> Voice {
        Voice {
            id: VoiceId::new(id),
            label: label.to_string(),
            color: color.to_string(),
            row: 0,
            pool,
        }
    }

    pub fn id(&self) -> &VoiceId {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn pool(&self) -> &SoundPool {
        &self.pool
    }
}

/// The catalog of voices, held in canonical row order.
#[derive(Debug, Clone)]
pub struct VoiceRegistry {
    voices: Vec<Voice>,
    rows: HashMap<VoiceId, usize>,
}

impl VoiceRegistry {
    /// Creates a registry. `order` lists voice ids in row order; an empty order
    /// keeps the declaration order.
    pub fn new(voices: Vec<Voice>, order: &[&str]) -> Result<VoiceRegistry, ConfigError> {
        if voices.is_empty() {
            return Err(ConfigError::NoVoices);
        }

        let mut by_id: HashMap<VoiceId, Voice> = HashMap::with_capacity(voices.len());
        let mut declared = Vec::with_capacity(voices.len());
        for voice in voices {
            if voice.pool.is_empty() {
                return Err(ConfigError::EmptyPool(voice.id.to_string()));
            }
            declared.push(voice.id.clone());
            if let Some(previous) = by_id.insert(voice.id.clone(), voice) {
                return Err(ConfigError::DuplicateVoice(previous.id.to_string()));
            }
        }

        let ordering: Vec<VoiceId> = if order.is_empty() {
            declared
        } else {
            if order.len() != by_id.len() {
                return Err(ConfigError::IncompleteOrder);
            }
            order.iter().map(|id| VoiceId::new(id)).collect()
        };

        let mut ordered = Vec::with_capacity(ordering.len());
        let mut rows = HashMap::with_capacity(ordering.len());
        for (row, id) in ordering.into_iter().enumerate() {
            let mut voice = match by_id.remove(&id) {
                Some(voice) => voice,
                None if rows.contains_key(&id) => return Err(ConfigError::IncompleteOrder),
                None => return Err(ConfigError::UnknownVoiceInOrder(id.to_string())),
            };
            voice.row = row;
            rows.insert(id, row);
            ordered.push(voice);
        }

        Ok(VoiceRegistry {
            voices: ordered,
            rows,
        })
    }

    /// Builds the registry from configuration, reading every voice's sound list.
    pub fn from_config(config: &EngineConfig) -> Result<VoiceRegistry, ConfigError> {
        let mut voices = Vec::with_capacity(config.voices().len());
        for definition in config.voices() {
            let json = definition.pool_json(config.base_path())?;
            let pool = SoundPool::from_json(&json).map_err(|e| ConfigError::InvalidPool {
                voice: definition.id().to_string(),
                reason: e.to_string(),
            })?;
            debug!(
                voice = definition.id(),
                samples = pool.len(),
                "Loaded sound pool"
            );
            voices.push(Voice::new(
                definition.id(),
                definition.label(),
                definition.color(),
                pool,
            ));
        }

        VoiceRegistry::new(voices, &config.voice_order())
    }

    /// Returns the voice with the given id.
    pub fn get(&self, id: &VoiceId) -> Option<&Voice> {
        self.rows.get(id).map(|row| &self.voices[*row])
    }

    /// Returns the voice on the given row.
    pub fn by_row(&self, row: usize) -> Option<&Voice> {
        self.voices.get(row)
    }

    /// Returns the row for the given voice id.
    pub fn row_of(&self, id: &VoiceId) -> Option<usize> {
        self.rows.get(id).copied()
    }

    /// Iterates voices in canonical row order.
    pub fn iter(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::path::Path;

    use serde_json::json;

    use super::*;
    use crate::config::{EngineSettings, VoiceDefinition};

    fn voice(id: &str) -> Voice {
        Voice::new(
            id,
            id,
            "#ffffff",
            SoundPool::from_paths([format!("{}/1.wav", id)]),
        )
    }

    #[test]
    fn test_declaration_order() -> Result<(), Box<dyn Error>> {
        let registry = VoiceRegistry::new(vec![voice("kick"), voice("snare")], &[])?;
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.row_of(&VoiceId::new("kick")), Some(0));
        assert_eq!(registry.row_of(&VoiceId::new("snare")), Some(1));
        assert_eq!(registry.by_row(1).map(|v| v.id().as_str()), Some("snare"));
        Ok(())
    }

    #[test]
    fn test_canonical_order_overrides_declaration() -> Result<(), Box<dyn Error>> {
        let registry = VoiceRegistry::new(
            vec![voice("kick"), voice("snare"), voice("hat")],
            &["hat", "kick", "snare"],
        )?;
        let ids: Vec<&str> = registry.iter().map(|v| v.id().as_str()).collect();
        assert_eq!(ids, vec!["hat", "kick", "snare"]);
        assert_eq!(registry.get(&VoiceId::new("kick")).map(Voice::row), Some(1));
        assert!(registry.get(&VoiceId::new("tom")).is_none());
        Ok(())
    }

    #[test]
    fn test_rejects_invalid_registries() {
        assert!(matches!(
            VoiceRegistry::new(vec![], &[]),
            Err(ConfigError::NoVoices)
        ));
        assert!(matches!(
            VoiceRegistry::new(vec![voice("kick"), voice("kick")], &[]),
            Err(ConfigError::DuplicateVoice(_))
        ));
        assert!(matches!(
            VoiceRegistry::new(vec![voice("kick")], &["snare"]),
            Err(ConfigError::UnknownVoiceInOrder(_))
        ));
        assert!(matches!(
            VoiceRegistry::new(vec![voice("kick"), voice("snare")], &["kick", "kick"]),
            Err(ConfigError::IncompleteOrder)
        ));

        let empty = Voice::new("kick", "kick", "#fff", SoundPool::new(vec![]));
        assert!(matches!(
            VoiceRegistry::new(vec![empty], &[]),
            Err(ConfigError::EmptyPool(_))
        ));
    }

    #[test]
    fn test_from_config() -> Result<(), Box<dyn Error>> {
        let config = EngineConfig::new(
            EngineSettings::default(),
            vec![
                VoiceDefinition::new("kick", json!({"kick": ["k1.wav", "k2.wav"]}))
                    .with_label("Kick")
                    .with_color("#ff0000"),
                VoiceDefinition::new("snare", json!({"snare": {"acoustic": ["s1.wav"]}})),
            ],
        )
        .with_order(vec!["snare".to_string(), "kick".to_string()]);

        let registry = VoiceRegistry::from_config(&config)?;
        let kick = registry.get(&VoiceId::new("kick")).unwrap();
        assert_eq!(kick.row(), 1);
        assert_eq!(kick.label(), "Kick");
        assert_eq!(kick.color(), "#ff0000");
        assert_eq!(kick.pool().len(), 2);

        let snare = registry.by_row(0).unwrap();
        assert_eq!(snare.pool().first(), Some(Path::new("snare/acoustic/s1.wav")));
        Ok(())
    }

    #[test]
    fn test_from_config_invalid_pool() {
        let config = EngineConfig::new(
            EngineSettings::default(),
            vec![VoiceDefinition::new("kick", json!({"kick": [42]}))],
        );
        assert!(matches!(
            VoiceRegistry::from_config(&config),
            Err(ConfigError::InvalidPool { voice, .. }) if voice == "kick"
        ));

        let repeated = EngineConfig::new(
            EngineSettings::default(),
            vec![VoiceDefinition::new("hat", json!(["h1.wav", "h2.wav", "h1.wav"]))],
        );
        assert!(matches!(
            VoiceRegistry::from_config(&repeated),
            Err(ConfigError::InvalidPool { voice, reason })
                if voice == "hat" && reason.contains("h1.wav")
        ));
    }
}
