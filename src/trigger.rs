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

//! Resolves the hits of a single step into audio events.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::audio::{AudioEvent, AudioSink};
use crate::params::ParameterState;
use crate::pattern::PatternGrid;
use crate::samples::SampleStore;
use crate::voices::{Voice, VoiceId, VoiceRegistry};

/// A voice was due to sound but its current sample is not in the store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Sample {path:?} for voice {voice} has not been loaded")]
pub struct UnresolvedSample {
    pub voice: VoiceId,
    pub path: PathBuf,
}

/// The result of rendering one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerStats {
    /// Voices that were handed to the sink, in row order.
    pub fired: Vec<VoiceId>,
    /// Hits dropped because the sample was not loaded.
    pub misses: usize,
}

/// Builds the audio event for a voice from its current parameters.
pub fn resolve(
    voice: &Voice,
    params: &ParameterState,
    store: &SampleStore,
) -> Result<AudioEvent, UnresolvedSample> {
    let unresolved = |path: PathBuf| UnresolvedSample {
        voice: voice.id().clone(),
        path,
    };
    let Some(voice_params) = params.get(voice.id()) else {
        return Err(unresolved(PathBuf::new()));
    };
    let sample = voice_params.current_sample().to_path_buf();
    match store.get(&sample) {
        Some(buffer) => Ok(AudioEvent {
            voice: voice.id().clone(),
            sample,
            buffer,
            gain: voice_params.gain(),
            pan: voice_params.pan(),
            playback_rate: voice_params.playback_rate(),
        }),
        None => Err(unresolved(sample)),
    }
}

/// Sends an event to the sink. A sink failure is logged; it never interrupts
/// the caller.
pub fn render(sink: &dyn AudioSink, event: AudioEvent) -> bool {
    let voice = event.voice.clone();
    match sink.render(event) {
        Ok(()) => true,
        Err(e) => {
            warn!(voice = %voice, sink = %sink, err = %e, "Unable to render event");
            false
        }
    }
}

/// Renders every voice set at `step` in `grid`, in row order. Missing samples
/// are skipped and counted so the rest of the step keeps its timing.
pub fn on_tick(
    grid: &PatternGrid,
    step: usize,
    registry: &VoiceRegistry,
    params: &ParameterState,
    store: &SampleStore,
    sink: &dyn AudioSink,
) -> TriggerStats {
    let mut stats = TriggerStats::default();
    for row in grid.rows_at(step) {
        let Some(voice) = registry.by_row(row) else {
            continue;
        };
        match resolve(voice, params, store) {
            Ok(event) => {
                if render(sink, event) {
                    stats.fired.push(voice.id().clone());
                }
            }
            Err(e) => {
                warn!(grid = grid.index(), step, err = %e, "Dropping hit");
                stats.misses += 1;
            }
        }
    }
    if !stats.fired.is_empty() {
        debug!(
            grid = grid.index(),
            step,
            fired = stats.fired.len(),
            "Rendered step."
        );
    }
    stats
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use super::*;
    use crate::audio::mock;
    use crate::config::KnobMapping;
    use crate::pattern::PatternStore;
    use crate::samples::SampleBuffer;
    use crate::voices::SoundPool;

    fn registry() -> VoiceRegistry {
        VoiceRegistry::new(
            vec![
                Voice::new("kick", "Kick", "#ff0000", SoundPool::from_paths(["kick.wav"])),
                Voice::new("snare", "Snare", "#00ff00", SoundPool::from_paths(["snare.wav"])),
                Voice::new("hat", "Hat", "#0000ff", SoundPool::from_paths(["hat.wav"])),
            ],
            &["hat", "kick", "snare"],
        )
        .unwrap()
    }

    fn store(paths: &[&str]) -> SampleStore {
        let store = SampleStore::new("samples".into(), 44100);
        for path in paths {
            store.insert(
                Path::new(path),
                Arc::new(SampleBuffer::new(vec![0.5; 4], 1, 44100)),
            );
        }
        store
    }

    #[test]
    fn test_fires_in_row_order() {
        let registry = registry();
        let params = ParameterState::new(&registry, KnobMapping::default());
        let store = store(&["kick.wav", "snare.wav", "hat.wav"]);
        let sink = mock::Sink::get("mock");

        let mut patterns = PatternStore::new(1, registry.len(), 16);
        let kick = registry.row_of(&VoiceId::new("kick")).unwrap();
        let hat = registry.row_of(&VoiceId::new("hat")).unwrap();
        patterns.set_cell(0, kick, 3, true).unwrap();
        patterns.set_cell(0, hat, 3, true).unwrap();

        let stats = on_tick(patterns.grid(0).unwrap(), 3, &registry, &params, &store, &sink);

        assert_eq!(stats.fired, vec![VoiceId::new("hat"), VoiceId::new("kick")]);
        assert_eq!(stats.misses, 0);
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].sample, PathBuf::from("kick.wav"));
        assert_eq!(events[1].gain, 1.0);
        assert_eq!(events[1].pan, 0.0);
        assert_eq!(events[1].playback_rate, 1.0);
    }

    #[test]
    fn test_missing_sample_is_counted() {
        let registry = registry();
        let params = ParameterState::new(&registry, KnobMapping::default());
        let store = store(&["kick.wav"]);
        let sink = mock::Sink::get("mock");

        let mut patterns = PatternStore::new(1, registry.len(), 16);
        for row in 0..registry.len() {
            patterns.set_cell(0, row, 0, true).unwrap();
        }

        let stats = on_tick(patterns.grid(0).unwrap(), 0, &registry, &params, &store, &sink);

        assert_eq!(stats.fired, vec![VoiceId::new("kick")]);
        assert_eq!(stats.misses, 2);
        assert_eq!(sink.event_count(), 1);
    }

    #[test]
    fn test_resolve_unresolved() {
        let registry = registry();
        let params = ParameterState::new(&registry, KnobMapping::default());
        let store = store(&[]);
        let snare = registry.get(&VoiceId::new("snare")).unwrap();

        assert_eq!(
            resolve(snare, &params, &store).unwrap_err(),
            UnresolvedSample {
                voice: VoiceId::new("snare"),
                path: PathBuf::from("snare.wav"),
            }
        );
    }

    #[test]
    fn test_sink_failure_does_not_stop_step() {
        let registry = registry();
        let params = ParameterState::new(&registry, KnobMapping::default());
        let store = store(&["kick.wav", "snare.wav", "hat.wav"]);
        let sink = mock::Sink::get("mock");
        sink.set_failing(true);

        let mut patterns = PatternStore::new(1, registry.len(), 16);
        patterns.set_cell(0, 0, 0, true).unwrap();
        patterns.set_cell(0, 1, 0, true).unwrap();

        let stats = on_tick(patterns.grid(0).unwrap(), 0, &registry, &params, &store, &sink);
        assert!(stats.fired.is_empty());
        assert_eq!(stats.misses, 0);
    }
}
