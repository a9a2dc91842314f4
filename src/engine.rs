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
use std::{error::Error, path::PathBuf, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{
    runtime::Handle,
    sync::broadcast,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info, span, warn, Instrument, Level, Span};

use crate::audio::AudioSink;
use crate::config::{EngineConfig, PatternFile};
use crate::error::EngineError;
use crate::samples::{PreloadErrors, SampleStore};
use crate::sequencer::{EngineState, PadOutcome, TickOutcome};
use crate::voices::{SoundPool, VoiceId};

mod events;

pub use events::EngineEvent;

/// How many view events can queue up before slow subscribers start lagging.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// The running sequencer. Owns the engine state, the sample store and the
/// audio sink, and drives the transport from a tokio clock task.
///
/// Every operation takes the state lock, mutates it and releases it. Clock
/// ticks take the same lock, so an edit is either fully visible to a tick or
/// not at all.
pub struct Engine {
    state: Arc<Mutex<EngineState>>,
    store: Arc<SampleStore>,
    sink: Arc<dyn AudioSink>,
    events: broadcast::Sender<EngineEvent>,
    /// The running clock task, if any. Always locked after `state`.
    clock: Mutex<Option<JoinHandle<()>>>,
    runtime: Handle,
    span: Span,
}

impl Engine {
    /// Creates an engine. Must be called from within a tokio runtime.
    pub fn new(
        state: EngineState,
        store: Arc<SampleStore>,
        sink: Arc<dyn AudioSink>,
    ) -> Result<Engine, EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Engine {
            state: Arc::new(Mutex::new(state)),
            store,
            sink,
            events,
            clock: Mutex::new(None),
            runtime,
            span: span!(Level::INFO, "engine"),
        })
    }

    /// Builds an engine from configuration. Samples are decoded to the sink's
    /// sample rate.
    pub fn from_config(
        config: &EngineConfig,
        sink: Arc<dyn AudioSink>,
    ) -> Result<Engine, Box<dyn Error>> {
        let state = EngineState::from_config(config)?;
        let store = Arc::new(SampleStore::new(config.samples_root(), sink.sample_rate()));
        info!(
            voices = state.registry().len(),
            grids = state.patterns().grid_count(),
            steps = state.patterns().steps(),
            sink = %sink,
            "Engine created"
        );
        Ok(Engine::new(state, store, sink)?)
    }

    /// Subscribes to view events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &Arc<SampleStore> {
        &self.store
    }

    /// Runs `f` against the current state.
    pub fn with_state<R>(&self, f: impl FnOnce(&EngineState) -> R) -> R {
        f(&self.state.lock())
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().transport().is_playing()
    }

    pub fn miss_count(&self) -> u64 {
        self.state.lock().miss_count()
    }

    fn emit(events: &broadcast::Sender<EngineEvent>, event: EngineEvent) {
        // Sending only fails when nobody is subscribed.
        let _ = events.send(event);
    }

    /// Preloads every voice's sound pool. Every pool is attempted; the
    /// failures of all of them are returned together.
    pub async fn preload_all(&self) -> Result<(), PreloadErrors> {
        let pools: Vec<(VoiceId, SoundPool)> = self.with_state(|state| {
            state
                .registry()
                .iter()
                .map(|voice| (voice.id().clone(), voice.pool().clone()))
                .collect()
        });

        let mut errors = Vec::new();
        for (voice, pool) in pools {
            if let Err(e) = self.store.preload_all(&pool).await {
                warn!(voice = %voice, failed = e.errors().len(), "Sound pool partially loaded");
                errors.extend(e.into_inner());
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PreloadErrors::new(errors))
        }
    }

    /// Loads a sample in the background. Failures are logged.
    fn spawn_preload(&self, path: PathBuf) {
        let store = self.store.clone();
        self.runtime.spawn(async move {
            if let Err(e) = store.preload(&path).await {
                warn!(path = ?path, err = %e, "Background sample load failed");
            }
        });
    }

    /// Flips a cell and returns its new value.
    pub fn toggle_cell(
        &self,
        grid: usize,
        voice: &VoiceId,
        step: usize,
    ) -> Result<bool, EngineError> {
        let mut state = self.state.lock();
        let value = state.toggle_cell(grid, voice, step)?;
        Engine::emit(
            &self.events,
            EngineEvent::CellChanged {
                grid,
                voice: voice.clone(),
                step,
                value,
            },
        );
        Ok(value)
    }

    pub fn set_cell(
        &self,
        grid: usize,
        voice: &VoiceId,
        step: usize,
        value: bool,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if state.cell(grid, voice, step)? == value {
            return Ok(());
        }
        state.set_cell(grid, voice, step, value)?;
        Engine::emit(
            &self.events,
            EngineEvent::CellChanged {
                grid,
                voice: voice.clone(),
                step,
                value,
            },
        );
        Ok(())
    }

    /// Clears a grid, emitting a change for every cell that was set.
    pub fn clear_grid(&self, grid: usize) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let pattern = state.patterns().grid(grid)?;
        let steps = state.patterns().steps();
        let cleared: Vec<(VoiceId, usize)> = state
            .registry()
            .iter()
            .flat_map(|voice| {
                (0..steps)
                    .filter(move |step| pattern.cell(voice.row(), *step))
                    .map(move |step| (voice.id().clone(), step))
            })
            .collect();

        state.clear_grid(grid)?;
        for (voice, step) in cleared {
            Engine::emit(
                &self.events,
                EngineEvent::CellChanged {
                    grid,
                    voice,
                    step,
                    value: false,
                },
            );
        }
        Ok(())
    }

    pub fn set_grid_active(&self, grid: usize, active: bool) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.set_grid_active(grid, active)?;
        Engine::emit(&self.events, EngineEvent::GridActivityChanged { grid, active });
        Ok(())
    }

    pub fn switch_visible_grid(&self, grid: usize) -> Result<(), EngineError> {
        self.state.lock().switch_visible_grid(grid)
    }

    pub fn set_gain(&self, voice: &VoiceId, value: f32) -> Result<f32, EngineError> {
        self.state.lock().set_gain(voice, value)
    }

    pub fn set_pan(&self, voice: &VoiceId, value: f32) -> Result<f32, EngineError> {
        self.state.lock().set_pan(voice, value)
    }

    pub fn set_pitch(&self, voice: &VoiceId, knob: f32) -> Result<f32, EngineError> {
        self.state.lock().set_pitch(voice, knob)
    }

    pub fn set_gain_knob(&self, voice: &VoiceId, knob: f32) -> Result<f32, EngineError> {
        self.state.lock().set_gain_knob(voice, knob)
    }

    pub fn set_pan_knob(&self, voice: &VoiceId, knob: f32) -> Result<f32, EngineError> {
        self.state.lock().set_pan_knob(voice, knob)
    }

    pub fn current_sample(&self, voice: &VoiceId) -> Result<PathBuf, EngineError> {
        Ok(self.state.lock().current_sample(voice)?.to_path_buf())
    }

    /// Arms the voice's next sample and starts loading it if it isn't cached.
    pub fn advance_sample(&self, voice: &VoiceId) -> Result<PathBuf, EngineError> {
        let path = self.state.lock().advance_sample(voice)?;
        self.resampled(voice, &path);
        Ok(path)
    }

    fn resampled(&self, voice: &VoiceId, path: &std::path::Path) {
        Engine::emit(
            &self.events,
            EngineEvent::VoiceResampled {
                voice: voice.clone(),
                label: crate::voices::sample_label(path),
            },
        );
        if !self.store.contains(path) {
            self.spawn_preload(path.to_path_buf());
        }
    }

    pub fn toggle_change_samples_mode(&self) -> bool {
        self.state.lock().toggle_change_samples_mode()
    }

    /// Handles a pad press. A miss starts loading the sample so a later press
    /// sounds.
    pub fn trigger_voice(&self, voice: &VoiceId) -> Result<PadOutcome, EngineError> {
        let outcome = self
            .state
            .lock()
            .trigger_voice(voice, &self.store, self.sink.as_ref())?;
        match &outcome {
            PadOutcome::Played => debug!(voice = %voice, "Pad triggered"),
            PadOutcome::Missed(unresolved) => {
                warn!(err = %unresolved, "Pad sample not loaded, loading in background");
                self.spawn_preload(unresolved.path.clone());
            }
            PadOutcome::Resampled { path, .. } => self.resampled(voice, path),
        }
        Ok(outcome)
    }

    pub fn apply_pattern(&self, file: &PatternFile) -> Result<(), EngineError> {
        self.state.lock().apply_pattern(file)
    }

    /// Starts playback. Starting while already playing does nothing.
    pub fn start(&self) -> Result<(), EngineError> {
        let _enter = self.span.enter();
        let mut state = self.state.lock();
        if let Some(generation) = state.start()? {
            Engine::emit(&self.events, EngineEvent::TransportStarted);
            self.spawn_clock(generation, state.transport().tick_interval());
        }
        Ok(())
    }

    /// Stops playback. No tick fires after this returns. Sounds already
    /// started play to completion.
    pub fn stop(&self) {
        let _enter = self.span.enter();
        let mut state = self.state.lock();
        if state.stop() {
            Engine::emit(&self.events, EngineEvent::TransportStopped);
        }
        self.abort_clock();
    }

    /// Changes the tempo, restarting the clock if playing.
    pub fn set_tempo(&self, bpm: f64) -> Result<(), EngineError> {
        let _enter = self.span.enter();
        let mut state = self.state.lock();
        let was_playing = state.transport().is_playing();
        match state.set_tempo(bpm) {
            Ok(Some(generation)) => {
                if state.settings().reset_on_tempo_change() {
                    Engine::emit(&self.events, EngineEvent::TransportStopped);
                    Engine::emit(&self.events, EngineEvent::TransportStarted);
                }
                self.spawn_clock(generation, state.transport().tick_interval());
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                if was_playing && !state.transport().is_playing() {
                    Engine::emit(&self.events, EngineEvent::TransportStopped);
                    self.abort_clock();
                }
                Err(e)
            }
        }
    }

    /// Stops playback and restores patterns, parameters and tempo to their
    /// initial values. Cached samples are kept.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let was_playing = state.transport().is_playing();
        state.reset();
        self.abort_clock();
        if was_playing {
            Engine::emit(&self.events, EngineEvent::TransportStopped);
        }
    }

    fn abort_clock(&self) {
        if let Some(handle) = self.clock.lock().take() {
            handle.abort();
        }
    }

    /// Replaces the clock task. Called with the state lock held so clocks are
    /// swapped in the same order their generations were issued.
    fn spawn_clock(&self, generation: u64, interval: Duration) {
        let mut clock = self.clock.lock();
        if let Some(handle) = clock.take() {
            handle.abort();
        }
        let task = Engine::run_clock(
            self.state.clone(),
            self.store.clone(),
            self.sink.clone(),
            self.events.clone(),
            generation,
            interval,
        )
        .instrument(span!(parent: &self.span, Level::DEBUG, "clock", generation));
        *clock = Some(self.runtime.spawn(task));
    }

    async fn run_clock(
        state: Arc<Mutex<EngineState>>,
        store: Arc<SampleStore>,
        sink: Arc<dyn AudioSink>,
        events: broadcast::Sender<EngineEvent>,
        generation: u64,
        interval: Duration,
    ) {
        debug!(interval = ?interval, "Clock started");
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let running = {
                let mut state = state.lock();
                if state.transport().generation() != generation {
                    false
                } else {
                    match state.tick(&store, sink.as_ref()) {
                        TickOutcome::Rendered { grid, step, .. } => {
                            Engine::emit(&events, EngineEvent::Tick { grid, step });
                            true
                        }
                        TickOutcome::Stopped => {
                            Engine::emit(&events, EngineEvent::TransportStopped);
                            false
                        }
                        TickOutcome::Idle => false,
                    }
                }
            };
            if !running {
                break;
            }
        }
        debug!("Clock finished");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.abort_clock();
    }
}

#[cfg(test)]
mod tests {
    use std::{future::ready, path::Path};

    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;
    use crate::audio::mock;
    use crate::config::EngineSettings;
    use crate::samples::SampleBuffer;
    use crate::testutil::{eventually, write_wav};
    use crate::voices::{SoundPool, Voice, VoiceRegistry};

    fn registry() -> VoiceRegistry {
        VoiceRegistry::new(
            vec![
                Voice::new("kick", "Kick", "#ff0000", SoundPool::from_paths(["k1.wav", "k2.wav"])),
                Voice::new("hat", "Hat", "#0000ff", SoundPool::from_paths(["h1.wav"])),
            ],
            &[],
        )
        .unwrap()
    }

    /// 6000 bpm gives a 2.5ms tick.
    fn fast_settings() -> EngineSettings {
        EngineSettings::default()
            .with_steps_per_pattern(4)
            .with_default_tempo(6000.0)
    }

    fn warm_store() -> SampleStore {
        let store = SampleStore::new("samples".into(), 44100);
        for path in ["k1.wav", "k2.wav", "h1.wav"] {
            store.insert(
                Path::new(path),
                Arc::new(SampleBuffer::new(vec![0.5; 16], 1, 44100)),
            );
        }
        store
    }

    fn engine(settings: EngineSettings, store: SampleStore) -> (Engine, mock::Sink) {
        let sink = mock::Sink::get("mock");
        let state = EngineState::new(settings, registry());
        let engine = Engine::new(state, Arc::new(store), Arc::new(sink.clone())).unwrap();
        (engine, sink)
    }

    fn kick() -> VoiceId {
        VoiceId::new("kick")
    }

    fn drain(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => return events,
            }
        }
    }

    #[test]
    fn test_requires_runtime() {
        let state = EngineState::new(fast_settings(), registry());
        let result = Engine::new(
            state,
            Arc::new(warm_store()),
            Arc::new(mock::Sink::get("mock")),
        );
        assert!(matches!(result, Err(EngineError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_clock_renders_until_stopped() {
        let (engine, sink) = engine(fast_settings(), warm_store());
        let mut rx = engine.subscribe();
        for step in 0..4 {
            engine.set_cell(0, &kick(), step, true).unwrap();
        }

        engine.start().unwrap();
        assert!(engine.is_playing());
        eventually(|| ready(sink.event_count() >= 8), "Clock never rendered").await;

        engine.stop();
        assert!(!engine.is_playing());
        let rendered = sink.event_count();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.event_count(), rendered);

        let events = drain(&mut rx);
        assert!(events.contains(&EngineEvent::TransportStarted));
        assert!(events.contains(&EngineEvent::Tick { grid: 0, step: 3 }));
        assert_eq!(events.last(), Some(&EngineEvent::TransportStopped));
    }

    #[tokio::test]
    async fn test_start_without_active_grid() {
        let (engine, _sink) = engine(fast_settings(), warm_store());
        engine.set_grid_active(0, false).unwrap();
        assert_eq!(engine.start(), Err(EngineError::NoActiveGrid));
        assert!(!engine.is_playing());
    }

    #[tokio::test]
    async fn test_clock_stops_itself_without_active_grids() {
        let (engine, _sink) = engine(fast_settings(), warm_store());
        let mut rx = engine.subscribe();
        engine.start().unwrap();
        engine.set_grid_active(0, false).unwrap();

        eventually(|| ready(!engine.is_playing()), "Transport never stopped").await;
        let events = drain(&mut rx);
        assert!(events.contains(&EngineEvent::GridActivityChanged {
            grid: 0,
            active: false
        }));
        assert_eq!(events.last(), Some(&EngineEvent::TransportStopped));
    }

    #[tokio::test]
    async fn test_round_robin_events() {
        let (engine, _sink) = engine(fast_settings(), warm_store());
        let mut rx = engine.subscribe();
        engine.set_grid_active(2, true).unwrap();
        engine.start().unwrap();

        let mut ticks = Vec::new();
        while ticks.len() < 9 {
            if let Ok(EngineEvent::Tick { grid, step }) = rx.recv().await {
                ticks.push((grid, step));
            }
        }
        engine.stop();

        assert_eq!(
            ticks,
            vec![
                (0, 0),
                (0, 1),
                (0, 2),
                (0, 3),
                (2, 0),
                (2, 1),
                (2, 2),
                (2, 3),
                (0, 0),
            ]
        );
    }

    #[tokio::test]
    async fn test_set_tempo_restarts_clock() {
        let (engine, sink) = engine(fast_settings(), warm_store());
        engine.set_cell(0, &kick(), 0, true).unwrap();
        engine.start().unwrap();
        eventually(|| ready(sink.event_count() >= 1), "Clock never rendered").await;

        engine.set_tempo(3000.0).unwrap();
        assert!(engine.is_playing());
        engine.with_state(|state| {
            assert_eq!(state.transport().tempo_bpm(), 3000.0);
            assert_eq!(state.transport().current_step(), 0);
        });
        let before = sink.event_count();
        eventually(
            || ready(sink.event_count() > before),
            "Clock stopped after tempo change",
        )
        .await;

        assert!(engine.set_tempo(-1.0).is_err());
        assert!(engine.is_playing());
        engine.stop();
    }

    #[tokio::test]
    async fn test_cell_events() {
        let (engine, _sink) = engine(fast_settings(), warm_store());
        let mut rx = engine.subscribe();

        assert!(engine.toggle_cell(1, &kick(), 2).unwrap());
        engine.set_cell(1, &VoiceId::new("hat"), 3, true).unwrap();
        // Setting a cell to its current value is silent.
        engine.set_cell(1, &VoiceId::new("hat"), 3, true).unwrap();
        engine.clear_grid(1).unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                EngineEvent::CellChanged {
                    grid: 1,
                    voice: kick(),
                    step: 2,
                    value: true
                },
                EngineEvent::CellChanged {
                    grid: 1,
                    voice: VoiceId::new("hat"),
                    step: 3,
                    value: true
                },
                EngineEvent::CellChanged {
                    grid: 1,
                    voice: kick(),
                    step: 2,
                    value: false
                },
                EngineEvent::CellChanged {
                    grid: 1,
                    voice: VoiceId::new("hat"),
                    step: 3,
                    value: false
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_pad_resample_emits_label() {
        let (engine, sink) = engine(fast_settings(), warm_store());
        let mut rx = engine.subscribe();

        assert!(engine.toggle_change_samples_mode());
        let outcome = engine.trigger_voice(&kick()).unwrap();
        assert_eq!(
            outcome,
            PadOutcome::Resampled {
                path: PathBuf::from("k2.wav"),
                label: "k2".to_string()
            }
        );
        assert_eq!(sink.event_count(), 0);
        assert_eq!(
            drain(&mut rx),
            vec![EngineEvent::VoiceResampled {
                voice: kick(),
                label: "k2".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_pad_miss_loads_in_background() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        write_wav(&dir.path().join("k1.wav"), &[0.5; 32], 1, 44100)?;
        let store = SampleStore::new(dir.path().to_path_buf(), 44100);
        let (engine, sink) = engine(fast_settings(), store);

        assert!(matches!(
            engine.trigger_voice(&kick())?,
            PadOutcome::Missed(_)
        ));
        assert_eq!(engine.miss_count(), 1);

        let store = engine.store().clone();
        eventually(
            || ready(store.contains(Path::new("k1.wav"))),
            "Sample never loaded",
        )
        .await;

        assert_eq!(engine.trigger_voice(&kick())?, PadOutcome::Played);
        assert_eq!(sink.event_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_preload_all_reports_missing_sample() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        write_wav(&dir.path().join("k1.wav"), &[0.5; 32], 1, 44100)?;
        write_wav(&dir.path().join("h1.wav"), &[0.5; 32], 2, 44100)?;
        let store = SampleStore::new(dir.path().to_path_buf(), 44100);
        let (engine, _sink) = engine(fast_settings(), store);

        let errors = engine.preload_all().await.unwrap_err();
        assert_eq!(errors.paths(), vec![Path::new("k2.wav")]);
        assert!(engine.store().contains(Path::new("k1.wav")));
        assert!(engine.store().contains(Path::new("h1.wav")));
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_stops_playback() {
        let (engine, sink) = engine(fast_settings(), warm_store());
        engine.set_cell(0, &kick(), 0, true).unwrap();
        engine.start().unwrap();
        eventually(|| ready(sink.event_count() >= 1), "Clock never rendered").await;

        engine.reset();
        assert!(!engine.is_playing());
        let rendered = sink.event_count();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(sink.event_count(), rendered);
        engine.with_state(|state| assert!(!state.cell(0, &kick(), 0).unwrap()));
    }
}
