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
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tracing::debug;

use super::{AudioEvent, AudioSink};

const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// A mock sink. Doesn't play anything, records every rendered event.
#[derive(Clone)]
pub struct Sink {
    name: String,
    sample_rate: u32,
    events: Arc<Mutex<Vec<AudioEvent>>>,
    failing: Arc<AtomicBool>,
}

impl Sink {
    /// Gets the given mock sink.
    pub fn get(name: &str) -> Sink {
        Sink {
            name: name.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            events: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Sink {
        self.sample_rate = sample_rate;
        self
    }

    /// Makes every subsequent render fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// A copy of every event rendered so far, in order.
    pub fn events(&self) -> Vec<AudioEvent> {
        self.events.lock().clone()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl AudioSink for Sink {
    fn render(&self, event: AudioEvent) -> Result<(), Box<dyn Error>> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(format!("mock sink {} is failing", self.name).into());
        }
        debug!(
            sink = self.name,
            voice = %event.voice,
            sample = ?event.sample,
            "Rendering event."
        );
        self.events.lock().push(event);
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
