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
use std::{error::Error, fmt, path::PathBuf, sync::Arc};

use crate::config;
use crate::samples::SampleBuffer;
use crate::voices::VoiceId;

pub mod cpal;
pub mod mixer;
pub mod mock;

/// A single hit to be sounded: a decoded buffer and the voice parameters that
/// were current when it was triggered.
#[derive(Debug, Clone)]
pub struct AudioEvent {
    pub voice: VoiceId,
    /// The sample path the buffer was resolved from.
    pub sample: PathBuf,
    pub buffer: Arc<SampleBuffer>,
    pub gain: f32,
    pub pan: f32,
    pub playback_rate: f32,
}

/// Something that can sound audio events. Rendering must not block: the
/// engine calls it while holding its state lock.
pub trait AudioSink: fmt::Display + Send + Sync {
    /// Starts sounding the given event.
    fn render(&self, event: AudioEvent) -> Result<(), Box<dyn Error>>;

    /// The output sample rate. Samples are decoded to this rate.
    fn sample_rate(&self) -> u32;
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<String>, Box<dyn Error>> {
    cpal::Sink::list()
}

/// Gets a sink for the given audio configuration. Device names starting with
/// "mock" produce a recording mock sink.
pub fn get_sink(config: &config::Audio) -> Result<Arc<dyn AudioSink>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(
            mock::Sink::get(device).with_sample_rate(config.sample_rate()),
        ));
    };

    Ok(Arc::new(cpal::Sink::get(config)?))
}
