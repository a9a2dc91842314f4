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
use std::{error::Error, fmt, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Sample;
use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info, span, Level};

use super::{mixer::Mixer, AudioEvent, AudioSink};
use crate::config;

/// The format the output thread settled on.
struct StreamFormat {
    sample_rate: u32,
    channels: u16,
}

/// A cpal output device. The stream lives on a dedicated output thread and
/// mixes events received over a channel inside the cpal callback.
pub struct Sink {
    name: String,
    host_name: &'static str,
    format: StreamFormat,
    event_tx: Sender<AudioEvent>,
    /// Dropping this stops the output thread.
    shutdown_tx: Option<Sender<()>>,
    output_thread: Option<thread::JoinHandle<()>>,
}

#[allow(deprecated)]
fn device_name(device: &cpal::Device) -> String {
    device.name().unwrap_or_else(|_| "unknown".to_string())
}

/// Builds an output stream for sample type `T`. All mixing happens in f32 and is
/// converted on the way out.
fn build_stream<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    mut mixer: Mixer,
    event_rx: Receiver<AudioEvent>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device.build_output_stream(
        stream_config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            while let Ok(event) = event_rx.try_recv() {
                mixer.add(event);
            }
            if scratch.len() != data.len() {
                scratch.resize(data.len(), 0.0);
            }
            mixer.process_into(&mut scratch);
            for (dst, src) in data.iter_mut().zip(scratch.iter()) {
                *dst = T::from_sample(src.clamp(-1.0, 1.0));
            }
        },
        |err| error!(err = %err, "cpal output stream error"),
        None,
    )
}

/// Opens the stream on the current thread and plays it.
fn open_stream(
    device: &cpal::Device,
    audio: &config::Audio,
    event_rx: Receiver<AudioEvent>,
) -> Result<(cpal::Stream, StreamFormat), Box<dyn Error>> {
    let supported = device.default_output_config()?;
    let sample_format = supported.sample_format();
    let mut stream_config: cpal::StreamConfig = supported.config();
    if let Some(frames) = audio.buffer_size() {
        stream_config.buffer_size = cpal::BufferSize::Fixed(frames);
    }

    let format = StreamFormat {
        sample_rate: stream_config.sample_rate,
        channels: stream_config.channels,
    };
    let mixer = Mixer::new(format.channels, format.sample_rate);

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, &stream_config, mixer, event_rx)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(device, &stream_config, mixer, event_rx)?,
        cpal::SampleFormat::I32 => build_stream::<i32>(device, &stream_config, mixer, event_rx)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(device, &stream_config, mixer, event_rx)?,
        other => return Err(format!("unsupported sample format {:?}", other).into()),
    };
    stream.play()?;

    Ok((stream, format))
}

impl Sink {
    /// Lists the output devices of every available host.
    pub fn list() -> Result<Vec<String>, Box<dyn Error>> {
        let mut devices = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|config| config.channels())
                    .max()
                    .unwrap_or(0);
                if max_channels > 0 {
                    devices.push(format!(
                        "{} (Channels={}) ({})",
                        device_name(&device),
                        max_channels,
                        host_id.name()
                    ));
                }
            }
        }

        devices.sort();
        Ok(devices)
    }

    /// Finds the device named in the configuration ("default" for the default
    /// host's default output) and starts its output thread.
    pub fn get(audio: &config::Audio) -> Result<Sink, Box<dyn Error>> {
        let name = audio.device();
        let host = cpal::default_host();
        let device = if name == "default" {
            host.default_output_device()
                .ok_or("no default output device available")?
        } else {
            host.output_devices()?
                .find(|device| device_name(device).trim() == name)
                .ok_or_else(|| format!("no device found with name {}", name))?
        };
        let name = device_name(&device);
        let host_name = host.id().name();

        let (event_tx, event_rx) = crossbeam_channel::unbounded::<AudioEvent>();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<StreamFormat, String>>(1);

        // cpal streams are not Send on every host, so the stream is created and
        // dropped on the output thread.
        let thread_audio = audio.clone();
        let output_thread = thread::spawn(move || {
            let span = span!(Level::INFO, "audio output (cpal)");
            let _enter = span.enter();

            let stream = match open_stream(&device, &thread_audio, event_rx) {
                Ok((stream, format)) => {
                    let _ = ready_tx.send(Ok(format));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };

            // Returns once the sink is dropped.
            let _ = shutdown_rx.recv();
            drop(stream);
        });

        let format = match ready_rx.recv() {
            Ok(Ok(format)) => format,
            Ok(Err(e)) => {
                let _ = output_thread.join();
                return Err(format!("unable to open output stream on {}: {}", name, e).into());
            }
            Err(_) => {
                let _ = output_thread.join();
                return Err(format!("output thread for {} exited early", name).into());
            }
        };

        if format.sample_rate != audio.sample_rate() {
            info!(
                device = name,
                device_rate = format.sample_rate,
                configured_rate = audio.sample_rate(),
                "Using the device's sample rate."
            );
        }
        info!(
            device = name,
            host = host_name,
            sample_rate = format.sample_rate,
            channels = format.channels,
            "Output stream started."
        );

        Ok(Sink {
            name,
            host_name,
            format,
            event_tx,
            shutdown_tx: Some(shutdown_tx),
            output_thread: Some(output_thread),
        })
    }
}

impl AudioSink for Sink {
    fn render(&self, event: AudioEvent) -> Result<(), Box<dyn Error>> {
        self.event_tx
            .send(event)
            .map_err(|_| format!("output thread for {} has stopped", self.name))?;
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }
}

impl Drop for Sink {
    fn drop(&mut self) {
        // Disconnecting the shutdown channel wakes the output thread.
        self.shutdown_tx.take();
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name, self.format.channels, self.host_name
        )
    }
}
