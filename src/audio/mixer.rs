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
use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use crate::samples::SampleBuffer;

use super::AudioEvent;

/// A hit that is currently sounding.
struct PlayingVoice {
    buffer: Arc<SampleBuffer>,
    /// Fractional read position in source frames.
    position: f64,
    /// Source frames consumed per output frame.
    increment: f64,
    gain: f32,
    pan: f32,
}

impl PlayingVoice {
    /// Reads the source at the current position, linearly interpolated, as a
    /// left/right pair. Returns None once the buffer is exhausted.
    fn read(&self) -> Option<(f32, f32)> {
        let index = self.position.floor() as usize;
        let current = self.buffer.frame(index)?;
        let frac = (self.position - index as f64) as f32;
        let next = self.buffer.frame(index + 1);

        let sample = |channel: usize| -> f32 {
            let a = current.get(channel).copied().unwrap_or(0.0);
            let b = next
                .and_then(|frame| frame.get(channel).copied())
                .unwrap_or(0.0);
            a + (b - a) * frac
        };

        if self.buffer.channel_count() == 1 {
            Some(pan_mono(sample(0), self.pan))
        } else {
            Some(pan_stereo(sample(0), sample(1), self.pan))
        }
    }
}

/// Equal-power panning of a mono source.
pub fn pan_mono(input: f32, pan: f32) -> (f32, f32) {
    let x = (pan.clamp(-1.0, 1.0) + 1.0) / 2.0;
    (input * (x * FRAC_PI_2).cos(), input * (x * FRAC_PI_2).sin())
}

/// Equal-power panning of a stereo source. Panning left folds the right
/// channel into the left, panning right folds the left into the right.
pub fn pan_stereo(left: f32, right: f32, pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    if pan <= 0.0 {
        let x = pan + 1.0;
        (
            left + right * (x * FRAC_PI_2).cos(),
            right * (x * FRAC_PI_2).sin(),
        )
    } else {
        let x = pan;
        (
            left * (x * FRAC_PI_2).cos(),
            right + left * (x * FRAC_PI_2).sin(),
        )
    }
}

/// Core mixing logic, independent of any audio backend. Every added event
/// plays to the end of its buffer.
pub struct Mixer {
    voices: Vec<PlayingVoice>,
    num_channels: u16,
    sample_rate: u32,
}

impl Mixer {
    pub fn new(num_channels: u16, sample_rate: u32) -> Mixer {
        Mixer {
            voices: Vec::new(),
            num_channels: num_channels.max(1),
            sample_rate,
        }
    }

    /// Starts sounding an event.
    pub fn add(&mut self, event: AudioEvent) {
        let rate_ratio = event.buffer.sample_rate() as f64 / self.sample_rate.max(1) as f64;
        let increment = f64::from(event.playback_rate.max(0.0)) * rate_ratio;
        if increment <= 0.0 || !increment.is_finite() {
            return;
        }
        self.voices.push(PlayingVoice {
            buffer: event.buffer,
            position: 0.0,
            increment,
            gain: event.gain,
            pan: event.pan,
        });
    }

    /// Mixes `output.len() / num_channels` frames into `output`, overwriting
    /// it. Voices that run out of samples are dropped.
    pub fn process_into(&mut self, output: &mut [f32]) {
        output.fill(0.0);
        let channels = self.num_channels as usize;

        for frame in output.chunks_mut(channels) {
            let mut left = 0.0;
            let mut right = 0.0;
            self.voices.retain_mut(|voice| match voice.read() {
                Some((l, r)) => {
                    left += l * voice.gain;
                    right += r * voice.gain;
                    voice.position += voice.increment;
                    true
                }
                None => false,
            });

            if channels == 1 {
                frame[0] = (left + right) / 2.0;
            } else {
                frame[0] = left;
                frame[1] = right;
            }
        }
    }

    /// The number of voices still sounding.
    pub fn active_count(&self) -> usize {
        self.voices.len()
    }

    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::voices::VoiceId;

    const EPSILON: f32 = 1e-6;

    fn event(data: Vec<f32>, channels: u16, gain: f32, pan: f32, rate: f32) -> AudioEvent {
        AudioEvent {
            voice: VoiceId::new("kick"),
            sample: PathBuf::from("kick.wav"),
            buffer: Arc::new(SampleBuffer::new(data, channels, 44100)),
            gain,
            pan,
            playback_rate: rate,
        }
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < EPSILON,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_pan_mono() {
        let (l, r) = pan_mono(1.0, 0.0);
        assert_close(l, std::f32::consts::FRAC_1_SQRT_2);
        assert_close(r, std::f32::consts::FRAC_1_SQRT_2);

        let (l, r) = pan_mono(1.0, -1.0);
        assert_close(l, 1.0);
        assert_close(r, 0.0);

        let (l, r) = pan_mono(1.0, 1.0);
        assert_close(l, 0.0);
        assert_close(r, 1.0);
    }

    #[test]
    fn test_pan_stereo() {
        let (l, r) = pan_stereo(0.5, 0.25, 0.0);
        assert_close(l, 0.5);
        assert_close(r, 0.25);

        let (l, r) = pan_stereo(0.5, 0.25, -1.0);
        assert_close(l, 0.75);
        assert_close(r, 0.0);

        let (l, r) = pan_stereo(0.5, 0.25, 1.0);
        assert_close(l, 0.0);
        assert_close(r, 0.75);
    }

    #[test]
    fn test_mix_mono_gain() {
        let mut mixer = Mixer::new(2, 44100);
        mixer.add(event(vec![1.0, 0.5], 1, 0.5, -1.0, 1.0));

        let mut output = vec![0.0; 6];
        mixer.process_into(&mut output);

        assert_close(output[0], 0.5);
        assert_close(output[1], 0.0);
        assert_close(output[2], 0.25);
        assert_close(output[3], 0.0);
        // Exhausted.
        assert_close(output[4], 0.0);
        assert_eq!(mixer.active_count(), 0);
    }

    #[test]
    fn test_mix_sums_voices() {
        let mut mixer = Mixer::new(2, 44100);
        mixer.add(event(vec![0.5, 0.3], 2, 1.0, 0.0, 1.0));
        mixer.add(event(vec![0.2, 0.1], 2, 1.0, 0.0, 1.0));

        let mut output = vec![0.0; 2];
        mixer.process_into(&mut output);

        assert_close(output[0], 0.7);
        assert_close(output[1], 0.4);
        assert_eq!(mixer.active_count(), 2);
    }

    #[test]
    fn test_playback_rate_interpolates() {
        let mut mixer = Mixer::new(1, 44100);
        // Stereo source with identical channels so mono downmix is the input.
        mixer.add(event(vec![0.0, 0.0, 1.0, 1.0], 2, 1.0, 0.0, 0.5));

        let mut output = vec![0.0; 4];
        mixer.process_into(&mut output);

        assert_close(output[0], 0.0);
        assert_close(output[1], 0.5);
        assert_close(output[2], 1.0);
        // The tail fades toward silence past the last frame.
        assert_close(output[3], 0.5);
        assert_eq!(mixer.active_count(), 1);

        let mut output = vec![0.0; 1];
        mixer.process_into(&mut output);
        assert_close(output[0], 0.0);
        assert_eq!(mixer.active_count(), 0);
    }

    #[test]
    fn test_double_rate_finishes_early() {
        let mut mixer = Mixer::new(2, 44100);
        mixer.add(event(vec![1.0; 8], 1, 1.0, 0.0, 2.0));

        let mut output = vec![0.0; 16];
        mixer.process_into(&mut output);

        assert!(output[..8].iter().all(|sample| *sample > 0.0));
        assert!(output[8..].iter().all(|sample| *sample == 0.0));
    }

    #[test]
    fn test_rejects_zero_rate() {
        let mut mixer = Mixer::new(2, 44100);
        mixer.add(event(vec![1.0; 8], 1, 1.0, 0.0, 0.0));
        assert_eq!(mixer.active_count(), 0);
    }
}
