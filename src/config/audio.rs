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
use serde::Deserialize;

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_SAMPLE_RATE: u32 = 44100;

#[derive(Deserialize, Clone, Debug, Default)]
pub struct Audio {
    /// The audio device. "default" selects the host's default output, and any
    /// name starting with "mock" selects the recording mock sink.
    device: Option<String>,

    /// Sample rate in Hz used when the device doesn't dictate one (default: 44100).
    sample_rate: Option<u32>,

    /// Output buffer size in frames. Unset lets the host choose.
    buffer_size: Option<u32>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: Some(device.to_string()),
            sample_rate: None,
            buffer_size: None,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Audio {
        self.sample_rate = Some(sample_rate);
        self
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the target sample rate (default: 44100)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the requested output buffer size in frames, if any. A zero size
    /// is treated as unset.
    pub fn buffer_size(&self) -> Option<u32> {
        self.buffer_size.filter(|size| *size > 0)
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    #[test]
    fn test_audio_defaults() {
        let audio = Audio::default();
        assert_eq!(audio.device(), "default");
        assert_eq!(audio.sample_rate(), 44100);
        assert_eq!(audio.buffer_size(), None);
    }

    #[test]
    fn test_audio_deserialize() {
        let yaml = r#"
            device: mock-device
            sample_rate: 48000
            buffer_size: 0
        "#;

        let audio: Audio = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(audio.device(), "mock-device");
        assert_eq!(audio.sample_rate(), 48000);
        assert_eq!(audio.buffer_size(), None);
    }
}
