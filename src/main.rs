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
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use stepseq::audio;
use stepseq::config::{EngineConfig, PatternFile};
use stepseq::engine::{Engine, EngineEvent};
use stepseq::voices::{sample_label, VoiceRegistry};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A multi-pattern drum step sequencer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the configured voices and their sound pools.
    Voices {
        /// The path to the sequencer config.
        config_path: String,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Plays patterns through the configured audio device.
    Play {
        /// The path to the sequencer config.
        config_path: String,
        /// A JSON pattern file to seed the grids with.
        #[arg(short, long)]
        pattern: Option<String>,
        /// The tempo in beats per minute. Overrides the configured default.
        #[arg(short, long)]
        tempo: Option<f64>,
        /// How long to play for, e.g. 30s or 2m. Plays until interrupted if unset.
        #[arg(short, long)]
        duration: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Voices { config_path } => {
            let config = EngineConfig::load(&PathBuf::from(&config_path))?;
            let registry = VoiceRegistry::from_config(&config)?;

            println!("Voices (count: {}):", registry.len());
            for voice in registry.iter() {
                println!(
                    "- {} [row {}] {} ({}), {} samples",
                    voice.id(),
                    voice.row(),
                    voice.label(),
                    voice.color(),
                    voice.pool().len()
                );
                for leaf in voice.pool().leaves() {
                    println!("    {} ({})", sample_label(leaf), leaf.display());
                }
            }
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Play {
            config_path,
            pattern,
            tempo,
            duration,
        } => {
            let duration: Option<Duration> = match duration {
                Some(duration) => Some(DurationString::from_string(duration)?.into()),
                None => None,
            };

            let config = EngineConfig::load(&PathBuf::from(&config_path))?;
            let sink = audio::get_sink(&config.audio())?;
            let engine = Engine::from_config(&config, sink)?;

            if let Err(errors) = engine.preload_all().await {
                for error in errors.errors() {
                    warn!(err = %error, "Sample will be silent until it loads");
                }
            }

            if let Some(pattern) = pattern {
                engine.apply_pattern(&PatternFile::load(&PathBuf::from(pattern))?)?;
            }
            if let Some(tempo) = tempo {
                engine.set_tempo(tempo)?;
            }

            let mut events = engine.subscribe();
            engine.start()?;

            let stopped = async move {
                loop {
                    match events.recv().await {
                        Ok(EngineEvent::TransportStopped) | Err(RecvError::Closed) => break,
                        _ => continue,
                    }
                }
            };
            let timeout = async {
                match duration {
                    Some(duration) => tokio::time::sleep(duration).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    info!("Interrupted");
                }
                _ = timeout => info!("Finished playing"),
                _ = stopped => info!("Transport stopped"),
            }

            engine.stop();
            info!(misses = engine.miss_count(), "Stopped");
        }
    }

    Ok(())
}
