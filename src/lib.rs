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

//! A multi-pattern drum step sequencer.
//!
//! The engine keeps a fixed number of pattern grids of on/off steps per voice,
//! advances a transport clock at a tempo-derived interval and renders each
//! triggered hit through a per-voice gain, pan and playback-rate chain.

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod params;
pub mod pattern;
pub mod samples;
pub mod sequencer;
pub mod transport;
pub mod trigger;
pub mod voices;

#[cfg(test)]
mod testutil;
