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

//! Errors surfaced by engine operations.

use crate::voices::VoiceId;

/// Errors returned to the caller (usually the view layer) when an engine
/// operation is rejected. None of these are fatal to the engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("At least one grid must be active before playback can start")]
    NoActiveGrid,

    #[error("Unknown voice: {0}")]
    UnknownVoice(VoiceId),

    #[error("Grid {grid} is out of range (grid count is {count})")]
    GridOutOfRange { grid: usize, count: usize },

    #[error("Step {step} is out of range (steps per pattern is {count})")]
    StepOutOfRange { step: usize, count: usize },

    #[error("Invalid tempo {0}, tempo must be a positive number of beats per minute")]
    InvalidTempo(f64),

    #[error("Engine must be created inside a tokio runtime")]
    NoRuntime,
}
