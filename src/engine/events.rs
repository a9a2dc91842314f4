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
use crate::voices::VoiceId;

/// Notifications for the view layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A step was rendered. The view highlights this column.
    Tick { grid: usize, step: usize },
    CellChanged {
        grid: usize,
        voice: VoiceId,
        step: usize,
        value: bool,
    },
    /// A voice moved to a new sample. `label` is the sample's display name.
    VoiceResampled { voice: VoiceId, label: String },
    GridActivityChanged { grid: usize, active: bool },
    TransportStarted,
    TransportStopped,
}
