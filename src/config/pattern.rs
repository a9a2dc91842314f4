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
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::error::ConfigError;

/// A JSON description of grid contents used to seed the engine from the CLI.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct PatternFile {
    #[serde(default)]
    grids: Vec<GridPattern>,
}

/// The contents of a single grid: whether it's active and which steps are set per voice.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct GridPattern {
    #[serde(default)]
    active: bool,

    /// Voice id to the list of set steps.
    #[serde(default)]
    cells: HashMap<String, Vec<usize>>,
}

impl PatternFile {
    /// Parses a pattern file from disk.
    pub fn load(path: &Path) -> Result<PatternFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn grids(&self) -> &[GridPattern] {
        &self.grids
    }
}

impl GridPattern {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn cells(&self) -> &HashMap<String, Vec<usize>> {
        &self.cells
    }
}
