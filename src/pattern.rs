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

//! Pattern grids: independent on/off step matrices indexed by voice row and
//! step, each with its own active flag.

use crate::error::EngineError;

/// Finds the first active index at or after `from`. With `wrap`, the search
/// continues from index 0 up to `from`. Returns None when nothing qualifies.
pub fn next_active(active: &[bool], from: usize, wrap: bool) -> Option<usize> {
    let len = active.len();
    if len == 0 {
        return None;
    }
    let from = from.min(len);
    let head_end = if wrap { from } else { 0 };
    (from..len).chain(0..head_end).find(|&i| active[i])
}

/// A single voices-by-steps boolean matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternGrid {
    index: usize,
    active: bool,
    cells: Vec<Vec<bool>>,
}

impl PatternGrid {
    fn new(index: usize, rows: usize, steps: usize) -> PatternGrid {
        PatternGrid {
            index,
            active: false,
            cells: vec![vec![false; steps]; rows],
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn cell(&self, row: usize, step: usize) -> bool {
        self.cells
            .get(row)
            .and_then(|r| r.get(step))
            .copied()
            .unwrap_or(false)
    }

    /// The rows whose cell at `step` is set, in row order.
    pub fn rows_at(&self, step: usize) -> impl Iterator<Item = usize> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(move |(_, row)| row.get(step).copied().unwrap_or(false))
            .map(|(row, _)| row)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().flatten().all(|cell| !cell)
    }
}

/// The fixed set of pattern grids for a session. All grids share the same
/// dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternStore {
    grids: Vec<PatternGrid>,
    rows: usize,
    steps: usize,
}

impl PatternStore {
    /// Creates `grid_count` empty grids. Grid 0 starts active, the rest inactive.
    pub fn new(grid_count: usize, rows: usize, steps: usize) -> PatternStore {
        let mut grids: Vec<PatternGrid> = (0..grid_count)
            .map(|index| PatternGrid::new(index, rows, steps))
            .collect();
        if let Some(first) = grids.first_mut() {
            first.active = true;
        }
        PatternStore { grids, rows, steps }
    }

    pub fn grid_count(&self) -> usize {
        self.grids.len()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn grid(&self, grid: usize) -> Result<&PatternGrid, EngineError> {
        self.grids.get(grid).ok_or(EngineError::GridOutOfRange {
            grid,
            count: self.grids.len(),
        })
    }

    fn grid_mut(&mut self, grid: usize) -> Result<&mut PatternGrid, EngineError> {
        let count = self.grids.len();
        self.grids
            .get_mut(grid)
            .ok_or(EngineError::GridOutOfRange { grid, count })
    }

    fn check_step(&self, step: usize) -> Result<(), EngineError> {
        if step >= self.steps {
            return Err(EngineError::StepOutOfRange {
                step,
                count: self.steps,
            });
        }
        Ok(())
    }

    pub fn cell(&self, grid: usize, row: usize, step: usize) -> Result<bool, EngineError> {
        self.check_step(step)?;
        Ok(self.grid(grid)?.cell(row, step))
    }

    /// Flips a cell and returns its new value.
    pub fn toggle_cell(&mut self, grid: usize, row: usize, step: usize) -> Result<bool, EngineError> {
        let current = self.cell(grid, row, step)?;
        self.set_cell(grid, row, step, !current)?;
        Ok(!current)
    }

    pub fn set_cell(
        &mut self,
        grid: usize,
        row: usize,
        step: usize,
        value: bool,
    ) -> Result<(), EngineError> {
        self.check_step(step)?;
        let cell = self
            .grid_mut(grid)?
            .cells
            .get_mut(row)
            .and_then(|r| r.get_mut(step));
        // Rows are resolved from the registry before reaching the store.
        if let Some(cell) = cell {
            *cell = value;
        }
        Ok(())
    }

    /// Resets every cell of one grid to false.
    pub fn clear_grid(&mut self, grid: usize) -> Result<(), EngineError> {
        self.grid_mut(grid)?
            .cells
            .iter_mut()
            .for_each(|row| row.fill(false));
        Ok(())
    }

    pub fn set_active(&mut self, grid: usize, active: bool) -> Result<(), EngineError> {
        self.grid_mut(grid)?.active = active;
        Ok(())
    }

    /// The active flag of every grid, by index.
    pub fn active_flags(&self) -> Vec<bool> {
        self.grids.iter().map(PatternGrid::is_active).collect()
    }

    pub fn any_active(&self) -> bool {
        self.grids.iter().any(PatternGrid::is_active)
    }

    /// See [next_active].
    pub fn next_active(&self, from: usize, wrap: bool) -> Option<usize> {
        next_active(&self.active_flags(), from, wrap)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PatternGrid> {
        self.grids.iter()
    }
}
