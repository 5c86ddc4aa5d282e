use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::modules::board::{Cell, Dimensions};

/// Cells of padding added on every side of the board in target coordinates.
pub const BORDER_PAD: i32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error(
        "unexpected character '{ch}' at line {line}, column {column}; use '#', 'X', '.' or space"
    )]
    UnknownCharacter { ch: char, line: usize, column: usize },
}

/// Cells the operator wants covered, in padded coordinates.
///
/// The first entry is always the corner sentinel `(width + 4, height + 4)`;
/// marked cells follow in marking order without duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetCells {
    cells: Vec<Cell>,
}

impl TargetCells {
    pub fn sentinel_for(dims: Dimensions) -> Cell {
        Cell::new(dims.width + 2 * BORDER_PAD, dims.height + 2 * BORDER_PAD)
    }

    /// Builds the target set from board cells marked by the operator.
    /// Marks outside the board are skipped.
    pub fn from_marked(dims: Dimensions, marked: impl IntoIterator<Item = Cell>) -> Self {
        let mut cells = vec![Self::sentinel_for(dims)];
        let mut seen: HashSet<Cell> = cells.iter().copied().collect();
        for cell in marked {
            if !dims.contains(cell) {
                continue;
            }
            let padded = cell.offset(BORDER_PAD, BORDER_PAD);
            if seen.insert(padded) {
                cells.push(padded);
            }
        }
        Self { cells }
    }

    /// Maps points drawn on a `canvas_width` x `canvas_height` surface to
    /// board cells, then derives the target set.
    pub fn from_points(
        dims: Dimensions,
        canvas_width: f64,
        canvas_height: f64,
        points: &[(f64, f64)],
    ) -> Self {
        let box_width = canvas_width / dims.width as f64;
        let box_height = canvas_height / dims.height as f64;
        let marked = points.iter().map(|(px, py)| {
            Cell::new(
                (px / box_width).floor() as i32,
                (py / box_height).floor() as i32,
            )
        });
        Self::from_marked(dims, marked)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn sentinel(&self) -> Cell {
        self.cells[0]
    }

    /// Marked cells without the sentinel.
    pub fn marked(&self) -> &[Cell] {
        &self.cells[1..]
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Population size under exact coverage.
    pub fn coverage_population(&self) -> usize {
        self.cells.len().saturating_sub(1)
    }

    /// Whether a board cell is one of the marked targets.
    pub fn covers(&self, board_cell: Cell) -> bool {
        let padded = board_cell.offset(BORDER_PAD, BORDER_PAD);
        self.marked().contains(&padded)
    }
}

/// Parsed ASCII pattern: `#` marks a target, `X` an obstacle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pattern {
    pub marked: Vec<Cell>,
    pub obstacles: Vec<Cell>,
}

impl Pattern {
    pub fn parse(dims: Dimensions, text: &str) -> Result<Self, PatternError> {
        let mut pattern = Pattern::default();
        let mut skipped = 0usize;

        for (y, line) in text.lines().enumerate() {
            for (x, ch) in line.trim_end().chars().enumerate() {
                let cell = Cell::new(x as i32, y as i32);
                let slot = match ch {
                    '#' => &mut pattern.marked,
                    'X' | 'x' => &mut pattern.obstacles,
                    '.' | ' ' => continue,
                    other => {
                        return Err(PatternError::UnknownCharacter {
                            ch: other,
                            line: y + 1,
                            column: x + 1,
                        });
                    }
                };
                if dims.contains(cell) {
                    slot.push(cell);
                } else {
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            warn!(
                skipped,
                width = dims.width,
                height = dims.height,
                "pattern marks outside the board were skipped"
            );
        }
        Ok(pattern)
    }

    pub fn targets(&self, dims: Dimensions) -> TargetCells {
        TargetCells::from_marked(dims, self.marked.iter().copied())
    }
}
