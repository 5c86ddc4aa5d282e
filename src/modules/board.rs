use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub type AgentId = u64;

/// A grid coordinate. Cells outside the board are representable so that an
/// agent pushed off the edge can still be reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn origin() -> Self {
        Self { x: 0, y: 0 }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Like `offset`, but pins each axis at the `i32` range instead of
    /// overflowing. A pinned cell is always off the board.
    pub const fn saturating_offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: i32,
    pub height: i32,
}

impl Dimensions {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub const fn contains(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && cell.x < self.width && cell.y < self.height
    }

    pub fn area(&self) -> usize {
        (self.width.max(0) as usize) * (self.height.max(0) as usize)
    }

    /// Every in-bounds cell, row by row.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| Cell { x, y }))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "id")]
pub enum Occupant {
    Obstacle,
    Agent(AgentId),
}

impl Occupant {
    pub const fn agent_id(self) -> Option<AgentId> {
        match self {
            Occupant::Agent(id) => Some(id),
            Occupant::Obstacle => None,
        }
    }
}

/// Sparse occupancy map; a cell missing from the map is open.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Board {
    cells: HashMap<Cell, Occupant>,
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: HashMap::new(),
        }
    }

    pub fn with_obstacles(obstacles: impl IntoIterator<Item = Cell>) -> Self {
        let mut board = Self::new();
        for cell in obstacles {
            board.set(cell, Occupant::Obstacle);
        }
        board
    }

    pub fn get(&self, cell: Cell) -> Option<Occupant> {
        self.cells.get(&cell).copied()
    }

    /// Overwrites whatever was recorded at `cell`.
    pub fn set(&mut self, cell: Cell, occupant: Occupant) {
        self.cells.insert(cell, occupant);
    }

    pub fn remove(&mut self, cell: Cell) -> Option<Occupant> {
        self.cells.remove(&cell)
    }

    pub fn snapshot(&self) -> Board {
        self.clone()
    }

    /// Copy of the board holding only obstacles.
    pub fn without_agents(&self) -> Board {
        let cells = self
            .cells
            .iter()
            .filter(|(_, occupant)| **occupant == Occupant::Obstacle)
            .map(|(cell, occupant)| (*cell, *occupant))
            .collect();
        Board { cells }
    }

    pub fn is_obstacle(&self, cell: Cell) -> bool {
        self.get(cell) == Some(Occupant::Obstacle)
    }

    pub fn agent_at(&self, cell: Cell) -> Option<AgentId> {
        self.get(cell).and_then(Occupant::agent_id)
    }

    pub fn is_free(&self, cell: Cell) -> bool {
        !self.cells.contains_key(&cell)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Cell, Occupant)> + '_ {
        self.cells.iter().map(|(cell, occupant)| (*cell, *occupant))
    }

    pub fn obstacles(&self) -> impl Iterator<Item = Cell> + '_ {
        self.iter()
            .filter(|(_, occupant)| *occupant == Occupant::Obstacle)
            .map(|(cell, _)| cell)
    }

    pub fn obstacle_count(&self) -> usize {
        self.obstacles().count()
    }

    pub fn agent_count(&self) -> usize {
        self.cells.len() - self.obstacle_count()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturating_offset_pins_instead_of_wrapping() {
        let dims = Dimensions::new(10, 10);
        let cell = Cell::new(5, 5);

        assert_eq!(cell.saturating_offset(2, -3), Cell::new(7, 2));
        let far = cell.saturating_offset(i32::MAX, i32::MIN);
        assert_eq!(far, Cell::new(i32::MAX, i32::MIN));
        assert!(!dims.contains(far));
    }

    #[test]
    fn reset_keeps_obstacles_only() {
        let mut board = Board::with_obstacles([Cell::new(5, 0), Cell::new(0, 5)]);
        board.set(Cell::new(1, 1), Occupant::Agent(3));
        board.set(Cell::new(2, 2), Occupant::Agent(4));

        let reset = board.without_agents();

        assert_eq!(reset.len(), 2);
        assert!(reset.is_obstacle(Cell::new(5, 0)));
        assert!(reset.is_obstacle(Cell::new(0, 5)));
        assert_eq!(reset.agent_count(), 0);
        // the source board is untouched
        assert_eq!(board.agent_at(Cell::new(1, 1)), Some(3));
    }

    #[test]
    fn set_overwrites_previous_writer() {
        let mut board = Board::new();
        board.set(Cell::new(1, 0), Occupant::Agent(1));
        board.set(Cell::new(1, 0), Occupant::Agent(2));

        assert_eq!(board.agent_at(Cell::new(1, 0)), Some(2));
        assert_eq!(board.agent_count(), 1);
    }

    #[test]
    fn snapshot_is_detached() {
        let mut board = Board::new();
        board.set(Cell::new(0, 0), Occupant::Agent(1));
        let snapshot = board.snapshot();
        board.remove(Cell::new(0, 0));

        assert!(board.is_free(Cell::new(0, 0)));
        assert_eq!(snapshot.agent_at(Cell::new(0, 0)), Some(1));
    }

    #[test]
    fn dimensions_bounds() {
        let dims = Dimensions::new(10, 4);
        assert!(dims.contains(Cell::new(0, 0)));
        assert!(dims.contains(Cell::new(9, 3)));
        assert!(!dims.contains(Cell::new(10, 0)));
        assert!(!dims.contains(Cell::new(0, 4)));
        assert!(!dims.contains(Cell::new(-1, 2)));
        assert_eq!(dims.cells().count(), dims.area());
    }
}
