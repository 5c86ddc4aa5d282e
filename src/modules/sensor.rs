use std::fmt;

use serde::{Deserialize, Serialize};

use crate::modules::board::{AgentId, Board, Cell, Dimensions, Occupant};

/// Offset relative to the sensing agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Offset {
    pub dx: i32,
    pub dy: i32,
}

impl Offset {
    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }
}

/// The 8 Chebyshev neighbours followed by the 4 axis cells at distance 2.
pub const SENSOR_OFFSETS: [Offset; 12] = [
    Offset::new(0, 1),
    Offset::new(1, 0),
    Offset::new(0, -1),
    Offset::new(-1, 0),
    Offset::new(1, 1),
    Offset::new(-1, 1),
    Offset::new(1, -1),
    Offset::new(-1, -1),
    Offset::new(0, 2),
    Offset::new(0, -2),
    Offset::new(2, 0),
    Offset::new(-2, 0),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Nothing there.
    Open,
    /// Obstacle or off the board.
    Blocked,
    Agent(AgentId),
}

impl Tag {
    pub const fn is_open(self) -> bool {
        matches!(self, Tag::Open)
    }

    pub const fn agent(self) -> Option<AgentId> {
        match self {
            Tag::Agent(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Open => write!(f, "O"),
            Tag::Blocked => write!(f, "X"),
            Tag::Agent(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SensorView {
    readings: [(Offset, Tag); 12],
}

impl SensorView {
    pub fn get(&self, offset: Offset) -> Option<Tag> {
        self.readings
            .iter()
            .find(|(o, _)| *o == offset)
            .map(|(_, tag)| *tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Offset, Tag)> + '_ {
        self.readings.iter().copied()
    }

    /// Ids of every agent in view, in footprint order.
    pub fn agents(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.readings.iter().filter_map(|(_, tag)| tag.agent())
    }

    /// Compact `offset:tag` rendering, used in crash diagnostics.
    pub fn describe(&self) -> String {
        self.readings
            .iter()
            .map(|(o, tag)| format!("({},{}):{}", o.dx, o.dy, tag))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub fn sense(board: &Board, dims: Dimensions, at: Cell) -> SensorView {
    let readings = SENSOR_OFFSETS.map(|offset| {
        let cell = at.offset(offset.dx, offset.dy);
        (offset, read_cell(board, dims, cell))
    });
    SensorView { readings }
}

fn read_cell(board: &Board, dims: Dimensions, cell: Cell) -> Tag {
    if !dims.contains(cell) {
        return Tag::Blocked;
    }
    match board.get(cell) {
        None => Tag::Open,
        Some(Occupant::Obstacle) => Tag::Blocked,
        Some(Occupant::Agent(id)) => Tag::Agent(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footprint_is_twelve_distinct_offsets() {
        let mut seen = std::collections::HashSet::new();
        for offset in SENSOR_OFFSETS {
            assert!(seen.insert(offset));
            let manhattan = offset.dx.abs() + offset.dy.abs();
            let chebyshev = offset.dx.abs().max(offset.dy.abs());
            assert!(chebyshev == 1 || (manhattan == 2 && (offset.dx == 0 || offset.dy == 0)));
        }
        assert_eq!(seen.len(), 12);
    }

    #[test]
    fn tags_obstacles_agents_and_open_cells() {
        let dims = Dimensions::new(10, 10);
        let mut board = Board::with_obstacles([Cell::new(5, 6)]);
        board.set(Cell::new(6, 5), Occupant::Agent(7));

        let view = sense(&board, dims, Cell::new(5, 5));

        assert_eq!(view.get(Offset::new(0, 1)), Some(Tag::Blocked));
        assert_eq!(view.get(Offset::new(1, 0)), Some(Tag::Agent(7)));
        assert_eq!(view.get(Offset::new(-2, 0)), Some(Tag::Open));
        assert_eq!(view.get(Offset::new(3, 0)), None);
        assert_eq!(view.agents().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn out_of_bounds_wins_over_board_contents() {
        let dims = Dimensions::new(4, 4);
        let mut board = Board::new();
        // stray entries outside the board must never leak into a view
        board.set(Cell::new(-1, 0), Occupant::Agent(9));
        board.set(Cell::new(0, -2), Occupant::Agent(8));

        let view = sense(&board, dims, Cell::origin());

        assert_eq!(view.get(Offset::new(-1, 0)), Some(Tag::Blocked));
        assert_eq!(view.get(Offset::new(0, -2)), Some(Tag::Blocked));
        assert_eq!(view.get(Offset::new(-1, -1)), Some(Tag::Blocked));
        assert_eq!(view.get(Offset::new(1, 1)), Some(Tag::Open));
        assert_eq!(view.agents().count(), 0);
    }

    #[test]
    fn tags_render_as_single_tokens() {
        assert_eq!(Tag::Open.to_string(), "O");
        assert_eq!(Tag::Blocked.to_string(), "X");
        assert_eq!(Tag::Agent(12).to_string(), "12");
    }
}
