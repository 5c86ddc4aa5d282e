use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::modules::agents::Population;
use crate::modules::board::{AgentId, Board, Cell, Dimensions, Occupant};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardEntry {
    pub cell: Cell,
    pub occupant: Occupant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub cell: Cell,
    pub born_tick: u64,
}

/// Read-only copy of the committed board and live population, handed to
/// renderers once per tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub x_dim: i32,
    pub y_dim: i32,
    /// Sorted row by row.
    pub board: Vec<BoardEntry>,
    /// In iteration order.
    pub agents: Vec<AgentSnapshot>,
    #[serde(default)]
    pub captured_at: Option<String>,
}

impl WorldSnapshot {
    pub fn capture(tick: u64, dims: Dimensions, board: &Board, population: &Population) -> Self {
        let mut entries: Vec<BoardEntry> = board
            .iter()
            .map(|(cell, occupant)| BoardEntry { cell, occupant })
            .collect();
        entries.sort_by_key(|e| (e.cell.y, e.cell.x));

        let agents = population
            .iter()
            .map(|h| AgentSnapshot {
                id: h.id,
                cell: h.cell(),
                born_tick: h.born_tick,
            })
            .collect();

        Self {
            tick,
            x_dim: dims.width,
            y_dim: dims.height,
            board: entries,
            agents,
            captured_at: None,
        }
    }

    pub fn dims(&self) -> Dimensions {
        Dimensions::new(self.x_dim, self.y_dim)
    }

    pub fn occupant(&self, cell: Cell) -> Option<Occupant> {
        self.board
            .iter()
            .find(|e| e.cell == cell)
            .map(|e| e.occupant)
    }

    pub fn stamped(mut self) -> Self {
        self.captured_at = Some(chrono::Utc::now().to_rfc3339());
        self
    }
}

pub fn snapshot_file_name(tick: u64) -> String {
    format!("tick_{:06}.json", tick)
}

pub fn save_world_snapshot_tick(dir: &Path, snapshot: &WorldSnapshot) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(snapshot_file_name(snapshot.tick));
    let json = serde_json::to_vec_pretty(snapshot)?;
    fs::write(&path, json)?;
    Ok(path)
}

pub fn load_world_snapshot(path: &Path) -> io::Result<WorldSnapshot> {
    let bytes = fs::read(path)?;
    let snapshot = serde_json::from_slice(&bytes).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("failed to parse snapshot {}: {}", path.display(), e),
        )
    })?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::agents::AgentHandle;
    use crate::modules::brain::Hover;

    fn sample() -> WorldSnapshot {
        let mut board = Board::with_obstacles([Cell::new(5, 0)]);
        board.set(Cell::new(2, 3), Occupant::Agent(1));
        board.set(Cell::new(9, 0), Occupant::Agent(0));
        let mut population = Population::new();
        population.insert(AgentHandle::new(0, Cell::new(9, 0), 0, Box::new(Hover)));
        population.insert(AgentHandle::new(1, Cell::new(2, 3), 4, Box::new(Hover)));
        WorldSnapshot::capture(7, Dimensions::new(10, 10), &board, &population)
    }

    #[test]
    fn capture_sorts_rows_and_keeps_agent_order() {
        let snapshot = sample();

        let cells: Vec<Cell> = snapshot.board.iter().map(|e| e.cell).collect();
        assert_eq!(cells, vec![Cell::new(5, 0), Cell::new(9, 0), Cell::new(2, 3)]);
        assert_eq!(snapshot.agents[0].id, 0);
        assert_eq!(snapshot.agents[1].born_tick, 4);
        assert_eq!(snapshot.occupant(Cell::new(5, 0)), Some(Occupant::Obstacle));
        assert_eq!(snapshot.occupant(Cell::new(0, 0)), None);
    }

    #[test]
    fn writes_tick_files() {
        let dir = std::env::temp_dir().join(format!("dronegrid-view-{}", std::process::id()));
        let snapshot = sample().stamped();

        let path = save_world_snapshot_tick(&dir, &snapshot).unwrap();
        let loaded = load_world_snapshot(&path).unwrap();
        let _ = fs::remove_dir_all(&dir);

        assert!(path.ends_with("tick_000007.json"));
        assert_eq!(loaded, snapshot);
    }
}
