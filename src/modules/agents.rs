use std::collections::HashMap;
use std::fmt;

use crate::modules::board::{AgentId, Cell};
use crate::modules::brain::Brain;

/// Engine-side record of one drone. The engine owns the position; the brain
/// is opaque apart from its decision call and outbox.
pub struct AgentHandle {
    pub id: AgentId,
    pub x: i32,
    pub y: i32,
    pub born_tick: u64,
    pub brain: Box<dyn Brain>,
}

impl AgentHandle {
    pub fn new(id: AgentId, cell: Cell, born_tick: u64, brain: Box<dyn Brain>) -> Self {
        Self {
            id,
            x: cell.x,
            y: cell.y,
            born_tick,
            brain,
        }
    }

    pub const fn cell(&self) -> Cell {
        Cell {
            x: self.x,
            y: self.y,
        }
    }
}

impl fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}: ({}, {})", self.id, self.x, self.y)
    }
}

/// Live drones keyed by id, iterated in spawn order.
#[derive(Default)]
pub struct Population {
    order: Vec<AgentId>,
    slots: HashMap<AgentId, AgentHandle>,
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handle; it goes last in iteration order.
    pub fn insert(&mut self, handle: AgentHandle) {
        let id = handle.id;
        if self.slots.insert(id, handle).is_none() {
            self.order.push(id);
        }
    }

    pub fn remove(&mut self, id: AgentId) -> Option<AgentHandle> {
        let handle = self.slots.remove(&id)?;
        self.order.retain(|other| *other != id);
        Some(handle)
    }

    pub fn get(&self, id: AgentId) -> Option<&AgentHandle> {
        self.slots.get(&id)
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut AgentHandle> {
        self.slots.get_mut(&id)
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Ids in iteration order.
    pub fn order(&self) -> &[AgentId] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentHandle> + '_ {
        self.order.iter().filter_map(|id| self.slots.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether any live drone other than `except` stands on `cell`.
    pub fn occupied_by_other(&self, cell: Cell, except: Option<AgentId>) -> Option<AgentId> {
        self.iter()
            .find(|handle| Some(handle.id) != except && handle.cell() == cell)
            .map(|handle| handle.id)
    }

    /// Live drones grouped by the cell they stand on, each group in
    /// iteration order.
    pub fn by_cell(&self) -> HashMap<Cell, Vec<AgentId>> {
        let mut cells: HashMap<Cell, Vec<AgentId>> = HashMap::new();
        for handle in self.iter() {
            cells.entry(handle.cell()).or_default().push(handle.id);
        }
        cells
    }
}

impl fmt::Debug for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::brain::Hover;

    fn handle(id: AgentId, x: i32, y: i32) -> AgentHandle {
        AgentHandle::new(id, Cell::new(x, y), 0, Box::new(Hover))
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let mut population = Population::new();
        for id in [4, 1, 9, 2] {
            population.insert(handle(id, id as i32, 0));
        }

        let ids: Vec<_> = population.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![4, 1, 9, 2]);
        assert_eq!(population.order(), &[4, 1, 9, 2]);
    }

    #[test]
    fn removal_keeps_remaining_order() {
        let mut population = Population::new();
        for id in 0..5 {
            population.insert(handle(id, 0, id as i32));
        }

        let removed = population.remove(2).unwrap();
        assert_eq!(removed.cell(), Cell::new(0, 2));
        assert!(population.remove(2).is_none());
        assert_eq!(population.order(), &[0, 1, 3, 4]);

        // lookups do not reorder
        let _ = population.get_mut(4);
        let _ = population.get(0);
        assert_eq!(population.order(), &[0, 1, 3, 4]);
    }

    #[test]
    fn groups_drones_by_cell() {
        let mut population = Population::new();
        population.insert(handle(1, 1, 0));
        population.insert(handle(2, 3, 3));
        population.insert(handle(3, 1, 0));

        let cells = population.by_cell();
        assert_eq!(cells[&Cell::new(1, 0)], vec![1, 3]);
        assert_eq!(cells[&Cell::new(3, 3)], vec![2]);
        assert_eq!(population.occupied_by_other(Cell::new(1, 0), Some(1)), Some(3));
        assert_eq!(population.occupied_by_other(Cell::new(3, 3), Some(2)), None);
    }

    #[test]
    fn debug_shows_id_and_position() {
        let h = handle(7, 2, 5);
        assert_eq!(format!("{:?}", h), "#7: (2, 5)");
    }
}
