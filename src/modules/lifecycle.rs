use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::modules::agents::{AgentHandle, Population};
use crate::modules::board::{AgentId, Board, Cell, Dimensions, Occupant};
use crate::modules::brain::{BrainFactory, SpawnContext};
use crate::modules::config::SimConfig;
use crate::modules::target::TargetCells;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpawnError {
    #[error("unable to create drone #{next_id}: no free cell after {attempts} attempt(s)")]
    PlacementFailure {
        next_id: AgentId,
        attempts: u32,
        requested: Option<Cell>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spawned {
    pub id: AgentId,
    pub cell: Cell,
    pub attempts: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChurnReport {
    pub spawned: Option<Result<Spawned, SpawnError>>,
    /// Drones removed by the periodic cull, with their last cell.
    pub culled: Vec<(AgentId, Cell)>,
}

/// Creates and destroys drones. Holds the id counter, the placement RNG and
/// the factory that builds each drone's brain.
pub struct Lifecycle {
    dims: Dimensions,
    rng: StdRng,
    next_id: AgentId,
    attempts: u32,
    targets: TargetCells,
    target_population: usize,
    one_spawn: bool,
    spawn_origin: Cell,
    dyn_time: u64,
    dyn_num: usize,
    factory: Box<dyn BrainFactory>,
}

impl Lifecycle {
    pub fn new(config: &SimConfig, targets: TargetCells, factory: Box<dyn BrainFactory>) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let target_population = if config.exact_coverage {
            targets.coverage_population()
        } else {
            config.num_drones
        };

        Self {
            dims: config.dims(),
            rng,
            next_id: 0,
            attempts: config.spawn_attempts.max(1),
            targets,
            target_population,
            one_spawn: config.one_spawn,
            spawn_origin: config.spawn_origin,
            dyn_time: config.dyn_time.max(1),
            dyn_num: config.dyn_num,
            factory,
        }
    }

    pub fn target_population(&self) -> usize {
        self.target_population
    }

    pub fn targets(&self) -> &TargetCells {
        &self.targets
    }

    /// Next id to be handed out.
    pub fn next_id(&self) -> AgentId {
        self.next_id
    }

    /// Spawns drones until the target population is reached or a placement
    /// fails for each remaining slot.
    pub fn populate(
        &mut self,
        board: &mut Board,
        population: &mut Population,
        tick: u64,
    ) -> Vec<Result<Spawned, SpawnError>> {
        let missing = self.target_population.saturating_sub(population.len());
        (0..missing)
            .map(|_| self.make_agent(board, population, None, tick))
            .collect()
    }

    /// Places a new drone at `at` (jittered on retries) or on a random free
    /// cell, builds its brain and registers it on the board.
    pub fn make_agent(
        &mut self,
        board: &mut Board,
        population: &mut Population,
        at: Option<Cell>,
        tick: u64,
    ) -> Result<Spawned, SpawnError> {
        let mut requested = at;
        let mut placed = None;
        let mut tries = 0;

        while tries < self.attempts {
            tries += 1;
            let candidate = match requested {
                Some(cell) => Some(cell),
                None => self.random_cell(),
            };

            if let Some(cell) = candidate {
                if !self.placement_blocked(board, population, cell) {
                    placed = Some(cell);
                    break;
                }
            }

            if let Some(cell) = requested {
                requested = Some(self.jitter(cell));
            }
        }

        let Some(cell) = placed else {
            let err = SpawnError::PlacementFailure {
                next_id: self.next_id,
                attempts: tries,
                requested: at,
            };
            warn!(next_id = self.next_id, attempts = tries, "{}", err);
            return Err(err);
        };

        let id = self.next_id;
        self.next_id += 1;
        let ctx = SpawnContext {
            id,
            cell,
            tick,
            targets: &self.targets,
            population: self.target_population,
        };
        let brain = self.factory.build(&ctx);
        population.insert(AgentHandle::new(id, cell, tick, brain));
        board.set(cell, Occupant::Agent(id));
        debug!(agent = id, x = cell.x, y = cell.y, attempts = tries, "drone spawned");

        Ok(Spawned {
            id,
            cell,
            attempts: tries,
        })
    }

    /// Runs one tick of dynamic churn: refill one slot if short, then cull on
    /// every `dyn_time`-th tick.
    pub fn churn(
        &mut self,
        board: &mut Board,
        population: &mut Population,
        tick: u64,
    ) -> ChurnReport {
        let mut report = ChurnReport::default();

        if population.len() < self.target_population {
            let at = self.one_spawn.then_some(self.spawn_origin);
            report.spawned = Some(self.make_agent(board, population, at, tick));
        }

        if tick % self.dyn_time == 0 && !population.is_empty() {
            let count = self.dyn_num.min(population.len());
            for _ in 0..count {
                let Some(&id) = population.order().choose(&mut self.rng) else {
                    break;
                };
                if let Some(handle) = destroy_agent(board, population, id) {
                    report.culled.push((id, handle.cell()));
                }
            }
            if !report.culled.is_empty() {
                info!(tick, culled = report.culled.len(), "dynamic mode culled drones");
            }
        }

        report
    }

    fn placement_blocked(&self, board: &Board, population: &Population, cell: Cell) -> bool {
        !self.dims.contains(cell)
            || !board.is_free(cell)
            || population.occupied_by_other(cell, None).is_some()
    }

    /// Uniform pick over the whole board; `placement_blocked` rejects taken
    /// cells and the attempt counts against the budget.
    fn random_cell(&mut self) -> Option<Cell> {
        if self.dims.area() == 0 {
            return None;
        }
        Some(Cell::new(
            self.rng.gen_range(0..self.dims.width),
            self.rng.gen_range(0..self.dims.height),
        ))
    }

    fn jitter(&mut self, cell: Cell) -> Cell {
        let dx = if self.rng.gen_bool(0.5) { 1 } else { -1 };
        let dy = if self.rng.gen_bool(0.5) { 1 } else { -1 };
        cell.offset(dx, dy)
    }
}

/// Removes a drone from the population. Its board entry is cleared only when
/// the board still attributes that cell to it.
pub fn destroy_agent(
    board: &mut Board,
    population: &mut Population,
    id: AgentId,
) -> Option<AgentHandle> {
    let handle = population.remove(id)?;
    let cell = handle.cell();
    if board.agent_at(cell) == Some(id) {
        board.remove(cell);
    }
    debug!(agent = id, x = cell.x, y = cell.y, "drone destroyed");
    Some(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::brain::{Brain, Hover};

    fn hover_factory() -> Box<dyn BrainFactory> {
        Box::new(|_: &SpawnContext<'_>| -> Box<dyn Brain> { Box::new(Hover) })
    }

    fn config(seed: u64) -> SimConfig {
        SimConfig {
            exact_coverage: false,
            num_drones: 4,
            seed: Some(seed),
            ..SimConfig::default()
        }
    }

    fn lifecycle(config: &SimConfig) -> Lifecycle {
        let targets = TargetCells::from_marked(config.dims(), []);
        Lifecycle::new(config, targets, hover_factory())
    }

    #[test]
    fn populate_places_distinct_free_cells() {
        let config = config(1);
        let mut life = lifecycle(&config);
        let mut board = Board::with_obstacles(config.obstacles.iter().copied());
        let mut population = Population::new();

        let results = life.populate(&mut board, &mut population, 0);

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(population.len(), 4);
        assert_eq!(population.order(), &[0, 1, 2, 3]);
        assert_eq!(board.agent_count(), 4);
        assert_eq!(board.obstacle_count(), 3);
        for handle in population.iter() {
            assert_eq!(board.agent_at(handle.cell()), Some(handle.id));
        }
    }

    #[test]
    fn exact_coverage_sizes_from_targets() {
        let config = SimConfig {
            exact_coverage: true,
            num_drones: 50,
            seed: Some(2),
            ..SimConfig::default()
        };
        let targets = TargetCells::from_marked(
            config.dims(),
            [Cell::new(1, 1), Cell::new(2, 2), Cell::new(3, 3)],
        );
        let life = Lifecycle::new(&config, targets, hover_factory());

        assert_eq!(life.target_population(), 3);
    }

    #[test]
    fn requested_cell_is_used_when_free() {
        let config = config(3);
        let mut life = lifecycle(&config);
        let mut board = Board::new();
        let mut population = Population::new();

        let spawned = life
            .make_agent(&mut board, &mut population, Some(Cell::new(1, 1)), 0)
            .unwrap();

        assert_eq!(spawned.cell, Cell::new(1, 1));
        assert_eq!(spawned.attempts, 1);
        assert_eq!(board.agent_at(Cell::new(1, 1)), Some(spawned.id));
    }

    #[test]
    fn requested_cell_is_jittered_when_taken() {
        let config = config(4);
        let mut life = lifecycle(&config);
        let mut board = Board::new();
        let mut population = Population::new();
        let first = life
            .make_agent(&mut board, &mut population, Some(Cell::new(4, 4)), 0)
            .unwrap();

        let second = life
            .make_agent(&mut board, &mut population, Some(Cell::new(4, 4)), 0)
            .unwrap();

        assert_ne!(second.cell, first.cell);
        assert!(second.attempts >= 2);
        // first retry is one diagonal step away
        if second.attempts == 2 {
            assert_eq!((second.cell.x - 4).abs(), 1);
            assert_eq!((second.cell.y - 4).abs(), 1);
        }
        assert_eq!(second.id, first.id + 1);
    }

    #[test]
    fn random_placement_only_accepts_free_cells() {
        // one free cell left on a 2x2 board
        let config = SimConfig {
            x_dim: 2,
            y_dim: 2,
            spawn_attempts: 200,
            obstacles: vec![Cell::new(0, 0), Cell::new(1, 1)],
            ..config(9)
        };
        let mut life = lifecycle(&config);
        let mut board = Board::with_obstacles(config.obstacles.iter().copied());
        let mut population = Population::new();
        life.make_agent(&mut board, &mut population, Some(Cell::new(1, 0)), 0)
            .unwrap();

        let spawned = life
            .make_agent(&mut board, &mut population, None, 0)
            .unwrap();

        assert_eq!(spawned.cell, Cell::new(0, 1));
        assert_eq!(board.obstacle_count(), 2);
        assert_eq!(board.agent_count(), 2);

        let err = life
            .make_agent(&mut board, &mut population, None, 0)
            .unwrap_err();
        assert!(matches!(err, SpawnError::PlacementFailure { attempts: 200, .. }));
    }

    #[test]
    fn full_board_reports_placement_failure_without_consuming_an_id() {
        let config = SimConfig {
            x_dim: 2,
            y_dim: 1,
            obstacles: vec![Cell::new(0, 0), Cell::new(1, 0)],
            ..config(5)
        };
        let mut life = lifecycle(&config);
        let mut board = Board::with_obstacles(config.obstacles.iter().copied());
        let mut population = Population::new();

        let err = life
            .make_agent(&mut board, &mut population, None, 0)
            .unwrap_err();

        assert_eq!(
            err,
            SpawnError::PlacementFailure {
                next_id: 0,
                attempts: 10,
                requested: None
            }
        );
        assert!(population.is_empty());
        assert_eq!(life.next_id(), 0);
    }

    #[test]
    fn destroy_leaves_cells_claimed_by_others() {
        let mut board = Board::new();
        let mut population = Population::new();
        population.insert(AgentHandle::new(1, Cell::new(1, 0), 0, Box::new(Hover)));
        population.insert(AgentHandle::new(2, Cell::new(1, 0), 0, Box::new(Hover)));
        population.insert(AgentHandle::new(3, Cell::new(4, 4), 0, Box::new(Hover)));
        board.set(Cell::new(1, 0), Occupant::Agent(2));
        board.set(Cell::new(4, 4), Occupant::Agent(3));

        destroy_agent(&mut board, &mut population, 1).unwrap();
        assert_eq!(board.agent_at(Cell::new(1, 0)), Some(2));

        destroy_agent(&mut board, &mut population, 3).unwrap();
        assert!(board.is_free(Cell::new(4, 4)));
        assert_eq!(population.order(), &[2]);
        assert!(destroy_agent(&mut board, &mut population, 3).is_none());
    }

    #[test]
    fn churn_refills_one_per_tick_and_culls_on_period() {
        let config = SimConfig {
            dynamic_mode: true,
            dyn_time: 3,
            dyn_num: 2,
            one_spawn: true,
            ..config(6)
        };
        let mut life = lifecycle(&config);
        let mut board = Board::new();
        let mut population = Population::new();

        let first = life.churn(&mut board, &mut population, 1);
        assert_eq!(first.spawned.unwrap().unwrap().cell, Cell::new(1, 1));
        assert!(first.culled.is_empty());

        let _ = life.churn(&mut board, &mut population, 2);
        assert_eq!(population.len(), 2);

        let third = life.churn(&mut board, &mut population, 3);
        assert!(third.spawned.is_some());
        assert_eq!(third.culled.len(), 2);
        assert_eq!(population.len(), 1);
        for (id, _) in &third.culled {
            assert!(!population.contains(*id));
        }
    }

    #[test]
    fn churn_never_exceeds_target() {
        let config = SimConfig {
            dynamic_mode: true,
            dyn_time: 1000,
            ..config(7)
        };
        let mut life = lifecycle(&config);
        let mut board = Board::new();
        let mut population = Population::new();

        for tick in 1..20 {
            let _ = life.churn(&mut board, &mut population, tick);
            assert!(population.len() <= life.target_population());
        }
        assert_eq!(population.len(), 4);
    }
}
