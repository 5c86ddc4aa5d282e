use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_toon::to_string_pretty;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::modules::agents::Population;
use crate::modules::board::{AgentId, Board, Cell, Dimensions, Occupant};
use crate::modules::brain::BrainFactory;
use crate::modules::config::{ConfigError, SimConfig};
use crate::modules::lifecycle::{ChurnReport, Lifecycle, SpawnError, Spawned, destroy_agent};
use crate::modules::relay::{MessageRelay, Outboxes, RelayError};
use crate::modules::sensor::sense;
use crate::modules::target::TargetCells;
use crate::modules::view::WorldSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrashKind {
    Obstacle,
    OutOfBounds,
    /// Lost a shared cell to the drone that moved in last.
    Collision,
}

impl CrashKind {
    pub const fn label(self) -> &'static str {
        match self {
            CrashKind::Obstacle => "obstacle",
            CrashKind::OutOfBounds => "out_of_bounds",
            CrashKind::Collision => "collision",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    TickStarted {
        tick: u64,
    },
    AgentSpawned {
        agent_id: AgentId,
        cell: Cell,
        attempts: u32,
    },
    PlacementFailed {
        next_id: AgentId,
        attempts: u32,
        requested: Option<Cell>,
    },
    AgentMoved {
        agent_id: AgentId,
        from: Cell,
        to: Cell,
    },
    AgentCrashed {
        agent_id: AgentId,
        cell: Cell,
        kind: CrashKind,
        /// Winner of the cell for collisions.
        other: Option<AgentId>,
    },
    AgentCulled {
        agent_id: AgentId,
        cell: Cell,
    },
    TickCompleted {
        tick: u64,
        population: usize,
    },
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("tick {tick}: drone #{requested_by} asked for unknown drone #{target}")]
    UnknownAgent {
        tick: u64,
        requested_by: AgentId,
        target: AgentId,
    },
    #[error("simulation halted at tick {tick} after an unrecoverable error")]
    Halted { tick: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickResult {
    pub tick: u64,
    pub events: Vec<Event>,
}

/// Owns the board, the population and the lifecycle manager, and advances
/// them one tick at a time.
pub struct Simulation {
    tick: u64,
    config: SimConfig,
    board: Board,
    population: Population,
    lifecycle: Lifecycle,
    events: Vec<Event>,
    halted: bool,
}

impl Simulation {
    /// Seeds obstacles and spawns the initial population.
    pub fn new(
        config: SimConfig,
        targets: TargetCells,
        factory: Box<dyn BrainFactory>,
    ) -> Result<Self, SimError> {
        config.validate()?;

        let board = Board::with_obstacles(config.obstacles.iter().copied());
        let lifecycle = Lifecycle::new(&config, targets, factory);
        let mut sim = Self {
            tick: 0,
            config,
            board,
            population: Population::new(),
            lifecycle,
            events: Vec::new(),
            halted: false,
        };

        info!(
            x_dim = sim.config.x_dim,
            y_dim = sim.config.y_dim,
            obstacles = sim.board.obstacle_count(),
            drones = sim.lifecycle.target_population(),
            "building drones"
        );
        let results = sim
            .lifecycle
            .populate(&mut sim.board, &mut sim.population, 0);
        let events: Vec<Event> = results.into_iter().map(spawn_event).collect();
        sim.events.extend(events);
        info!(live = sim.population.len(), "drones built");

        Ok(sim)
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn dims(&self) -> Dimensions {
        self.config.dims()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn targets(&self) -> &TargetCells {
        self.lifecycle.targets()
    }

    pub fn target_population(&self) -> usize {
        self.lifecycle.target_population()
    }

    /// Every event since construction.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::capture(self.tick, self.dims(), &self.board, &self.population)
    }

    /// Spawns one drone outside the tick loop, at `at` when given.
    pub fn spawn_agent(&mut self, at: Option<Cell>) -> Result<Spawned, SpawnError> {
        let result = self
            .lifecycle
            .make_agent(&mut self.board, &mut self.population, at, self.tick);
        self.events.push(spawn_event(result.clone()));
        result
    }

    /// Advances one tick: reset, churn, decide and move, commit, collision
    /// sweep. The returned events are what renderers publish.
    pub fn step(&mut self) -> Result<TickResult, SimError> {
        if self.halted {
            return Err(SimError::Halted { tick: self.tick });
        }

        let tick = self.tick + 1;
        self.tick = tick;
        let mut events = vec![Event::TickStarted { tick }];

        let mut next = self.board.without_agents();

        if self.config.dynamic_mode {
            let report = self
                .lifecycle
                .churn(&mut self.board, &mut self.population, tick);
            events.extend(churn_events(report));
        }

        let order = self.population.order().to_vec();
        let mut outboxes: Outboxes = self
            .population
            .iter()
            .map(|h| (h.id, h.brain.outbox()))
            .collect();

        for agent_id in order {
            let (from, to) = match self.decide_and_move(agent_id, &outboxes) {
                Ok(Some(moved)) => moved,
                Ok(None) => continue,
                Err(RelayError::UnknownAgent { target }) => {
                    return Err(self.abort(agent_id, target));
                }
            };
            if from != to {
                events.push(Event::AgentMoved { agent_id, from, to });
            }

            if let Some(kind) = self.crash_kind(to) {
                match kind {
                    CrashKind::Obstacle => warn!(
                        agent = agent_id,
                        x = to.x,
                        y = to.y,
                        "drone {} crashed into an obstacle at {}",
                        agent_id,
                        to
                    ),
                    _ => warn!(
                        agent = agent_id,
                        x = to.x,
                        y = to.y,
                        "drone {} went out of bounds at {} and crashed",
                        agent_id,
                        to
                    ),
                }
                destroy_agent(&mut self.board, &mut self.population, agent_id);
                outboxes.forget(agent_id);
                events.push(Event::AgentCrashed {
                    agent_id,
                    cell: to,
                    kind,
                    other: None,
                });
                continue;
            }

            // Later drones overwrite earlier ones; the sweep below crashes
            // everyone but the last writer.
            next.set(to, Occupant::Agent(agent_id));
        }

        self.board = next;
        events.extend(self.sweep_collisions());

        events.push(Event::TickCompleted {
            tick,
            population: self.population.len(),
        });
        debug!(tick, live = self.population.len(), events = events.len(), "tick committed");
        self.events.extend(events.iter().cloned());

        Ok(TickResult { tick, events })
    }

    /// Runs the decision for one drone and applies its displacement. Returns
    /// the cells before and after, or `None` if the drone is already gone.
    fn decide_and_move(
        &mut self,
        agent_id: AgentId,
        outboxes: &Outboxes,
    ) -> Result<Option<(Cell, Cell)>, RelayError> {
        let dims = self.dims();
        let Some(handle) = self.population.get_mut(agent_id) else {
            return Ok(None);
        };

        let from = handle.cell();
        let view = sense(&self.board, dims, from);
        let relay = MessageRelay::new(outboxes);
        let decision = handle.brain.decide(&view, &relay);
        let step = match relay.fault() {
            Some(err) => return Err(err),
            None => decision?,
        };

        // Displacements are not clamped; an overflowing one pins off the board.
        let to = from.saturating_offset(step.dx, step.dy);
        handle.x = to.x;
        handle.y = to.y;
        Ok(Some((from, to)))
    }

    fn crash_kind(&self, cell: Cell) -> Option<CrashKind> {
        if self.board.is_obstacle(cell) {
            Some(CrashKind::Obstacle)
        } else if !self.dims().contains(cell) {
            Some(CrashKind::OutOfBounds)
        } else {
            None
        }
    }

    /// Every drone sharing a cell with another one is destroyed unless the
    /// committed board names it as the occupant.
    fn sweep_collisions(&mut self) -> Vec<Event> {
        let mut contested: Vec<(Cell, Vec<AgentId>)> = self
            .population
            .by_cell()
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .collect();
        contested.sort_by_key(|(cell, _)| (cell.y, cell.x));

        let mut events = Vec::new();
        for (cell, ids) in contested {
            let owner = self.board.agent_at(cell);
            for agent_id in ids {
                if Some(agent_id) == owner {
                    continue;
                }
                match owner {
                    Some(winner) => warn!(
                        agent = agent_id,
                        x = cell.x,
                        y = cell.y,
                        "drone {} crashed into drone {} at {}",
                        agent_id,
                        winner,
                        cell
                    ),
                    None => warn!(
                        agent = agent_id,
                        x = cell.x,
                        y = cell.y,
                        "drone {} crashed at unclaimed cell {}",
                        agent_id,
                        cell
                    ),
                }
                destroy_agent(&mut self.board, &mut self.population, agent_id);
                events.push(Event::AgentCrashed {
                    agent_id,
                    cell,
                    kind: CrashKind::Collision,
                    other: owner,
                });
            }
        }
        events
    }

    fn abort(&mut self, requested_by: AgentId, target: AgentId) -> SimError {
        self.halted = true;
        error!(
            tick = self.tick,
            requested_by,
            target,
            "could not find drone #{}; dumping state",
            target
        );
        error!("{}", self.diagnostic_dump());
        SimError::UnknownAgent {
            tick: self.tick,
            requested_by,
            target,
        }
    }

    /// Full board and population state, formatted for humans.
    pub fn diagnostic_dump(&self) -> String {
        let mut board: Vec<(Cell, Occupant)> = self.board.iter().collect();
        board.sort_by_key(|(cell, _)| (cell.y, cell.x));
        let board: Vec<serde_json::Value> = board
            .into_iter()
            .map(|(cell, occupant)| {
                let what = match occupant {
                    Occupant::Obstacle => json!("X"),
                    Occupant::Agent(id) => json!(id),
                };
                json!({ "x": cell.x, "y": cell.y, "occupant": what })
            })
            .collect();

        let drones: Vec<serde_json::Value> = self
            .population
            .iter()
            .map(|h| {
                json!({
                    "id": h.id,
                    "x": h.x,
                    "y": h.y,
                    "born_tick": h.born_tick,
                    "outbox": h.brain.outbox(),
                    "brain": h.brain.describe(),
                })
            })
            .collect();

        let payload = json!({
            "tick": self.tick,
            "x_dim": self.config.x_dim,
            "y_dim": self.config.y_dim,
            "next_id": self.lifecycle.next_id(),
            "target_population": self.lifecycle.target_population(),
            "board": board,
            "drones": drones,
        });

        to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string())
    }
}

fn spawn_event(result: Result<Spawned, SpawnError>) -> Event {
    match result {
        Ok(spawned) => Event::AgentSpawned {
            agent_id: spawned.id,
            cell: spawned.cell,
            attempts: spawned.attempts,
        },
        Err(SpawnError::PlacementFailure {
            next_id,
            attempts,
            requested,
        }) => Event::PlacementFailed {
            next_id,
            attempts,
            requested,
        },
    }
}

fn churn_events(report: ChurnReport) -> Vec<Event> {
    let mut events: Vec<Event> = report.spawned.into_iter().map(spawn_event).collect();
    events.extend(
        report
            .culled
            .into_iter()
            .map(|(agent_id, cell)| Event::AgentCulled { agent_id, cell }),
    );
    events
}
