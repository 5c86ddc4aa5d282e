use std::collections::VecDeque;

use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::modules::board::{AgentId, Cell};
use crate::modules::relay::{Message, MessageRelay, RelayError};
use crate::modules::sensor::{Offset, SENSOR_OFFSETS, SensorView};
use crate::modules::target::TargetCells;

/// Step requested by a decision function. Intended to stay within -1..=1 on
/// each axis; the engine applies whatever it is given.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Displacement {
    pub dx: i32,
    pub dy: i32,
}

impl Displacement {
    pub const STAY: Displacement = Displacement { dx: 0, dy: 0 };

    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }

    pub const fn is_stay(self) -> bool {
        self.dx == 0 && self.dy == 0
    }
}

impl From<Offset> for Displacement {
    fn from(offset: Offset) -> Self {
        Self::new(offset.dx, offset.dy)
    }
}

/// Decision logic owned by one agent.
pub trait Brain {
    /// Chooses the next step from the local view. Peer messages are only
    /// reachable through `relay`.
    fn decide(
        &mut self,
        view: &SensorView,
        relay: &MessageRelay<'_>,
    ) -> Result<Displacement, RelayError>;

    /// Message peers will read next tick.
    fn outbox(&self) -> Message {
        Message::Null
    }

    /// Free-form internal state for diagnostic dumps.
    fn describe(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// What a factory knows about the agent it is building a brain for.
#[derive(Clone, Copy, Debug)]
pub struct SpawnContext<'a> {
    pub id: AgentId,
    pub cell: Cell,
    pub tick: u64,
    pub targets: &'a TargetCells,
    pub population: usize,
}

pub trait BrainFactory {
    fn build(&mut self, ctx: &SpawnContext<'_>) -> Box<dyn Brain>;
}

impl<F> BrainFactory for F
where
    F: FnMut(&SpawnContext<'_>) -> Box<dyn Brain>,
{
    fn build(&mut self, ctx: &SpawnContext<'_>) -> Box<dyn Brain> {
        self(ctx)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrainMode {
    /// Never moves
    Hover,
    /// Random single steps into open neighbouring cells
    Wander,
}

impl BrainMode {
    pub const fn label(self) -> &'static str {
        match self {
            BrainMode::Hover => "hover",
            BrainMode::Wander => "wander",
        }
    }

    /// Factory producing this kind of brain. Wanderers get per-agent RNG
    /// streams derived from `seed` so runs are reproducible.
    pub fn factory(self, seed: Option<u64>) -> Box<dyn BrainFactory> {
        match self {
            BrainMode::Hover => {
                Box::new(|_: &SpawnContext<'_>| -> Box<dyn Brain> { Box::new(Hover) })
            }
            BrainMode::Wander => {
                let mut seeder = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed ^ 0x9e37_79b9_7f4a_7c15),
                    None => StdRng::from_entropy(),
                };
                Box::new(move |ctx: &SpawnContext<'_>| -> Box<dyn Brain> {
                    Box::new(Wander::new(ctx.id, seeder.r#gen()))
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Hover;

impl Brain for Hover {
    fn decide(
        &mut self,
        _view: &SensorView,
        _relay: &MessageRelay<'_>,
    ) -> Result<Displacement, RelayError> {
        Ok(Displacement::STAY)
    }
}

/// Steps into a random open neighbour, or holds when boxed in.
///
/// Publishes its id and move count, and remembers the last message heard from
/// an adjacent agent.
#[derive(Debug)]
pub struct Wander {
    id: AgentId,
    rng: StdRng,
    moves: u64,
    heard: Option<(AgentId, Message)>,
}

impl Wander {
    pub fn new(id: AgentId, seed: u64) -> Self {
        Self {
            id,
            rng: StdRng::seed_from_u64(seed),
            moves: 0,
            heard: None,
        }
    }
}

impl Brain for Wander {
    fn decide(
        &mut self,
        view: &SensorView,
        relay: &MessageRelay<'_>,
    ) -> Result<Displacement, RelayError> {
        if let Some(peer) = view.agents().next() {
            let message = relay.send_message(peer)?;
            self.heard = Some((peer, message));
        }

        // the first 8 sensor offsets are the single-step neighbours
        let open: Vec<Offset> = SENSOR_OFFSETS[..8]
            .iter()
            .copied()
            .filter(|offset| view.get(*offset).is_some_and(|tag| tag.is_open()))
            .collect();

        // Holding still half the time keeps the crowd from churning into itself.
        if open.is_empty() || self.rng.gen_bool(0.5) {
            return Ok(Displacement::STAY);
        }

        let step = open
            .choose(&mut self.rng)
            .copied()
            .map(Displacement::from)
            .unwrap_or(Displacement::STAY);
        self.moves = self.moves.saturating_add(1);
        Ok(step)
    }

    fn outbox(&self) -> Message {
        json!({ "id": self.id, "moves": self.moves })
    }

    fn describe(&self) -> serde_json::Value {
        json!({
            "kind": "wander",
            "moves": self.moves,
            "heard_from": self.heard.as_ref().map(|(id, _)| *id),
        })
    }
}

/// Replays a fixed list of steps, then holds. Optionally asks a peer for its
/// message before every step.
#[derive(Debug, Default)]
pub struct Scripted {
    steps: VecDeque<Displacement>,
    outbox: Message,
    listen_to: Option<AgentId>,
    heard: Vec<Message>,
}

impl Scripted {
    pub fn new(steps: impl IntoIterator<Item = Displacement>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_outbox(mut self, outbox: Message) -> Self {
        self.outbox = outbox;
        self
    }

    pub fn listening_to(mut self, peer: AgentId) -> Self {
        self.listen_to = Some(peer);
        self
    }
}

impl Brain for Scripted {
    fn decide(
        &mut self,
        _view: &SensorView,
        relay: &MessageRelay<'_>,
    ) -> Result<Displacement, RelayError> {
        if let Some(peer) = self.listen_to {
            let message = relay.send_message(peer)?;
            self.heard.push(message);
        }
        Ok(self.steps.pop_front().unwrap_or(Displacement::STAY))
    }

    fn outbox(&self) -> Message {
        self.outbox.clone()
    }

    fn describe(&self) -> serde_json::Value {
        json!({
            "kind": "scripted",
            "remaining": self.steps.len(),
            "heard": self.heard,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::board::{Board, Dimensions, Occupant};
    use crate::modules::relay::Outboxes;
    use crate::modules::sensor::sense;

    #[test]
    fn wander_only_steps_into_open_cells() {
        let dims = Dimensions::new(3, 3);
        let mut board = Board::with_obstacles([Cell::new(1, 0), Cell::new(0, 1)]);
        board.set(Cell::new(1, 1), Occupant::Agent(5));
        let outboxes: Outboxes = [(5, Message::Null)].into_iter().collect();

        // only (1,1) is a neighbour cell that is not blocked, and it holds an agent
        let view = sense(&board, dims, Cell::origin());
        let mut brain = Wander::new(0, 7);
        for _ in 0..20 {
            let relay = MessageRelay::new(&outboxes);
            let step = brain.decide(&view, &relay).unwrap();
            assert!(step.is_stay());
        }
        assert_eq!(brain.describe()["heard_from"], json!(5));
    }

    #[test]
    fn wander_moves_are_single_steps() {
        let dims = Dimensions::new(10, 10);
        let board = Board::new();
        let outboxes = Outboxes::new();
        let view = sense(&board, dims, Cell::new(5, 5));
        let mut brain = Wander::new(3, 11);

        for _ in 0..50 {
            let relay = MessageRelay::new(&outboxes);
            let step = brain.decide(&view, &relay).unwrap();
            assert!(step.dx.abs() <= 1 && step.dy.abs() <= 1);
        }
        assert_eq!(brain.outbox()["id"], json!(3));
    }

    #[test]
    fn scripted_replays_then_holds() {
        let dims = Dimensions::new(4, 4);
        let board = Board::new();
        let outboxes = Outboxes::new();
        let view = sense(&board, dims, Cell::origin());
        let mut brain = Scripted::new([Displacement::new(1, 0), Displacement::new(0, 1)]);
        let relay = MessageRelay::new(&outboxes);

        assert_eq!(brain.decide(&view, &relay), Ok(Displacement::new(1, 0)));
        assert_eq!(brain.decide(&view, &relay), Ok(Displacement::new(0, 1)));
        assert_eq!(brain.decide(&view, &relay), Ok(Displacement::STAY));
    }

    #[test]
    fn closures_are_factories() {
        let targets = TargetCells::from_marked(Dimensions::new(4, 4), [Cell::origin()]);
        let mut built = Vec::new();
        let mut factory = |ctx: &SpawnContext<'_>| -> Box<dyn Brain> {
            built.push(ctx.id);
            Box::new(Hover)
        };
        let ctx = SpawnContext {
            id: 4,
            cell: Cell::origin(),
            tick: 0,
            targets: &targets,
            population: 1,
        };
        let _ = factory.build(&ctx);
        assert_eq!(built, vec![4]);
    }
}
