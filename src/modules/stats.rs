use serde::{Deserialize, Serialize};

use crate::modules::engine::{CrashKind, Event};

/// Counters of lifecycle and crash events over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub ticks: u64,
    pub spawned: u64,
    pub placement_failures: u64,
    pub obstacle_crashes: u64,
    pub out_of_bounds_crashes: u64,
    pub collisions: u64,
    pub culled: u64,
}

impl RunStats {
    pub fn record(&mut self, event: &Event) {
        match event {
            Event::TickCompleted { .. } => self.ticks = self.ticks.saturating_add(1),
            Event::AgentSpawned { .. } => self.spawned = self.spawned.saturating_add(1),
            Event::PlacementFailed { .. } => {
                self.placement_failures = self.placement_failures.saturating_add(1)
            }
            Event::AgentCrashed { kind, .. } => match kind {
                CrashKind::Obstacle => {
                    self.obstacle_crashes = self.obstacle_crashes.saturating_add(1)
                }
                CrashKind::OutOfBounds => {
                    self.out_of_bounds_crashes = self.out_of_bounds_crashes.saturating_add(1)
                }
                CrashKind::Collision => self.collisions = self.collisions.saturating_add(1),
            },
            Event::AgentCulled { .. } => self.culled = self.culled.saturating_add(1),
            Event::TickStarted { .. } | Event::AgentMoved { .. } => {}
        }
    }

    pub fn record_all<'a>(&mut self, events: impl IntoIterator<Item = &'a Event>) {
        for event in events {
            self.record(event);
        }
    }

    pub fn crashes(&self) -> u64 {
        self.obstacle_crashes
            .saturating_add(self.out_of_bounds_crashes)
            .saturating_add(self.collisions)
    }
}
