pub mod modules;

pub use modules::agents::{AgentHandle, Population};
pub use modules::board::{AgentId, Board, Cell, Dimensions, Occupant};
pub use modules::brain::{
    Brain, BrainFactory, BrainMode, Displacement, Hover, Scripted, SpawnContext, Wander,
};
pub use modules::config::{
    self, ConfigError, SimConfig, default_config_path, load_config, save_config,
};
pub use modules::engine::{CrashKind, Event, SimError, Simulation, TickResult};
pub use modules::lifecycle::{ChurnReport, Lifecycle, SpawnError, Spawned, destroy_agent};
pub use modules::relay::{Message, MessageRelay, Outboxes, RelayError};
pub use modules::sensor::{Offset, SENSOR_OFFSETS, SensorView, Tag, sense};
pub use modules::stats::RunStats;
pub use modules::target::{BORDER_PAD, Pattern, PatternError, TargetCells};
pub use modules::view::{
    AgentSnapshot, BoardEntry, WorldSnapshot, load_world_snapshot, save_world_snapshot_tick,
    snapshot_file_name,
};
