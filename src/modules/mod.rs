pub mod agents;
pub mod board;
pub mod brain;
pub mod config;
pub mod engine;
pub mod lifecycle;
pub mod relay;
pub mod sensor;
pub mod stats;
pub mod target;
pub mod view;
