use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::modules::board::{Cell, Dimensions};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(
        "failed to parse config {path}; delete it or run `dronegrid config init` to reset: {source}"
    )]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Setup options for a run. Every field has a default so partial JSON files
/// are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub x_dim: i32,
    pub y_dim: i32,
    /// Population size; ignored under exact coverage.
    pub num_drones: usize,
    /// Size the population from the target-cell count.
    pub exact_coverage: bool,
    /// Respawn one drone per tick while short, and cull every `dyn_time` ticks.
    pub dynamic_mode: bool,
    pub dyn_time: u64,
    pub dyn_num: usize,
    /// Respawn at `spawn_origin` instead of a random cell.
    pub one_spawn: bool,
    pub spawn_origin: Cell,
    pub spawn_attempts: u32,
    pub obstacles: Vec<Cell>,
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            x_dim: 10,
            y_dim: 10,
            num_drones: 2,
            exact_coverage: true,
            dynamic_mode: false,
            dyn_time: 10,
            dyn_num: 5,
            one_spawn: false,
            spawn_origin: Cell::new(1, 1),
            spawn_attempts: 10,
            obstacles: vec![Cell::new(5, 0), Cell::new(0, 5), Cell::new(5, 5)],
            seed: None,
        }
    }
}

impl SimConfig {
    pub const fn dims(&self) -> Dimensions {
        Dimensions::new(self.x_dim, self.y_dim)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.x_dim <= 0 || self.y_dim <= 0 {
            return Err(ConfigError::Invalid(format!(
                "board dimensions must be positive, got {}x{}",
                self.x_dim, self.y_dim
            )));
        }
        if self.dynamic_mode && self.dyn_time == 0 {
            return Err(ConfigError::Invalid(
                "dyn_time must be at least 1 in dynamic mode".into(),
            ));
        }
        if self.spawn_attempts == 0 {
            return Err(ConfigError::Invalid(
                "spawn_attempts must be at least 1".into(),
            ));
        }
        let dims = self.dims();
        if let Some(cell) = self.obstacles.iter().find(|c| !dims.contains(**c)) {
            return Err(ConfigError::Invalid(format!(
                "obstacle {} lies outside the {}x{} board",
                cell, self.x_dim, self.y_dim
            )));
        }
        if self.one_spawn && !dims.contains(self.spawn_origin) {
            return Err(ConfigError::Invalid(format!(
                "spawn_origin {} lies outside the {}x{} board",
                self.spawn_origin, self.x_dim, self.y_dim
            )));
        }
        Ok(())
    }
}

fn config_dir() -> PathBuf {
    PathBuf::from(".dronegrid")
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Loads a config file; a missing or empty file yields the defaults.
pub fn load_config(path: &Path) -> Result<SimConfig, ConfigError> {
    if !path.exists() {
        return Ok(SimConfig::default());
    }

    let bytes = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Ok(SimConfig::default());
    }

    serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_config(path: &Path, config: &SimConfig) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_vec_pretty(config).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(io_err)?;
    Ok(())
}
