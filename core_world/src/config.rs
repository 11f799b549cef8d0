use std::{
    env, fs, io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use bevy::prelude::*;
use serde::Deserialize;
use thiserror::Error;

use world_proto::DEFAULT_COMMAND_PORT;

/// Environment variable naming an optional JSON overlay for
/// [`WorldHostConfig`].
pub const CONFIG_PATH_ENV: &str = "WORLDLOOM_CONFIG";

/// Host-side configuration. Defaults are usable as-is; a JSON overlay can
/// override any subset of fields.
#[derive(Resource, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorldHostConfig {
    pub command_bind: SocketAddr,
    pub poll_interval_ms: u64,
    pub max_line_bytes: usize,
    pub greeting: String,
    pub placement: PlacementRules,
    pub terrain: TerrainSettings,
}

/// Knobs for the landmark placement search.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PlacementRules {
    /// Half-width of the sampling square around the anchor.
    pub spawn_radius: f32,
    /// Minimum planar distance between any two spawned landmarks.
    pub min_spawn_distance: f32,
    /// Sampling attempts before accepting a degraded fallback.
    pub max_attempts: u32,
    /// Lift applied above the sampled ground height.
    pub height_offset: f32,
}

/// Shape of the built-in heightfield that answers ground queries.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TerrainSettings {
    /// Cells per side of the square field.
    pub cells: u32,
    /// World units per cell.
    pub cell_size: f32,
    /// Peak-to-valley range of generated heights.
    pub amplitude: f32,
    pub seed: u64,
}

impl Default for WorldHostConfig {
    fn default() -> Self {
        Self {
            command_bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_COMMAND_PORT),
            poll_interval_ms: 10,
            max_line_bytes: 64 * 1024,
            greeting: "Worldloom host ready".to_owned(),
            placement: PlacementRules::default(),
            terrain: TerrainSettings::default(),
        }
    }
}

impl Default for PlacementRules {
    fn default() -> Self {
        Self {
            spawn_radius: 2500.0,
            min_spawn_distance: 500.0,
            max_attempts: 50,
            height_offset: 50.0,
        }
    }
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            cells: 128,
            cell_size: 250.0,
            amplitude: 600.0,
            seed: 7,
        }
    }
}

/// Error raised while loading the host configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse host config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read host config from {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WorldHostConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&data)
    }

    /// Resolve the effective config: the `WORLDLOOM_CONFIG` overlay when the
    /// variable is set, built-in defaults otherwise.
    pub fn load() -> Result<Self, ConfigError> {
        match env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.is_empty() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }
}
