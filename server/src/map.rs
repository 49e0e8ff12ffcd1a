//! Map descriptor loaded once at startup
//!
//! The map supplies named respawn points for players and item respawn points
//! with a per-tick spawn probability. It is read-only for the lifetime of the
//! server.

use crate::error::ConfigError;
use log::{error, info};
use rand::Rng;
use serde::Deserialize;
use shared::{Quaternion, Vector3, IDENTITY_QUATERNION};
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Rotation {
    pub fn to_quaternion(self) -> Quaternion {
        [self.x, self.y, self.z, self.w]
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RespawnPoint {
    pub position: Vector3,
    pub quaternion: Rotation,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemRespawnPoint {
    pub position: Vector3,
    pub item_id: i64,
    pub spawn_chance_per_tick: f64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MapData {
    pub name: String,
    #[serde(default)]
    pub respawn_points: Vec<RespawnPoint>,
    #[serde(default)]
    pub item_respawn_points: Vec<ItemRespawnPoint>,
}

/// Where and how a player is placed by a forced teleport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spawn {
    pub position: Vector3,
    pub rotation: Quaternion,
}

const FALLBACK_SPAWN: Spawn = Spawn {
    position: Vector3 {
        x: 2.0,
        y: 1.0,
        z: 0.0,
    },
    rotation: IDENTITY_QUATERNION,
};

impl MapData {
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            respawn_points: Vec::new(),
            item_respawn_points: Vec::new(),
        }
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Loads the map, falling back to an empty one so the server still runs.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(map) => {
                info!(
                    "Map data loaded for {} ({} respawn points, {} item points)",
                    map.name,
                    map.respawn_points.len(),
                    map.item_respawn_points.len()
                );
                map
            }
            Err(e) => {
                error!("Failed to load map {}: {}", path.display(), e);
                Self::empty("default_map")
            }
        }
    }

    /// Picks a random respawn point, or the fallback spawn when the map has none.
    pub fn random_spawn<R: Rng>(&self, rng: &mut R) -> Spawn {
        if self.respawn_points.is_empty() {
            return FALLBACK_SPAWN;
        }
        let point = &self.respawn_points[rng.gen_range(0..self.respawn_points.len())];
        Spawn {
            position: point.position,
            rotation: point.quaternion.to_quaternion(),
        }
    }
}
