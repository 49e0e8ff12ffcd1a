//! Game rules and startup files
//!
//! `GameConfig` carries every tunable the simulation reads. Defaults match the
//! deployed server; `main` overrides a subset from command-line flags. The game
//! version is read once from a JSON file at startup and never written back.

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GameConfig {
    pub server_name: String,
    /// Exact string every client must report in `gameVersion`.
    pub game_version: String,
    pub tick_rate: u32,
    pub cleanup_interval: Duration,
    /// Longest gap between two snapshot broadcasts when nothing changed.
    pub heartbeat_interval: f64,
    /// Sessions without a `playerData` update for this long are evicted.
    pub kick_timeout: f64,
    pub max_players: usize,
    pub max_health: f64,
    /// Health restored per second once regeneration kicks in.
    pub regen_rate: f64,
    /// Seconds without damage before regeneration starts.
    pub regen_delay: f64,
    pub base_inventory: Vec<i64>,
    pub fall_threshold: f64,
    pub pickup_radius: f64,
    pub desync_tolerance: f64,
    pub invalid_warning_interval: f64,
    pub max_world_items: usize,
    /// Minimum distance between a new item and any live item.
    pub item_spacing: f64,
    pub item_floor: f64,
    /// Item lifetime in seconds, 0 keeps items forever.
    pub item_despawn_time: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            server_name: "my-server".to_string(),
            game_version: String::new(),
            tick_rate: 15,
            cleanup_interval: Duration::from_millis(500),
            heartbeat_interval: 5.0,
            kick_timeout: 5.0,
            max_players: 20,
            max_health: 100.0,
            regen_rate: 3.0,
            regen_delay: 5.0,
            base_inventory: vec![1],
            fall_threshold: -150.0,
            pickup_radius: 0.5,
            desync_tolerance: 1.0,
            invalid_warning_interval: 2.0,
            max_world_items: 14,
            item_spacing: 1.0,
            item_floor: -5.0,
            item_despawn_time: 300.0,
        }
    }
}

const MIN_TICK_DURATION: Duration = Duration::from_millis(1);

impl GameConfig {
    /// Period of the simulation tick, never shorter than a millisecond.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64).max(MIN_TICK_DURATION)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VersionValue {
    Text(String),
    Number(serde_json::Number),
}

#[derive(Debug, Deserialize)]
struct VersionFile {
    version: Option<VersionValue>,
}

/// Parses the contents of a `gameVersion.json` file.
///
/// Numeric versions are accepted and stringified, an absent or empty version
/// is an error since no client could ever match it.
pub fn parse_game_version(contents: &str) -> Result<String, ConfigError> {
    let file: VersionFile = serde_json::from_str(contents)?;
    let version = match file.version {
        Some(VersionValue::Text(text)) => text,
        Some(VersionValue::Number(number)) => number.to_string(),
        None => return Err(ConfigError::MissingVersion),
    };

    if version.is_empty() {
        return Err(ConfigError::MissingVersion);
    }
    Ok(version)
}

pub fn load_game_version(path: &Path) -> Result<String, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_game_version(&contents)
}

/// Parses a comma-separated list of item types, e.g. `"1,2"`.
pub fn parse_inventory(list: &str) -> Result<Vec<i64>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<i64>()
                .map_err(|_| ConfigError::InvalidInventory(entry.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GameConfig::default();
        assert_eq!(config.tick_rate, 15);
        assert_eq!(config.cleanup_interval, Duration::from_millis(500));
        assert_eq!(config.kick_timeout, 5.0);
        assert_eq!(config.heartbeat_interval, 5.0);
        assert_eq!(config.base_inventory, vec![1]);
        assert_eq!(config.max_health, 100.0);
    }

    #[test]
    fn test_tick_duration() {
        let config = GameConfig::default();
        assert_eq!(config.tick_duration().as_millis(), 66);

        let zero = GameConfig {
            tick_rate: 0,
            ..GameConfig::default()
        };
        assert_eq!(zero.tick_duration(), Duration::from_secs(1));

        let huge = GameConfig {
            tick_rate: u32::MAX,
            ..GameConfig::default()
        };
        assert_eq!(huge.tick_duration(), Duration::from_millis(1));
    }

    #[test]
    fn test_parse_string_version() {
        let version = parse_game_version(r#"{"version": "v1.7.3"}"#).unwrap();
        assert_eq!(version, "v1.7.3");
    }

    #[test]
    fn test_parse_numeric_version() {
        let version = parse_game_version(r#"{"version": 42}"#).unwrap();
        assert_eq!(version, "42");
    }

    #[test]
    fn test_missing_version_is_error() {
        assert!(matches!(
            parse_game_version("{}"),
            Err(ConfigError::MissingVersion)
        ));
        assert!(matches!(
            parse_game_version(r#"{"version": ""}"#),
            Err(ConfigError::MissingVersion)
        ));
        assert!(matches!(
            parse_game_version("not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_game_version(Path::new("/nonexistent/gameVersion.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_parse_inventory() {
        assert_eq!(parse_inventory("1").unwrap(), vec![1]);
        assert_eq!(parse_inventory("1, 2,3").unwrap(), vec![1, 2, 3]);
        assert!(parse_inventory("").unwrap().is_empty());
        assert!(matches!(
            parse_inventory("1,banana"),
            Err(ConfigError::InvalidInventory(entry)) if entry == "banana"
        ));
    }
}
