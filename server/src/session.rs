//! Authoritative registry of player sessions
//!
//! This module owns the canonical state of every connected player:
//! - Join, update and eviction of sessions keyed by the client-chosen id
//! - The forced-teleport handshake that blocks stale client positions
//! - Server-owned fields (`health`, `inventory`, `lastDamageTime`) that the
//!   client may send but never sets
//! - Health regeneration and respawn
//!
//! Sessions are kept in join order. Sweeps that resolve races between
//! players (item pickups) walk the registry in that order, so the earliest
//! joiner wins a tie.

use crate::config::GameConfig;
use crate::map::Spawn;
use crate::utils::placeholder_name;
use log::info;
use shared::{PlayerData, Vector3};

/// Result of submitting a validated `playerData` message.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    /// An existing session took the new state.
    Updated,
    /// A new session was created with the given (possibly generated) name.
    Joined { name: String },
    /// The session is waiting for a forced teleport to be acknowledged.
    AwaitingAcknowledgement,
    /// The registry is at capacity and the id is unknown.
    Full,
}

/// Set of live sessions plus the dirty flag read by the broadcast step.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Vec<PlayerData>,
    dirty: bool,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a validated client update, joining the player if the id is new.
    ///
    /// `spawn` is only consulted for a join and decides where the new player
    /// is force-teleported to.
    pub fn upsert(
        &mut self,
        mut candidate: PlayerData,
        config: &GameConfig,
        now: f64,
        spawn: impl FnOnce() -> Spawn,
    ) -> UpsertOutcome {
        let existing = self.sessions.iter().position(|p| p.id == candidate.id);

        if let Some(index) = existing {
            if self.sessions[index].forced && !candidate.forced_acknowledged {
                return UpsertOutcome::AwaitingAcknowledgement;
            }
        } else if self.sessions.len() >= config.max_players {
            return UpsertOutcome::Full;
        }

        if candidate.forced_acknowledged && candidate.forced {
            candidate.forced = false;
            info!("{}({}) acknowledged force", candidate.name, candidate.id);
        }

        candidate.update_timestamp = Some(now);
        if candidate.name.is_empty() {
            candidate.name = placeholder_name(candidate.id);
        }
        self.dirty = true;

        match existing {
            Some(index) => {
                let current = &mut self.sessions[index];
                candidate.health = current.health;
                candidate.inventory = std::mem::take(&mut current.inventory);
                candidate.last_damage_time = current.last_damage_time;
                *current = candidate;
                UpsertOutcome::Updated
            }
            None => {
                let spawn = spawn();
                candidate.inventory = config.base_inventory.clone();
                candidate.health = config.max_health;
                candidate.last_damage_time = None;
                candidate.position = spawn.position;
                candidate.look_quaternion = spawn.rotation;
                candidate.forced = true;

                let name = candidate.name.clone();
                info!("{}({}) joined", name, candidate.id);
                self.sessions.push(candidate);
                UpsertOutcome::Joined { name }
            }
        }
    }

    /// Removes a session, returning it if it was present.
    pub fn evict(&mut self, id: i64) -> Option<PlayerData> {
        let index = self.sessions.iter().position(|p| p.id == id)?;
        let player = self.sessions.remove(index);
        info!("{}({}) left", player.name, player.id);
        self.dirty = true;
        Some(player)
    }

    /// Restores a player to full health at `spawn` and forces the client to
    /// acknowledge the teleport.
    pub fn respawn(&mut self, id: i64, spawn: Spawn, config: &GameConfig) -> bool {
        let Some(player) = self.get_mut(id) else {
            return false;
        };
        player.position = spawn.position;
        player.look_quaternion = spawn.rotation;
        player.health = config.max_health;
        player.gravity = 0.0;
        player.velocity = Vector3::ZERO;
        player.forced = true;
        self.dirty = true;
        true
    }

    /// Regenerates health for players that have not been hurt recently.
    ///
    /// `elapsed` is the time since the previous simulation tick.
    pub fn regenerate_health(&mut self, config: &GameConfig, now: f64, elapsed: f64) {
        for player in &mut self.sessions {
            let last_damage = player.last_damage_time.unwrap_or(0.0);
            if player.health < config.max_health && last_damage + config.regen_delay < now {
                player.health =
                    (player.health + config.regen_rate * elapsed).min(config.max_health);
                self.dirty = true;
            }
        }
    }

    /// Ids of sessions whose last update is older than the kick timeout.
    pub fn stale_ids(&self, config: &GameConfig, now: f64) -> Vec<i64> {
        self.sessions
            .iter()
            .filter(|p| p.update_timestamp.unwrap_or(0.0) + config.kick_timeout < now)
            .map(|p| p.id)
            .collect()
    }

    pub fn get(&self, id: i64) -> Option<&PlayerData> {
        self.sessions.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: i64) -> Option<&mut PlayerData> {
        self.dirty = true;
        self.sessions.iter_mut().find(|p| p.id == id)
    }

    pub fn ids(&self) -> Vec<i64> {
        self.sessions.iter().map(|p| p.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerData> {
        self.sessions.iter()
    }

    /// Callers that change a session through this must `mark_dirty`.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PlayerData> {
        self.sessions.iter_mut()
    }

    /// Full snapshot for `remotePlayerData`.
    pub fn snapshot(&self) -> Vec<PlayerData> {
        self.sessions.clone()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Only the broadcast step clears the flag.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
