//! Authoritative game state and the operations that drive it
//!
//! `Game` owns every registry and is owned in turn by exactly one task, the
//! server main loop. Inbound frames, simulation ticks and cleanup sweeps are
//! all methods on it, so mutations are serialized without a lock and the
//! effects of one operation are fully visible to the next. All outbound
//! traffic goes through the `Gateway` it was built with.

use crate::chat::{self, ChatOutcome};
use crate::combat::{self, DamageOutcome};
use crate::config::GameConfig;
use crate::gateway::{BroadcastGate, ConnectionId, Gateway};
use crate::items::WorldItemRegistry;
use crate::map::MapData;
use crate::session::{SessionRegistry, UpsertOutcome};
use crate::utils::item_name;
use crate::validation::{ClientEvent, ValidationError, Validator, PLAYER_DATA};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    ChatMessage, DamageRequest, PlayerData, ServerEvent, ServerInfo, Vector3, LATENCY_ACK,
};
use std::collections::HashMap;

pub const INVALID_DATA_WARNING: &str = "⚠️ Your client is sending invalid data. Try a hard refresh.";
pub const DESYNC_WARNING: &str = "⚠️ shot not registered (client out of sync)";
pub const SERVER_FULL_WARNING: &str = "⚠️ server is full";

pub struct Game<G: Gateway> {
    config: GameConfig,
    map: MapData,
    validator: Validator,
    sessions: SessionRegistry,
    items: WorldItemRegistry,
    player_gate: BroadcastGate,
    item_gate: BroadcastGate,
    rng: StdRng,
    last_tick: Option<f64>,
    /// Last time each connection was warned about bad input.
    last_warning: HashMap<ConnectionId, f64>,
    gateway: G,
}

impl<G: Gateway> Game<G> {
    pub fn new(config: GameConfig, map: MapData, gateway: G) -> Self {
        Self::with_rng(config, map, gateway, StdRng::from_entropy())
    }

    pub fn with_rng(config: GameConfig, map: MapData, gateway: G, rng: StdRng) -> Self {
        let validator = Validator::new(&config.game_version);
        let player_gate = BroadcastGate::new(config.heartbeat_interval);
        let item_gate = BroadcastGate::new(config.heartbeat_interval);

        Self {
            config,
            map,
            validator,
            sessions: SessionRegistry::new(),
            items: WorldItemRegistry::new(),
            player_gate,
            item_gate,
            rng,
            last_tick: None,
            last_warning: HashMap::new(),
            gateway,
        }
    }

    /// Validates and applies one inbound text frame.
    pub fn handle_frame(&mut self, conn: ConnectionId, text: &str, now: f64) {
        match self.validator.parse_frame(text) {
            Ok(event) => self.handle_event(conn, event, now),
            Err(e) => self.reject(conn, e, now),
        }
    }

    pub fn handle_event(&mut self, conn: ConnectionId, event: ClientEvent, now: f64) {
        match event {
            ClientEvent::PlayerData(player) => self.handle_player_data(conn, player, now),
            ClientEvent::ChatMsg(msg) => self.handle_chat(conn, msg, now),
            ClientEvent::LatencyTest => self
                .gateway
                .send(conn, ServerEvent::LatencyTest(LATENCY_ACK.to_string())),
            ClientEvent::ApplyDamage(request) => self.handle_damage(conn, request, now),
        }
    }

    fn reject(&mut self, conn: ConnectionId, error: ValidationError, now: f64) {
        match error.event() {
            Some(PLAYER_DATA) => {
                debug!("Invalid player data from connection {}: {}", conn, error);
                if self.warn_connection(conn, INVALID_DATA_WARNING, now) {
                    warn!("Invalid player data received from connection {}", conn);
                }
            }
            Some(_) => warn!("Dropped message from connection {}: {}", conn, error),
            None => debug!("Dropped frame from connection {}: {}", conn, error),
        }
    }

    /// Whispers `message` unless this connection was warned recently.
    fn warn_connection(&mut self, conn: ConnectionId, message: &str, now: f64) -> bool {
        if let Some(last) = self.last_warning.get(&conn) {
            if last + self.config.invalid_warning_interval >= now {
                return false;
            }
        }
        self.last_warning.insert(conn, now);
        self.gateway.whisper(conn, message);
        true
    }

    fn handle_player_data(&mut self, conn: ConnectionId, player: PlayerData, now: f64) {
        let id = player.id;
        let map = &self.map;
        let rng = &mut self.rng;
        let outcome = self
            .sessions
            .upsert(player, &self.config, now, || map.random_spawn(rng));

        match outcome {
            UpsertOutcome::Updated => {}
            UpsertOutcome::AwaitingAcknowledgement => {
                debug!("Dropped update for {} until forced teleport is acknowledged", id);
            }
            UpsertOutcome::Joined { name } => {
                self.gateway.announce(format!("{} joined", name));
                // Newcomers need the item list without waiting for a heartbeat.
                self.items.mark_dirty();
                self.broadcast_server_info();
            }
            UpsertOutcome::Full => {
                if self.warn_connection(conn, SERVER_FULL_WARNING, now) {
                    warn!(
                        "Refused player {} on connection {}: server is full ({})",
                        id, conn, self.config.max_players
                    );
                }
            }
        }
    }

    fn handle_chat(&mut self, conn: ConnectionId, msg: ChatMessage, now: f64) {
        match chat::process(msg, &mut self.sessions, self.validator.game_version()) {
            ChatOutcome::Relay(msg) => self.gateway.broadcast(ServerEvent::ChatMsg(msg)),
            ChatOutcome::Command(reply) => {
                for line in reply.whispers {
                    self.gateway.whisper(conn, line);
                }
                if let Some(line) = reply.announcement {
                    self.gateway.announce(line);
                }
                if reply.run_cleanup {
                    self.cleanup_sweep(now);
                }
            }
            ChatOutcome::Rejected => {}
        }
    }

    fn handle_damage(&mut self, conn: ConnectionId, request: DamageRequest, now: f64) {
        match combat::resolve(&request, &mut self.sessions, &self.config, now) {
            DamageOutcome::Applied { killed: None } => {}
            DamageOutcome::Applied {
                killed: Some((killer, victim)),
            } => {
                self.gateway.announce(format!("{} killed {}", killer, victim));
                self.cleanup_sweep(now);
            }
            DamageOutcome::UnknownPlayer => {
                debug!(
                    "Dropped damage {} -> {}: unknown player",
                    request.local_player.id, request.target_player.id
                );
            }
            DamageOutcome::Desync { .. } => self.gateway.whisper(conn, DESYNC_WARNING),
            DamageOutcome::NegativeDamage => {
                warn!(
                    "Dropped negative damage {} from connection {}",
                    request.damage, conn
                );
            }
        }
    }

    /// Regeneration, item spawns and pickups, then the gated broadcasts.
    pub fn simulation_tick(&mut self, now: f64) {
        let elapsed = self.last_tick.map_or(0.0, |last| (now - last).max(0.0));
        self.last_tick = Some(now);

        self.sessions
            .regenerate_health(&self.config, now, elapsed);
        self.items.roll_spawns(
            &mut self.rng,
            &self.map.item_respawn_points,
            &self.config,
            now,
        );

        for pickup in self.items.sweep_pickups(&mut self.sessions, &self.config) {
            self.gateway.announce(format!(
                "{} picked up {}!",
                pickup.player_name,
                item_name(pickup.item_type)
            ));
        }

        self.broadcast_snapshots(now);
    }

    fn broadcast_snapshots(&mut self, now: f64) {
        if self.player_gate.should_emit(self.sessions.is_dirty(), now) {
            self.gateway
                .broadcast(ServerEvent::RemotePlayerData(self.sessions.snapshot()));
            self.sessions.clear_dirty();
            self.player_gate.mark_sent(now);
        }

        if self.item_gate.should_emit(self.items.is_dirty(), now) {
            self.gateway
                .broadcast(ServerEvent::WorldItemData(self.items.snapshot()));
            self.items.clear_dirty();
            self.item_gate.mark_sent(now);
        }
    }

    /// Falls, respawns and evictions, then stale item removal.
    pub fn cleanup_sweep(&mut self, now: f64) {
        for id in self.sessions.ids() {
            let fell = match self.sessions.get(id) {
                Some(player) => player.position.y < self.config.fall_threshold,
                None => continue,
            };

            if fell {
                if let Some(player) = self.sessions.get_mut(id) {
                    player.health = 0.0;
                    player.velocity = Vector3::ZERO;
                    info!("{}({}) fell off", player.name, player.id);
                    let line = format!("{} fell off :'(", player.name);
                    self.gateway.announce(line);
                }
            }

            if self.sessions.get(id).is_some_and(PlayerData::is_dead) {
                let spawn = self.map.random_spawn(&mut self.rng);
                self.sessions.respawn(id, spawn, &self.config);
                debug!("Respawned {} at {:?}", id, spawn.position);
            }
        }

        let stale = self.sessions.stale_ids(&self.config, now);
        let evicted = !stale.is_empty();
        for id in stale {
            if let Some(player) = self.sessions.evict(id) {
                self.gateway.announce(format!("{} left", player.name));
            }
        }
        if evicted {
            self.broadcast_server_info();
        }

        let removed = self.items.cleanup(&self.config, now);
        if removed > 0 {
            debug!("Removed {} stale world items", removed);
        }
    }

    /// Forgets per-connection bookkeeping. The player session stays until it
    /// goes stale.
    pub fn connection_closed(&mut self, conn: ConnectionId) {
        self.last_warning.remove(&conn);
    }

    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            name: self.config.server_name.clone(),
            max_players: self.config.max_players,
            current_players: self.sessions.len(),
            map_name: self.map.name.clone(),
            tick_rate: self.config.tick_rate,
            version: self.validator.game_version().to_string(),
        }
    }

    fn broadcast_server_info(&mut self) {
        let info = self.server_info();
        self.gateway.broadcast(ServerEvent::ServerInfo(info));
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn map(&self) -> &MapData {
        &self.map
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut SessionRegistry {
        &mut self.sessions
    }

    pub fn items(&self) -> &WorldItemRegistry {
        &self.items
    }

    /// Items plus the RNG used to draw item ids.
    pub fn items_mut(&mut self) -> (&mut WorldItemRegistry, &mut StdRng) {
        (&mut self.items, &mut self.rng)
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }
}
