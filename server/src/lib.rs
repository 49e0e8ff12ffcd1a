//! # Arena Server Library
//!
//! This library provides the authoritative game-state server for a browser
//! arena shooter. Clients simulate their own movement and report it; the
//! server validates every report, owns the values clients must not decide
//! (health, inventory, damage timing, spawns) and broadcasts the canonical
//! state back to everyone.
//!
//! ## Core Responsibilities
//!
//! ### Session Authority
//! Each player is a session keyed by a client-chosen id. Client updates
//! replace the session wholesale, except for server-owned fields which are
//! always carried over from the existing record. Spawns and respawns are
//! forced teleports the client has to acknowledge before its position
//! updates are accepted again.
//!
//! ### Combat
//! Hits are reported by the shooter together with both players' positions as
//! the shooter saw them. A hit only lands when both positions agree with the
//! server's within one unit. Kills are announced and respawned immediately.
//!
//! ### Chat and Commands
//! Plain chat is relayed to everyone. Slash commands are answered privately,
//! and `/kill` changes server state.
//!
//! ### World Items
//! Map item points spawn pickups at random. Players walking over a banana
//! collect it into their inventory.
//!
//! ## Architecture Design
//!
//! ### Single-Owner Event Loop
//! `network::Server::run` owns the `game::Game` and is the only task that
//! mutates it. Connection tasks forward raw text frames over a channel, and
//! two intervals drive the simulation tick and the cleanup sweep. Every
//! operation therefore sees the complete effects of the previous one without
//! any lock around game state.
//!
//! ### WebSocket Transport
//! One JSON text frame per event, `{"event": name, "data": payload}`. The
//! game never writes to sockets directly; it hands events to a
//! `gateway::Gateway` which the network layer drains on a separate task.
//!
//! ## Module Organization
//!
//! - `config`: game rules and startup file parsing
//! - `map`: respawn and item points loaded at startup
//! - `validation`: frame decoding and per-event shape checks
//! - `session`: the player session registry and forced-teleport handshake
//! - `combat`: damage resolution with the desync check
//! - `chat`: chat relay and the slash command table
//! - `items`: world item spawning, pickups and cleanup
//! - `gateway`: outbound delivery and the dirty/heartbeat broadcast gate
//! - `game`: the state machine tying all of the above together
//! - `connection`: open WebSocket connections
//! - `network`: accept loop, sender task and the main loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::GameConfig;
//! use server::map::MapData;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GameConfig {
//!         game_version: "v1.0.0".to_string(),
//!         ..GameConfig::default()
//!     };
//!     let map = MapData::load_or_default("public/maps/deathmatch_1/map.json".as_ref());
//!
//!     let mut server = Server::new("0.0.0.0:3000", config, map).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod combat;
pub mod config;
pub mod connection;
pub mod error;
pub mod game;
pub mod gateway;
pub mod items;
pub mod map;
pub mod network;
pub mod session;
pub mod utils;
pub mod validation;
