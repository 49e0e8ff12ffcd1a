//! Server network layer handling WebSocket connections and game loop coordination

use crate::config::GameConfig;
use crate::connection::ConnectionManager;
use crate::error::ServerError;
use crate::game::Game;
use crate::gateway::{ChannelGateway, ConnectionId};
use crate::map::MapData;
use crate::utils::now_secs;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::ServerEvent;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Messages sent from connection tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    EventReceived { conn: ConnectionId, text: String },
    Disconnected { conn: ConnectionId },
}

/// Messages sent from game loop to the network sender task
#[derive(Debug)]
pub enum GameMessage {
    SendEvent {
        conn: ConnectionId,
        event: ServerEvent,
    },
    BroadcastEvent {
        event: ServerEvent,
    },
}

/// Main server coordinating networking and game simulation
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    connections: Arc<RwLock<ConnectionManager>>,
    game: Game<ChannelGateway>,
    tick_duration: Duration,
    cleanup_interval: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_rx: Option<mpsc::UnboundedReceiver<GameMessage>>,
}

impl Server {
    pub async fn new(addr: &str, config: GameConfig, map: MapData) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        let tick_duration = config.tick_duration();
        let cleanup_interval = config.cleanup_interval;
        let game = Game::new(config, map, ChannelGateway::new(game_tx));

        Ok(Server {
            listener: Some(listener),
            local_addr,
            connections: Arc::new(RwLock::new(ConnectionManager::new())),
            game,
            tick_duration,
            cleanup_interval,
            server_tx,
            server_rx,
            game_rx: Some(game_rx),
        })
    }

    /// Address actually bound, useful when binding to port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawns task that accepts sockets and hands each to its own connection task
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let connections = Arc::clone(&self.connections);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        Self::handle_connection(
                            stream,
                            addr,
                            Arc::clone(&connections),
                            server_tx.clone(),
                        );
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Runs the WebSocket handshake, then forwards text frames to the main loop
    /// until the socket closes.
    fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        connections: Arc<RwLock<ConnectionManager>>,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
    ) {
        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::unbounded_channel::<Message>();
            let conn = connections.write().await.add(addr, msg_tx);

            // Ends once the connection is removed and its queue closes
            tokio::spawn(async move {
                while let Some(message) = msg_rx.recv().await {
                    if let Err(e) = ws_sender.send(message).await {
                        debug!("Write to connection {} failed: {}", conn, e);
                        break;
                    }
                }
            });

            while let Some(frame) = ws_receiver.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if let Err(e) = server_tx.send(ServerMessage::EventReceived { conn, text }) {
                            error!("Failed to send event to main loop: {}", e);
                            break;
                        }
                    }
                    Ok(Message::Binary(_)) => {
                        debug!("Ignoring binary frame from connection {}", conn);
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!("Connection {} read error: {}", conn, e);
                        break;
                    }
                }
            }

            connections.write().await.remove(conn);
            if let Err(e) = server_tx.send(ServerMessage::Disconnected { conn }) {
                error!("Failed to report disconnect of {}: {}", conn, e);
            }
        });
    }

    /// Spawns task that processes the outgoing event queue
    fn spawn_network_sender(&mut self) {
        let Some(mut game_rx) = self.game_rx.take() else {
            return;
        };
        let connections = Arc::clone(&self.connections);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendEvent { conn, event } => {
                        let Some(text) = encode(&event) else {
                            continue;
                        };
                        let connections = connections.read().await;
                        match connections.get(conn) {
                            Some(connection) => {
                                if !connection.send(Message::Text(text)) {
                                    debug!("Connection {} closed before {}", conn, event.name());
                                }
                            }
                            None => debug!("Dropped {} for closed connection {}", event.name(), conn),
                        }
                    }
                    GameMessage::BroadcastEvent { event } => {
                        let Some(text) = encode(&event) else {
                            continue;
                        };
                        let senders = {
                            let connections = connections.read().await;
                            connections.senders()
                        };

                        for (conn, sender) in senders {
                            if sender.send(Message::Text(text.clone())).is_err() {
                                debug!("Connection {} closed before {}", conn, event.name());
                            }
                        }
                    }
                }
            }
        });
    }

    pub fn game(&self) -> &Game<ChannelGateway> {
        &self.game
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), ServerError> {
        self.spawn_acceptor();
        self.spawn_network_sender();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cleanup_interval = interval(self.cleanup_interval);
        cleanup_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Server started: {} at {} Hz on map {}",
            self.game.config().server_name,
            self.game.config().tick_rate,
            self.game.map().name
        );

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::EventReceived { conn, text }) => {
                            self.game.handle_frame(conn, &text, now_secs());
                        }
                        Some(ServerMessage::Disconnected { conn }) => {
                            self.game.connection_closed(conn);
                        }
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.game.simulation_tick(now_secs());
                },

                _ = cleanup_interval.tick() => {
                    self.game.cleanup_sweep(now_secs());
                },
            }
        }

        Ok(())
    }
}

fn encode(event: &ServerEvent) -> Option<String> {
    match event.to_json() {
        Ok(text) => Some(text),
        Err(e) => {
            error!("Failed to serialize {}: {}", event.name(), e);
            None
        }
    }
}
