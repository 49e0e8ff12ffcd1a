//! Outbound event delivery
//!
//! The game never touches sockets. It hands every outbound event to a
//! `Gateway`: `ChannelGateway` queues them for the network sender task, and
//! `Outbox` keeps them in memory so tests can inspect exactly what a client
//! would have received.

use crate::network::GameMessage;
use log::error;
use shared::{ChatMessage, ServerEvent};
use tokio::sync::mpsc;

/// Server-assigned id of one transport connection.
pub type ConnectionId = u64;

pub trait Gateway {
    /// Delivers an event to a single connection.
    fn send(&mut self, conn: ConnectionId, event: ServerEvent);

    /// Delivers an event to every open connection.
    fn broadcast(&mut self, event: ServerEvent);

    /// System chat line for one connection.
    fn whisper(&mut self, conn: ConnectionId, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.send(conn, ServerEvent::ChatMsg(ChatMessage::system(message)));
    }

    /// System chat line for everyone.
    fn announce(&mut self, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.broadcast(ServerEvent::ChatMsg(ChatMessage::system(message)));
    }
}

/// Queues events for the sender task spawned by `Server`.
pub struct ChannelGateway {
    game_tx: mpsc::UnboundedSender<GameMessage>,
}

impl ChannelGateway {
    pub fn new(game_tx: mpsc::UnboundedSender<GameMessage>) -> Self {
        Self { game_tx }
    }
}

impl Gateway for ChannelGateway {
    fn send(&mut self, conn: ConnectionId, event: ServerEvent) {
        if let Err(e) = self.game_tx.send(GameMessage::SendEvent { conn, event }) {
            error!("Failed to queue event for connection {}: {}", conn, e);
        }
    }

    fn broadcast(&mut self, event: ServerEvent) {
        if let Err(e) = self.game_tx.send(GameMessage::BroadcastEvent { event }) {
            error!("Failed to queue broadcast event: {}", e);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    To { conn: ConnectionId, event: ServerEvent },
    Broadcast(ServerEvent),
}

impl Outgoing {
    pub fn event(&self) -> &ServerEvent {
        match self {
            Outgoing::To { event, .. } | Outgoing::Broadcast(event) => event,
        }
    }
}

/// In-memory gateway recording every event in send order.
#[derive(Debug, Default)]
pub struct Outbox {
    pub sent: Vec<Outgoing>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.sent)
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }

    /// Events that reached `conn`, whether addressed to it or broadcast.
    pub fn received_by(&self, conn: ConnectionId) -> Vec<&ServerEvent> {
        self.sent
            .iter()
            .filter(|out| match out {
                Outgoing::To { conn: to, .. } => *to == conn,
                Outgoing::Broadcast(_) => true,
            })
            .map(Outgoing::event)
            .collect()
    }

    pub fn broadcasts(&self) -> Vec<&ServerEvent> {
        self.sent
            .iter()
            .filter_map(|out| match out {
                Outgoing::Broadcast(event) => Some(event),
                Outgoing::To { .. } => None,
            })
            .collect()
    }

    /// Text of every chat line addressed only to `conn`.
    pub fn whispers_to(&self, conn: ConnectionId) -> Vec<&str> {
        self.sent
            .iter()
            .filter_map(|out| match out {
                Outgoing::To {
                    conn: to,
                    event: ServerEvent::ChatMsg(msg),
                } if *to == conn => Some(msg.message.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Text of every broadcast chat line.
    pub fn announcements(&self) -> Vec<&str> {
        self.broadcasts()
            .into_iter()
            .filter_map(|event| match event {
                ServerEvent::ChatMsg(msg) => Some(msg.message.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Number of broadcast events with the given wire name.
    pub fn count_broadcasts(&self, name: &str) -> usize {
        self.broadcasts()
            .into_iter()
            .filter(|event| event.name() == name)
            .count()
    }
}

impl Gateway for Outbox {
    fn send(&mut self, conn: ConnectionId, event: ServerEvent) {
        self.sent.push(Outgoing::To { conn, event });
    }

    fn broadcast(&mut self, event: ServerEvent) {
        self.sent.push(Outgoing::Broadcast(event));
    }
}

/// Decides when a snapshot is worth broadcasting.
///
/// A snapshot goes out when its state changed since the last one, or when the
/// heartbeat interval elapsed so late joiners and lossy clients resync.
#[derive(Debug, Clone)]
pub struct BroadcastGate {
    heartbeat: f64,
    last_sent: Option<f64>,
}

impl BroadcastGate {
    pub fn new(heartbeat: f64) -> Self {
        Self {
            heartbeat,
            last_sent: None,
        }
    }

    pub fn should_emit(&self, dirty: bool, now: f64) -> bool {
        match self.last_sent {
            None => true,
            Some(last) => dirty || now - last >= self.heartbeat,
        }
    }

    pub fn mark_sent(&mut self, now: f64) {
        self.last_sent = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::LATENCY_ACK;

    #[test]
    fn test_outbox_routing() {
        let mut outbox = Outbox::new();
        outbox.whisper(1, "just for you");
        outbox.announce("everyone");
        outbox.send(2, ServerEvent::LatencyTest(LATENCY_ACK.to_string()));

        assert_eq!(outbox.whispers_to(1), vec!["just for you"]);
        assert!(outbox.whispers_to(2).is_empty());
        assert_eq!(outbox.announcements(), vec!["everyone"]);
        assert_eq!(outbox.received_by(1).len(), 2);
        assert_eq!(outbox.received_by(2).len(), 2);
        assert_eq!(outbox.count_broadcasts("chatMsg"), 1);

        assert_eq!(outbox.take().len(), 3);
        assert!(outbox.sent.is_empty());
    }

    #[test]
    fn test_whispers_are_system_messages() {
        let mut outbox = Outbox::new();
        outbox.whisper(3, "hi");
        match outbox.sent[0].event() {
            ServerEvent::ChatMsg(msg) => assert!(msg.is_system()),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_channel_gateway_queues_messages() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut gateway = ChannelGateway::new(tx);

        gateway.whisper(9, "queued");
        gateway.broadcast(ServerEvent::LatencyTest(LATENCY_ACK.to_string()));

        match tokio_test::block_on(rx.recv()).unwrap() {
            GameMessage::SendEvent { conn, .. } => assert_eq!(conn, 9),
            other => panic!("unexpected message {:?}", other),
        }
        assert!(matches!(
            tokio_test::block_on(rx.recv()).unwrap(),
            GameMessage::BroadcastEvent { .. }
        ));
    }

    #[test]
    fn test_channel_gateway_survives_closed_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut gateway = ChannelGateway::new(tx);
        gateway.announce("nobody is listening");
    }

    #[test]
    fn test_gate_first_emit_and_heartbeat() {
        let mut gate = BroadcastGate::new(5.0);
        assert!(gate.should_emit(false, 0.0));
        gate.mark_sent(0.0);

        assert!(!gate.should_emit(false, 4.9));
        assert!(gate.should_emit(true, 0.1));
        assert!(gate.should_emit(false, 5.0));

        gate.mark_sent(5.0);
        assert!(!gate.should_emit(false, 6.0));
        assert!(gate.should_emit(false, 10.0));
    }
}
