//! Bookkeeping for open WebSocket connections
//!
//! This module tracks the transport side of every client:
//! - Connection ids, assigned in accept order and never reused
//! - The outbound queue feeding each socket's writer task
//! - Peer address and connect time for logging
//!
//! Connections are independent of player sessions. A connection closing only
//! removes its entry here; the player it carried stays in the game until the
//! session goes stale.

use crate::gateway::ConnectionId;
use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// An accepted socket and the queue its writer task drains.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    pub sender: mpsc::UnboundedSender<Message>,
}

impl Connection {
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
        }
    }

    /// Queues a frame for the writer task. Fails once the socket is gone.
    pub fn send(&self, message: Message) -> bool {
        self.sender.send(message).is_ok()
    }
}

/// All open connections, shared between the accept loop and the sender task.
#[derive(Debug)]
pub struct ConnectionManager {
    connections: HashMap<ConnectionId, Connection>,
    next_id: ConnectionId,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
            next_id: 1,
        }
    }

    /// Registers a new connection and returns its id.
    pub fn add(&mut self, addr: SocketAddr, sender: mpsc::UnboundedSender<Message>) -> ConnectionId {
        let id = self.next_id;
        self.next_id += 1;

        info!("Connection {} opened from {}", id, addr);
        self.connections.insert(id, Connection::new(id, addr, sender));
        id
    }

    /// Returns true if the connection was still registered.
    pub fn remove(&mut self, id: ConnectionId) -> bool {
        if let Some(connection) = self.connections.remove(&id) {
            info!(
                "Connection {} from {} closed after {:.1}s",
                id,
                connection.addr,
                connection.connected_at.elapsed().as_secs_f64()
            );
            true
        } else {
            false
        }
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Outbound queues of every open connection, for broadcasting.
    pub fn senders(&self) -> Vec<(ConnectionId, mpsc::UnboundedSender<Message>)> {
        self.connections
            .iter()
            .map(|(id, connection)| (*id, connection.sender.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    #[test]
    fn test_ids_are_sequential_and_not_reused() {
        let mut manager = ConnectionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let first = manager.add(test_addr(), tx.clone());
        let second = manager.add(test_addr(), tx.clone());
        assert_eq!((first, second), (1, 2));

        assert!(manager.remove(first));
        assert!(!manager.remove(first));
        assert_eq!(manager.add(test_addr(), tx), 3);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_send_reaches_queue() {
        let mut manager = ConnectionManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = manager.add(test_addr(), tx);

        assert!(manager
            .get(id)
            .unwrap()
            .send(Message::Text("hello".to_string())));
        assert_eq!(rx.try_recv().unwrap(), Message::Text("hello".to_string()));
    }

    #[test]
    fn test_send_fails_after_writer_is_gone() {
        let mut manager = ConnectionManager::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let id = manager.add(test_addr(), tx);
        drop(rx);

        assert!(!manager.get(id).unwrap().send(Message::Text("late".to_string())));
    }

    #[test]
    fn test_senders_lists_every_connection() {
        let mut manager = ConnectionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        manager.add(test_addr(), tx.clone());
        manager.add(test_addr(), tx);

        let mut ids: Vec<_> = manager.senders().into_iter().map(|(id, _)| id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
        assert!(!manager.is_empty());
    }
}
