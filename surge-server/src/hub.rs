//! Connection hub: outbound channels and per-game subscriptions
//!
//! Each connection owns an unbounded channel drained by its transport task.
//! A game is a topic; players and spectators subscribe to it and every
//! publish fans out to all current subscribers.

use crate::protocol::ServerEvent;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use surge_core::GameId;
use tokio::sync::mpsc;

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

/// Server-assigned connection handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Default)]
pub struct Hub {
    connections: RwLock<FxHashMap<ConnectionId, EventSender>>,
    topics: RwLock<FxHashMap<GameId, FxHashSet<ConnectionId>>>,
    next_id: AtomicU64,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tx: EventSender) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        id
    }

    /// Forget a connection and all its subscriptions
    pub fn unregister(&self, id: ConnectionId) {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        for subscribers in topics.values_mut() {
            subscribers.remove(&id);
        }
    }

    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    /// Send to one connection; a closed channel is silently dropped
    pub fn send(&self, id: ConnectionId, event: ServerEvent) {
        let connections = self.connections.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = connections.get(&id) {
            if tx.send(event).is_err() {
                tracing::debug!(connection = %id, "send to closed connection");
            }
        }
    }

    pub fn subscribe(&self, game: GameId, id: ConnectionId) {
        self.topics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(game)
            .or_default()
            .insert(id);
    }

    pub fn unsubscribe(&self, game: GameId, id: ConnectionId) {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(subscribers) = topics.get_mut(&game) {
            subscribers.remove(&id);
        }
    }

    pub fn subscribers(&self, game: GameId) -> Vec<ConnectionId> {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<_> = topics
            .get(&game)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Fan an event out to every subscriber of a game
    pub fn publish(&self, game: GameId, event: ServerEvent) {
        for id in self.subscribers(game) {
            self.send(id, event.clone());
        }
    }

    pub fn drop_topic(&self, game: GameId) {
        self.topics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&game);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_subscribers_only() {
        let hub = Hub::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let a = hub.register(tx_a);
        let b = hub.register(tx_b);
        let game = GameId::new();

        hub.subscribe(game, a);
        hub.publish(game, ServerEvent::MatchmakingCancelled);

        assert_eq!(rx_a.try_recv().unwrap(), ServerEvent::MatchmakingCancelled);
        assert!(rx_b.try_recv().is_err());
        assert_ne!(a, b);
    }

    #[test]
    fn test_unregister_clears_subscriptions() {
        let hub = Hub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = hub.register(tx);
        let game = GameId::new();
        hub.subscribe(game, id);
        hub.unregister(id);
        assert!(hub.subscribers(game).is_empty());
        assert!(!hub.is_connected(id));
    }

    #[test]
    fn test_send_to_closed_channel_is_harmless() {
        let hub = Hub::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let id = hub.register(tx);
        drop(rx);
        hub.send(id, ServerEvent::MatchmakingCancelled);
    }
}
