//! Rating-window matchmaking queue
//!
//! Pairing is event-driven: every enqueue searches the queue for the closest
//! rating. A pair is accepted when the gap fits the window of the longer
//! waiter, and that window widens with time so off-curve ratings are not
//! starved. `sweep` re-runs pairing for entries that were left waiting.

use crate::config::MatchmakingConfig;
use crate::error::MatchmakingError;
use crate::hub::ConnectionId;
use std::sync::{Mutex, PoisonError};
use surge_core::{PlayerId, Timestamp};

#[derive(Clone, Debug, PartialEq)]
pub struct MatchmakingEntry {
    pub player: PlayerId,
    pub rating: i32,
    pub connection: ConnectionId,
    pub enqueued_at: Timestamp,
}

/// Two dequeued entries; the longer waiter plays white
#[derive(Clone, Debug, PartialEq)]
pub struct Pairing {
    pub white: MatchmakingEntry,
    pub black: MatchmakingEntry,
}

impl Pairing {
    fn new(a: MatchmakingEntry, b: MatchmakingEntry) -> Self {
        if b.enqueued_at < a.enqueued_at {
            Self { white: b, black: a }
        } else {
            Self { white: a, black: b }
        }
    }
}

pub struct Matchmaker {
    config: MatchmakingConfig,
    queue: Mutex<Vec<MatchmakingEntry>>,
}

impl Matchmaker {
    pub fn new(config: MatchmakingConfig) -> Self {
        Self {
            config,
            queue: Mutex::new(Vec::new()),
        }
    }

    fn acceptable(&self, a: &MatchmakingEntry, b: &MatchmakingEntry, now: Timestamp) -> bool {
        let longest = a.enqueued_at.min(b.enqueued_at);
        let gap = a.rating.abs_diff(b.rating) as f64;
        gap <= self.config.window(now.millis_since(longest))
    }

    /// Closest-rated entry to `entry`, ties going to the longer waiter
    fn closest(queue: &[MatchmakingEntry], entry: &MatchmakingEntry) -> Option<usize> {
        queue
            .iter()
            .enumerate()
            .filter(|(_, other)| other.player != entry.player)
            .min_by_key(|(_, other)| (other.rating.abs_diff(entry.rating), other.enqueued_at))
            .map(|(i, _)| i)
    }

    /// Queue a player, pairing immediately if a partner is within the window
    pub fn enqueue(
        &self,
        entry: MatchmakingEntry,
        now: Timestamp,
    ) -> Result<Option<Pairing>, MatchmakingError> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.iter().any(|e| e.player == entry.player) {
            return Err(MatchmakingError::AlreadyInQueue);
        }

        if let Some(i) = Self::closest(&queue, &entry) {
            if self.acceptable(&queue[i], &entry, now) {
                let partner = queue.remove(i);
                return Ok(Some(Pairing::new(partner, entry)));
            }
        }

        queue.push(entry);
        Ok(None)
    }

    /// Put a dequeued entry back, keeping its original wait time
    pub fn requeue(&self, entry: MatchmakingEntry) {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.iter().all(|e| e.player != entry.player) {
            queue.push(entry);
        }
    }

    pub fn cancel(&self, player: &PlayerId) -> Result<MatchmakingEntry, MatchmakingError> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let index = queue
            .iter()
            .position(|e| &e.player == player)
            .ok_or(MatchmakingError::NotInQueue)?;
        Ok(queue.remove(index))
    }

    /// Drop the entry owned by a closed connection, if any
    pub fn cancel_connection(&self, connection: ConnectionId) -> Option<MatchmakingEntry> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let index = queue.iter().position(|e| e.connection == connection)?;
        Some(queue.remove(index))
    }

    /// Pair whatever the widened windows now allow, longest waiters first
    pub fn sweep(&self, now: Timestamp) -> Vec<Pairing> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.sort_by_key(|e| e.enqueued_at);

        let mut pairings = Vec::new();
        let mut i = 0;
        while i < queue.len() {
            let (head, rest) = queue.split_at(i + 1);
            let entry = &head[i];
            let found = Self::closest(rest, entry)
                .filter(|&j| self.acceptable(entry, &rest[j], now))
                .map(|j| i + 1 + j);
            match found {
                Some(j) => {
                    let partner = queue.remove(j);
                    let entry = queue.remove(i);
                    pairings.push(Pairing::new(entry, partner));
                }
                None => i += 1,
            }
        }
        pairings
    }

    pub fn contains(&self, player: &PlayerId) -> bool {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|e| &e.player == player)
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
