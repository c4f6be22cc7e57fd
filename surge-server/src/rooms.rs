//! Private rooms joined by a short shareable code
//!
//! A room is `AwaitingJoin` until a second player arrives, then `Filled`
//! and bound to a game. Filled rooms stay registered so late joiners get
//! `ROOM_FULL` instead of `ROOM_NOT_FOUND`; they are pruned once their game
//! is gone.

use crate::config::RoomConfig;
use crate::error::RoomError;
use crate::hub::ConnectionId;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rustc_hash::FxHashMap;
use std::sync::{Mutex, PoisonError};
use surge_core::{GameId, PlayerId, Timestamp};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoomStatus {
    AwaitingJoin,
    Filled,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Room {
    pub code: String,
    pub creator: PlayerId,
    pub creator_rating: i32,
    pub creator_connection: ConnectionId,
    pub created_at: Timestamp,
    pub status: RoomStatus,
    pub joiner: Option<PlayerId>,
    pub game_id: Option<GameId>,
}

struct Registry {
    rooms: FxHashMap<String, Room>,
    rng: ChaCha8Rng,
}

pub struct RoomRegistry {
    config: RoomConfig,
    inner: Mutex<Registry>,
}

impl RoomRegistry {
    pub fn new(config: RoomConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            config,
            inner: Mutex::new(Registry {
                rooms: FxHashMap::default(),
                rng,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn generate_code(rng: &mut ChaCha8Rng, length: usize) -> String {
        (0..length)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect()
    }

    /// Open a room and return its code
    pub fn create(
        &self,
        creator: PlayerId,
        creator_rating: i32,
        connection: ConnectionId,
        now: Timestamp,
    ) -> Result<String, RoomError> {
        let mut inner = self.lock();
        if inner
            .rooms
            .values()
            .any(|r| r.creator == creator && r.status == RoomStatus::AwaitingJoin)
        {
            return Err(RoomError::AlreadyHosting);
        }

        let Registry { rooms, rng } = &mut *inner;
        let code = (0..self.config.max_attempts)
            .map(|_| Self::generate_code(rng, self.config.code_length))
            .find(|code| !rooms.contains_key(code))
            .ok_or(RoomError::CodesExhausted(self.config.max_attempts))?;

        rooms.insert(
            code.clone(),
            Room {
                code: code.clone(),
                creator,
                creator_rating,
                creator_connection: connection,
                created_at: now,
                status: RoomStatus::AwaitingJoin,
                joiner: None,
                game_id: None,
            },
        );
        tracing::info!(%code, "room created");
        Ok(code)
    }

    fn is_expired(&self, room: &Room, now: Timestamp) -> bool {
        room.status == RoomStatus::AwaitingJoin
            && now.millis_since(room.created_at) >= self.config.ttl_ms
    }

    /// Claim the second seat. The caller creates the game and binds it.
    pub fn join(&self, code: &str, joiner: &PlayerId, now: Timestamp) -> Result<Room, RoomError> {
        let code = code.trim().to_ascii_uppercase();
        let mut inner = self.lock();
        let room = match inner.rooms.get(&code) {
            Some(room) if !self.is_expired(room, now) => room,
            _ => return Err(RoomError::NotFound),
        };
        if &room.creator == joiner {
            return Err(RoomError::OwnRoom);
        }
        if room.status == RoomStatus::Filled {
            return Err(RoomError::Full);
        }
        if inner
            .rooms
            .values()
            .any(|r| &r.creator == joiner && r.status == RoomStatus::AwaitingJoin)
        {
            return Err(RoomError::AlreadyHosting);
        }

        let room = inner.rooms.get_mut(&code).ok_or(RoomError::NotFound)?;
        room.status = RoomStatus::Filled;
        room.joiner = Some(joiner.clone());
        Ok(room.clone())
    }

    pub fn bind_game(&self, code: &str, game_id: GameId) {
        if let Some(room) = self.lock().rooms.get_mut(code) {
            room.game_id = Some(game_id);
        }
    }

    pub fn remove(&self, code: &str) -> Option<Room> {
        self.lock().rooms.remove(code)
    }

    /// Cancel the creator's unjoined room
    pub fn cancel(&self, creator: &PlayerId) -> Result<String, RoomError> {
        let mut inner = self.lock();
        let code = inner
            .rooms
            .values()
            .find(|r| &r.creator == creator && r.status == RoomStatus::AwaitingJoin)
            .map(|r| r.code.clone())
            .ok_or(RoomError::NotFound)?;
        inner.rooms.remove(&code);
        tracing::info!(%code, "room cancelled");
        Ok(code)
    }

    /// Cancel the unjoined room opened from a closed connection
    pub fn cancel_connection(&self, connection: ConnectionId) -> Option<String> {
        let mut inner = self.lock();
        let code = inner
            .rooms
            .values()
            .find(|r| r.creator_connection == connection && r.status == RoomStatus::AwaitingJoin)
            .map(|r| r.code.clone())?;
        inner.rooms.remove(&code);
        Some(code)
    }

    /// Remove unjoined rooms past their TTL
    pub fn expire(&self, now: Timestamp) -> Vec<Room> {
        let mut inner = self.lock();
        let expired: Vec<String> = inner
            .rooms
            .values()
            .filter(|r| self.is_expired(r, now))
            .map(|r| r.code.clone())
            .collect();
        expired
            .iter()
            .filter_map(|code| inner.rooms.remove(code))
            .collect()
    }

    /// Drop filled rooms whose game is no longer live
    pub fn prune(&self, is_live: impl Fn(GameId) -> bool) {
        self.lock().rooms.retain(|_, room| match room.game_id {
            Some(game) => is_live(game),
            None => true,
        });
    }

    /// Whether `player` created a room nobody has joined yet
    pub fn hosts_open_room(&self, player: &PlayerId) -> bool {
        self.lock()
            .rooms
            .values()
            .any(|r| &r.creator == player && r.status == RoomStatus::AwaitingJoin)
    }

    pub fn get(&self, code: &str) -> Option<Room> {
        self.lock().rooms.get(code).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
