//! Session-level errors
//!
//! All of these are recoverable and reported to the requester only. Only
//! `code()` crosses the wire.

use surge_core::EngineError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MatchmakingError {
    #[error("player is already queued")]
    AlreadyInQueue,
    #[error("player is not queued")]
    NotInQueue,
    #[error("player is already in a game")]
    AlreadyInGame,
    #[error("player hosts an open room")]
    HostingRoom,
}

impl MatchmakingError {
    pub fn code(&self) -> &'static str {
        match self {
            MatchmakingError::AlreadyInQueue => "ALREADY_IN_QUEUE",
            MatchmakingError::NotInQueue => "NOT_IN_QUEUE",
            MatchmakingError::AlreadyInGame => "ALREADY_IN_GAME",
            MatchmakingError::HostingRoom => "ALREADY_HOSTING_ROOM",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("no open room with that code")]
    NotFound,
    #[error("room already has two players")]
    Full,
    #[error("cannot join a room you created")]
    OwnRoom,
    #[error("player already hosts an open room")]
    AlreadyHosting,
    #[error("player is already in a game")]
    AlreadyInGame,
    #[error("player is waiting in the matchmaking queue")]
    InQueue,
    #[error("no free room code after {0} attempts")]
    CodesExhausted(u32),
}

impl RoomError {
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::NotFound => "ROOM_NOT_FOUND",
            RoomError::Full => "ROOM_FULL",
            RoomError::OwnRoom => "CANNOT_JOIN_OWN_ROOM",
            RoomError::AlreadyHosting => "ALREADY_HOSTING_ROOM",
            RoomError::AlreadyInGame => "ALREADY_IN_GAME",
            RoomError::InQueue => "IN_MATCHMAKING_QUEUE",
            RoomError::CodesExhausted(_) => "ROOM_CODES_EXHAUSTED",
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("game not found")]
    GameNotFound,
    #[error("player is already in a game")]
    AlreadyInGame,
    #[error("only the room creator can start this game")]
    NotRoomCreator,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::GameNotFound => "GAME_NOT_FOUND",
            SessionError::AlreadyInGame => "ALREADY_IN_GAME",
            SessionError::NotRoomCreator => "NOT_ROOM_CREATOR",
            SessionError::Engine(e) => e.code(),
        }
    }
}
