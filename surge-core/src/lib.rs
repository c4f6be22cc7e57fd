//! SURGE Core - Real-time chess engine
//!
//! This crate provides the core game logic for SURGE:
//! - Board geometry (8x8 grid) and starting layouts
//! - Piece types, including the five variant pieces
//! - Per-player energy and per-piece cooldowns
//! - Move validation and application
//! - Game lifecycle state machine
//! - ELO rating deltas
//!
//! Nothing here owns a clock or a socket. Every time-dependent operation
//! takes `now` explicitly, which keeps the engine deterministic under test.

pub mod board;
pub mod clock;
pub mod elo;
pub mod error;
pub mod game;
pub mod pieces;
pub mod resources;
pub mod ruleset;
pub mod validator;

// Re-exports for convenient access
pub use board::{Board, Layout, Placement, Square, BOARD_SIZE};
pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use elo::{rating_change, RatingChange};
pub use error::{ConfigError, EngineError, MoveRejection};
pub use game::{
    EndReason, GameEngine, GameId, GameRecord, GameState, GameStatus, MoveOutcome, MoveRecord,
    PlayerId,
};
pub use pieces::{Color, Piece, PieceId, PieceKind, PieceType, PIECE_TYPES};
pub use resources::PlayerResources;
pub use ruleset::{PieceRule, RuleSet};
pub use validator::{legal_destinations, MoveRequest};
