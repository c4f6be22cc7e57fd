//! Engine error taxonomy

use crate::game::GameStatus;
use thiserror::Error;

/// Why a move request was refused. Always recoverable; state is untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum MoveRejection {
    #[error("game is not active")]
    GameNotActive,
    #[error("requester is not a player in this game")]
    NotAPlayer,
    #[error("no piece on the source square")]
    NoPieceAtSource,
    #[error("target square is off the board")]
    OutOfBounds,
    #[error("piece belongs to the opponent")]
    NotYourPiece,
    #[error("piece is on cooldown")]
    PieceOnCooldown,
    #[error("not enough energy")]
    InsufficientEnergy,
    #[error("piece cannot move that way")]
    IllegalShape,
    #[error("path is blocked")]
    PathBlocked,
    #[error("destination holds an own piece")]
    DestinationOccupied,
    #[error("move would leave the king in check")]
    KingInCheck,
}

impl MoveRejection {
    /// Stable machine-readable reason sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            MoveRejection::GameNotActive => "GAME_NOT_ACTIVE",
            MoveRejection::NotAPlayer => "NOT_A_PLAYER",
            MoveRejection::NoPieceAtSource => "NO_PIECE_AT_SOURCE",
            MoveRejection::OutOfBounds => "OUT_OF_BOUNDS",
            MoveRejection::NotYourPiece => "NOT_YOUR_PIECE",
            MoveRejection::PieceOnCooldown => "PIECE_ON_COOLDOWN",
            MoveRejection::InsufficientEnergy => "INSUFFICIENT_ENERGY",
            MoveRejection::IllegalShape => "ILLEGAL_MOVE",
            MoveRejection::PathBlocked => "PATH_BLOCKED",
            MoveRejection::DestinationOccupied => "DESTINATION_OCCUPIED",
            MoveRejection::KingInCheck => "KING_IN_CHECK",
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Rejected(#[from] MoveRejection),
    #[error("cannot go from {from:?} to {to:?}")]
    InvalidTransition { from: GameStatus, to: GameStatus },
    #[error("invalid board setup: {0}")]
    InvalidSetup(String),
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("player is not part of this game")]
    NotAPlayer,
    #[error("no draw offer from the opponent is pending")]
    NoDrawOffer,
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Rejected(r) => r.code(),
            EngineError::InvalidTransition { .. } => "INVALID_STATE",
            EngineError::InvalidSetup(_) => "INVALID_SETUP",
            EngineError::InvariantViolation(_) => "INTERNAL_ERROR",
            EngineError::NotAPlayer => "NOT_A_PLAYER",
            EngineError::NoDrawOffer => "NO_DRAW_OFFER",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::InvariantViolation(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("rule table entry {index} is {found:?}, expected {expected:?}")]
    TableOrder {
        index: usize,
        expected: crate::pieces::PieceKind,
        found: crate::pieces::PieceKind,
    },
    #[error("{field} must be {requirement}")]
    OutOfRange {
        field: &'static str,
        requirement: &'static str,
    },
}
