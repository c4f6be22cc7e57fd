//! 8x8 board geometry and piece placement

use crate::error::EngineError;
use crate::pieces::{Color, Piece, PieceId, PieceKind};
use serde::{Deserialize, Serialize};

/// Board side length
pub const BOARD_SIZE: i8 = 8;

/// Board coordinates; row 0 is black's back rank
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Square {
    pub row: i8,
    pub col: i8,
}

impl Square {
    pub const fn new(row: i8, col: i8) -> Self {
        Self { row, col }
    }

    /// Check if this square is on the board
    pub fn is_valid(&self) -> bool {
        (0..BOARD_SIZE).contains(&self.row) && (0..BOARD_SIZE).contains(&self.col)
    }

    /// Square displaced by (dr, dc), if still on the board
    pub fn offset(&self, dr: i8, dc: i8) -> Option<Square> {
        let sq = Square::new(self.row + dr, self.col + dc);
        sq.is_valid().then_some(sq)
    }

    /// Every square on the board, row-major
    pub fn all() -> impl Iterator<Item = Square> {
        (0..BOARD_SIZE).flat_map(|row| (0..BOARD_SIZE).map(move |col| Square::new(row, col)))
    }
}

/// A piece placement used to build custom boards
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub kind: PieceKind,
    pub color: Color,
    pub row: i8,
    pub col: i8,
}

impl Placement {
    pub const fn new(kind: PieceKind, color: Color, row: i8, col: i8) -> Self {
        Self { kind, color, row, col }
    }
}

/// Initial piece layout
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum Layout {
    /// Standard chess starting position
    Classic,
    /// Variant starting position mixing in the five variant pieces
    #[default]
    Surge,
    /// Explicit placements (board editor output)
    Custom { pieces: Vec<Placement> },
}

const CLASSIC_BACK: [PieceKind; 8] = [
    PieceKind::Rook,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Queen,
    PieceKind::King,
    PieceKind::Bishop,
    PieceKind::Knight,
    PieceKind::Rook,
];
const CLASSIC_PAWNS: [PieceKind; 8] = [PieceKind::Pawn; 8];

const SURGE_BACK: [PieceKind; 8] = [
    PieceKind::FlyingCastle,
    PieceKind::Knight,
    PieceKind::IceBishop,
    PieceKind::Queen,
    PieceKind::King,
    PieceKind::Bishop,
    PieceKind::Prince,
    PieceKind::Rook,
];
const SURGE_PAWNS: [PieceKind; 8] = [
    PieceKind::Pawn,
    PieceKind::Herald,
    PieceKind::Pawn,
    PieceKind::Guardian,
    PieceKind::Guardian,
    PieceKind::Pawn,
    PieceKind::Herald,
    PieceKind::Pawn,
];

impl Layout {
    /// Expand into placements, white first
    pub fn placements(&self) -> Vec<Placement> {
        let (back, pawns) = match self {
            Layout::Classic => (CLASSIC_BACK, CLASSIC_PAWNS),
            Layout::Surge => (SURGE_BACK, SURGE_PAWNS),
            Layout::Custom { pieces } => return pieces.clone(),
        };

        let mut out = Vec::with_capacity(32);
        for color in [Color::White, Color::Black] {
            let home = color.home_row();
            let second = home + color.forward();
            for col in 0..BOARD_SIZE {
                out.push(Placement::new(back[col as usize], color, home, col));
            }
            for col in 0..BOARD_SIZE {
                out.push(Placement::new(pawns[col as usize], color, second, col));
            }
        }
        out
    }
}

/// 8x8 grid of optional pieces
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Board {
    grid: [[Option<Piece>; 8]; 8],
}

impl Board {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a board from placements, assigning ids in placement order
    pub fn from_placements(placements: &[Placement]) -> Result<Self, EngineError> {
        let mut board = Board::empty();
        for (i, p) in placements.iter().enumerate() {
            let sq = Square::new(p.row, p.col);
            if !sq.is_valid() {
                return Err(EngineError::InvalidSetup(format!(
                    "placement {} is off the board at ({}, {})",
                    i, p.row, p.col
                )));
            }
            if board.get(sq).is_some() {
                return Err(EngineError::InvalidSetup(format!(
                    "two pieces placed on ({}, {})",
                    p.row, p.col
                )));
            }
            let id = PieceId(i as u32 + 1);
            board.put(Piece::new(id, p.kind, p.color, p.row, p.col));
        }

        for color in [Color::White, Color::Black] {
            let kings = board.pieces().filter(|p| p.color == color && p.is_king()).count();
            if kings != 1 {
                return Err(EngineError::InvalidSetup(format!(
                    "{:?} has {} kings, expected 1",
                    color, kings
                )));
            }
        }

        Ok(board)
    }

    pub fn get(&self, sq: Square) -> Option<&Piece> {
        if !sq.is_valid() {
            return None;
        }
        self.grid[sq.row as usize][sq.col as usize].as_ref()
    }

    pub fn is_empty(&self, sq: Square) -> bool {
        self.get(sq).is_none()
    }

    /// Place a piece at its own (row, col), replacing any occupant
    pub fn put(&mut self, piece: Piece) -> Option<Piece> {
        self.grid[piece.row as usize][piece.col as usize].replace(piece)
    }

    pub fn remove(&mut self, sq: Square) -> Option<Piece> {
        if !sq.is_valid() {
            return None;
        }
        self.grid[sq.row as usize][sq.col as usize].take()
    }

    pub fn get_mut(&mut self, sq: Square) -> Option<&mut Piece> {
        if !sq.is_valid() {
            return None;
        }
        self.grid[sq.row as usize][sq.col as usize].as_mut()
    }

    /// Move the piece on `from` to `to`, returning whatever was on `to`
    pub fn relocate(&mut self, from: Square, to: Square) -> Option<Piece> {
        let mut piece = self.remove(from)?;
        piece.row = to.row;
        piece.col = to.col;
        piece.has_moved = true;
        self.put(piece)
    }

    /// Iterate pieces row-major
    pub fn pieces(&self) -> impl Iterator<Item = &Piece> + '_ {
        self.grid.iter().flatten().flatten()
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        self.pieces()
            .find(|p| p.color == color && p.is_king())
            .map(|p| Square::new(p.row, p.col))
    }

    /// Check structural invariants: coordinates match slots, ids are unique
    pub fn verify(&self) -> Result<(), EngineError> {
        let mut seen = std::collections::BTreeSet::new();
        for sq in Square::all() {
            if let Some(piece) = self.get(sq) {
                if piece.row != sq.row || piece.col != sq.col {
                    return Err(EngineError::InvariantViolation(format!(
                        "piece {} records ({}, {}) but sits on ({}, {})",
                        piece.id, piece.row, piece.col, sq.row, sq.col
                    )));
                }
                if !seen.insert(piece.id) {
                    return Err(EngineError::InvariantViolation(format!(
                        "piece {} appears twice",
                        piece.id
                    )));
                }
            }
        }
        Ok(())
    }
}
