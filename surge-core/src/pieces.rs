//! Piece type definitions

use serde::{Deserialize, Serialize};

/// Player color
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opponent(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Row delta of a forward pawn step
    pub fn forward(self) -> i8 {
        match self {
            Color::White => -1,
            Color::Black => 1,
        }
    }

    /// Back rank row
    pub fn home_row(self) -> i8 {
        match self {
            Color::White => 7,
            Color::Black => 0,
        }
    }

    /// Row a pawn promotes on
    pub fn promotion_row(self) -> i8 {
        self.opponent().home_row()
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Stable piece identity, used as the cooldown key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PieceId(pub u32);

impl std::fmt::Display for PieceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The eleven piece kinds: the six classic pieces plus five variants
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
    FlyingCastle,
    IceBishop,
    Prince,
    Guardian,
    Herald,
}

pub const ALL_KINDS: [PieceKind; 11] = [
    PieceKind::Pawn,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Rook,
    PieceKind::Queen,
    PieceKind::King,
    PieceKind::FlyingCastle,
    PieceKind::IceBishop,
    PieceKind::Prince,
    PieceKind::Guardian,
    PieceKind::Herald,
];

impl PieceKind {
    pub fn index(self) -> usize {
        self as usize
    }

    /// Static movement definition for this kind
    pub fn piece_type(self) -> &'static PieceType {
        &PIECE_TYPES[self.index()]
    }

    pub fn is_king(self) -> bool {
        self.piece_type().is_king
    }
}

/// How a movement rule treats the squares between source and destination
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveStyle {
    /// Walk along a vector up to `range` squares, blocked by pieces
    Slide,
    /// Land exactly on `from + vector`, ignores blocking
    Jump,
    /// Pawn pushes and diagonal captures
    Pawn,
}

/// Special abilities
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Special {
    None,
    Castling,      // King: two-square move with an unmoved rook
    Promotion,     // Pawn: promotes on the far rank
    FreezeOnLand,  // Ice bishop: extends adjacent enemy cooldowns
    PreventCapture, // Guardian: negates the first capture against it
}

/// One movement component of a piece type
#[derive(Clone, Copy, Debug)]
pub struct MoveRule {
    pub style: MoveStyle,
    pub range: u8,
    pub vectors: &'static [(i8, i8)],
}

impl MoveRule {
    const fn slide(range: u8, vectors: &'static [(i8, i8)]) -> Self {
        Self { style: MoveStyle::Slide, range, vectors }
    }

    const fn jump(vectors: &'static [(i8, i8)]) -> Self {
        Self { style: MoveStyle::Jump, range: 1, vectors }
    }
}

/// Unlimited slide range on an 8x8 board
pub const UNLIMITED: u8 = 7;

pub const ORTHOGONAL: &[(i8, i8)] = &[(-1, 0), (1, 0), (0, -1), (0, 1)];
pub const DIAGONAL: &[(i8, i8)] = &[(-1, -1), (-1, 1), (1, -1), (1, 1)];
pub const ALL_DIRECTIONS: &[(i8, i8)] = &[
    (-1, 0), (1, 0), (0, -1), (0, 1),
    (-1, -1), (-1, 1), (1, -1), (1, 1),
];
pub const KNIGHT_LEAPS: &[(i8, i8)] = &[
    (-2, -1), (-2, 1), (-1, -2), (-1, 2),
    (1, -2), (1, 2), (2, -1), (2, 1),
];
pub const HERALD_LEAPS: &[(i8, i8)] = &[
    (-2, 0), (2, 0), (0, -2), (0, 2),
    (-2, -2), (-2, 2), (2, -2), (2, 2),
];

/// Piece type definition
#[derive(Clone, Debug)]
pub struct PieceType {
    pub kind: PieceKind,
    pub name: &'static str,
    pub symbol: char,
    pub moves: &'static [MoveRule],
    pub special: Special,
    pub is_king: bool,
    pub energy_cost: f64,
    pub cooldown_ms: u64,
}

impl PieceType {
    #[allow(clippy::too_many_arguments)]
    const fn new(
        kind: PieceKind,
        name: &'static str,
        symbol: char,
        moves: &'static [MoveRule],
        special: Special,
        is_king: bool,
        energy_cost: f64,
        cooldown_ms: u64,
    ) -> Self {
        Self {
            kind,
            name,
            symbol,
            moves,
            special,
            is_king,
            energy_cost,
            cooldown_ms,
        }
    }
}

const PAWN_MOVES: &[MoveRule] = &[MoveRule { style: MoveStyle::Pawn, range: 2, vectors: &[] }];
const KNIGHT_MOVES: &[MoveRule] = &[MoveRule::jump(KNIGHT_LEAPS)];
const BISHOP_MOVES: &[MoveRule] = &[MoveRule::slide(UNLIMITED, DIAGONAL)];
const ROOK_MOVES: &[MoveRule] = &[MoveRule::slide(UNLIMITED, ORTHOGONAL)];
const QUEEN_MOVES: &[MoveRule] = &[MoveRule::slide(UNLIMITED, ALL_DIRECTIONS)];
const KING_MOVES: &[MoveRule] = &[MoveRule::slide(1, ALL_DIRECTIONS)];
const FLYING_CASTLE_MOVES: &[MoveRule] = &[
    MoveRule::slide(UNLIMITED, ORTHOGONAL),
    MoveRule::slide(2, DIAGONAL),
];
const ICE_BISHOP_MOVES: &[MoveRule] = &[MoveRule::slide(3, DIAGONAL)];
const PRINCE_MOVES: &[MoveRule] = &[
    MoveRule::slide(1, ALL_DIRECTIONS),
    MoveRule::jump(KNIGHT_LEAPS),
];
const GUARDIAN_MOVES: &[MoveRule] = &[MoveRule::slide(1, ALL_DIRECTIONS)];
const HERALD_MOVES: &[MoveRule] = &[MoveRule::jump(HERALD_LEAPS)];

/// All 11 piece types, indexed by `PieceKind`
pub static PIECE_TYPES: [PieceType; 11] = [
    // Classic
    PieceType::new(PieceKind::Pawn, "Pawn", 'P', PAWN_MOVES, Special::Promotion, false, 1.0, 1500),
    PieceType::new(PieceKind::Knight, "Knight", 'N', KNIGHT_MOVES, Special::None, false, 2.0, 2500),
    PieceType::new(PieceKind::Bishop, "Bishop", 'B', BISHOP_MOVES, Special::None, false, 2.0, 2500),
    PieceType::new(PieceKind::Rook, "Rook", 'R', ROOK_MOVES, Special::None, false, 3.0, 3000),
    PieceType::new(PieceKind::Queen, "Queen", 'Q', QUEEN_MOVES, Special::None, false, 4.0, 4000),
    PieceType::new(PieceKind::King, "King", 'K', KING_MOVES, Special::Castling, true, 1.0, 2000),
    // Variants
    PieceType::new(PieceKind::FlyingCastle, "Flying Castle", 'F', FLYING_CASTLE_MOVES, Special::None, false, 4.0, 4000),
    PieceType::new(PieceKind::IceBishop, "Ice Bishop", 'I', ICE_BISHOP_MOVES, Special::FreezeOnLand, false, 3.0, 3000),
    PieceType::new(PieceKind::Prince, "Prince", 'C', PRINCE_MOVES, Special::None, false, 3.0, 3500),
    PieceType::new(PieceKind::Guardian, "Guardian", 'G', GUARDIAN_MOVES, Special::PreventCapture, false, 2.0, 2500),
    PieceType::new(PieceKind::Herald, "Herald", 'H', HERALD_MOVES, Special::None, false, 2.0, 2500),
];

/// Variant-specific piece flags
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceFlags {
    pub can_prevent_capture: bool,
}

/// A piece on the board
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Piece {
    pub id: PieceId,
    #[serde(rename = "type")]
    pub kind: PieceKind,
    pub color: Color,
    pub row: i8,
    pub col: i8,
    pub has_moved: bool,
    pub flags: PieceFlags,
}

impl Piece {
    pub fn new(id: PieceId, kind: PieceKind, color: Color, row: i8, col: i8) -> Self {
        Self {
            id,
            kind,
            color,
            row,
            col,
            has_moved: false,
            flags: PieceFlags {
                can_prevent_capture: kind.piece_type().special == Special::PreventCapture,
            },
        }
    }

    pub fn is_king(&self) -> bool {
        self.kind.is_king()
    }

    pub fn special(&self) -> Special {
        self.kind.piece_type().special
    }
}
