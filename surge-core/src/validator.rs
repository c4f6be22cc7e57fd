//! Move legality
//!
//! `validate` is a pure function of (board, mover resources, rules, request,
//! now). It runs the checks in a fixed order and stops at the first
//! failure:
//!
//! 1. bounds
//! 2. ownership
//! 3. cooldown
//! 4. energy
//! 5. shape (per-kind movement rules, castling, pawn rules)
//! 6. path (sliding rules only)
//! 7. destination (never onto an own piece)
//! 8. king safety, when the rule set enables it
//!
//! On success it returns a `MoveEffect` holding the board delta and the
//! resource delta. Nothing is mutated here.

use crate::board::{Board, Square};
use crate::clock::Timestamp;
use crate::error::MoveRejection;
use crate::pieces::{Color, MoveRule, MoveStyle, Piece, PieceId, PieceKind, Special, ORTHOGONAL};
use crate::resources::PlayerResources;
use crate::ruleset::RuleSet;
use serde::{Deserialize, Serialize};

// ============================================================================
// TYPES
// ============================================================================

/// A requested move, in board coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub from: Square,
    pub to: Square,
}

impl MoveRequest {
    pub fn new(from_row: i8, from_col: i8, to_row: i8, to_col: i8) -> Self {
        Self {
            from: Square::new(from_row, from_col),
            to: Square::new(to_row, to_col),
        }
    }
}

/// Rook relocation that accompanies a castling king move
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastleRook {
    pub rook: PieceId,
    pub from: Square,
    pub to: Square,
}

/// Everything a validated move changes
#[derive(Clone, Debug, PartialEq)]
pub struct MoveEffect {
    /// The mover as it stood before the move
    pub mover: Piece,
    pub from: Square,
    pub to: Square,
    pub captured: Option<Piece>,
    /// Guardian that negated this capture; the mover stays on `from`
    pub shield_absorbed: Option<PieceId>,
    pub castle: Option<CastleRook>,
    pub promotion: Option<PieceKind>,
    pub energy_cost: f64,
    pub cooldown_until: Timestamp,
    /// Opponent pieces whose cooldown end is pushed out to the given time
    pub frozen: Vec<(PieceId, Timestamp)>,
}

impl MoveEffect {
    /// Square the mover occupies afterwards
    pub fn landing(&self) -> Square {
        if self.shield_absorbed.is_some() {
            self.from
        } else {
            self.to
        }
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Decide whether `player` may make `request` at `now`.
///
/// `resources` must already be recomputed to `now`.
pub fn validate(
    board: &Board,
    resources: &PlayerResources,
    rules: &RuleSet,
    player: Color,
    request: MoveRequest,
    now: Timestamp,
) -> Result<MoveEffect, MoveRejection> {
    let MoveRequest { from, to } = request;

    if !from.is_valid() || !to.is_valid() {
        return Err(MoveRejection::OutOfBounds);
    }

    let mover = *board.get(from).ok_or(MoveRejection::NoPieceAtSource)?;

    if mover.color != player {
        return Err(MoveRejection::NotYourPiece);
    }

    if resources.is_on_cooldown(mover.id, now) {
        return Err(MoveRejection::PieceOnCooldown);
    }

    if !resources.can_afford(rules.energy_cost(mover.kind)) {
        return Err(MoveRejection::InsufficientEnergy);
    }

    plan(board, rules, &mover, from, to, now)
}

/// Steps 5-8 plus effect construction. Ignores energy and cooldowns.
fn plan(
    board: &Board,
    rules: &RuleSet,
    mover: &Piece,
    from: Square,
    to: Square,
    now: Timestamp,
) -> Result<MoveEffect, MoveRejection> {
    let castle = check_geometry(board, rules, mover, from, to)?;

    let target = board.get(to).copied();
    if let Some(occupant) = target {
        if occupant.color == mover.color {
            return Err(MoveRejection::DestinationOccupied);
        }
    }

    let shield_absorbed = target
        .filter(|t| t.flags.can_prevent_capture)
        .map(|t| t.id);
    let captured = if shield_absorbed.is_some() { None } else { target };

    let promotion = (mover.kind == PieceKind::Pawn
        && shield_absorbed.is_none()
        && to.row == mover.color.promotion_row())
    .then_some(rules.promotion);

    let mut effect = MoveEffect {
        mover: *mover,
        from,
        to,
        captured,
        shield_absorbed,
        castle,
        promotion,
        energy_cost: rules.energy_cost(mover.kind),
        cooldown_until: now.plus_millis(rules.cooldown_ms(mover.kind)),
        frozen: Vec::new(),
    };

    let mut after = board.clone();
    apply_to_board(&mut after, &effect);

    if rules.king_safety && is_in_check(&after, rules, mover.color) {
        return Err(MoveRejection::KingInCheck);
    }

    if mover.special() == Special::FreezeOnLand && shield_absorbed.is_none() {
        let until = now.plus_millis(rules.freeze_ms);
        for &(dr, dc) in ORTHOGONAL {
            if let Some(sq) = to.offset(dr, dc) {
                if let Some(p) = after.get(sq) {
                    if p.color != mover.color {
                        effect.frozen.push((p.id, until));
                    }
                }
            }
        }
    }

    Ok(effect)
}

/// Shape and path legality; returns the rook relocation for castling
fn check_geometry(
    board: &Board,
    rules: &RuleSet,
    mover: &Piece,
    from: Square,
    to: Square,
) -> Result<Option<CastleRook>, MoveRejection> {
    if from == to {
        return Err(MoveRejection::IllegalShape);
    }

    if mover.kind == PieceKind::Pawn {
        check_pawn(board, mover, from, to)?;
        return Ok(None);
    }

    match trace(board, mover.kind.piece_type().moves, from, to) {
        Reach::Clear => Ok(None),
        Reach::Blocked => Err(MoveRejection::PathBlocked),
        Reach::Unreachable if mover.special() == Special::Castling => {
            check_castle(board, rules, mover, from, to).map(Some)
        }
        Reach::Unreachable => Err(MoveRejection::IllegalShape),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Reach {
    Clear,
    Blocked,
    Unreachable,
}

/// Match the displacement against each movement rule
fn trace(board: &Board, moves: &[MoveRule], from: Square, to: Square) -> Reach {
    let dr = to.row - from.row;
    let dc = to.col - from.col;
    let mut blocked = false;

    for rule in moves {
        match rule.style {
            MoveStyle::Jump => {
                if rule.vectors.contains(&(dr, dc)) {
                    return Reach::Clear;
                }
            }
            MoveStyle::Slide => {
                for &(vr, vc) in rule.vectors {
                    let Some(steps) = steps_along(dr, dc, vr, vc) else {
                        continue;
                    };
                    if steps > rule.range as i8 {
                        continue;
                    }
                    let clear = (1..steps).all(|i| {
                        board.is_empty(Square::new(from.row + vr * i, from.col + vc * i))
                    });
                    if clear {
                        return Reach::Clear;
                    }
                    blocked = true;
                }
            }
            MoveStyle::Pawn => {}
        }
    }

    if blocked {
        Reach::Blocked
    } else {
        Reach::Unreachable
    }
}

/// Number of unit steps k >= 1 with (dr, dc) == k * (vr, vc)
fn steps_along(dr: i8, dc: i8, vr: i8, vc: i8) -> Option<i8> {
    let k = if vr != 0 { dr / vr } else { dc / vc };
    (k >= 1 && vr * k == dr && vc * k == dc).then_some(k)
}

fn check_pawn(board: &Board, pawn: &Piece, from: Square, to: Square) -> Result<(), MoveRejection> {
    let fwd = pawn.color.forward();
    let dr = to.row - from.row;
    let dc = to.col - from.col;

    if dc == 0 && dr * fwd > 0 {
        let steps = dr * fwd;
        if steps > pawn_push_limit(pawn) {
            return Err(MoveRejection::IllegalShape);
        }
        if (1..steps).any(|i| !board.is_empty(Square::new(from.row + fwd * i, from.col))) {
            return Err(MoveRejection::PathBlocked);
        }
        return match board.get(to) {
            None => Ok(()),
            Some(_) => Err(MoveRejection::DestinationOccupied),
        };
    }

    if dc.abs() == 1 && dr == fwd {
        return match board.get(to) {
            Some(target) if target.color != pawn.color => Ok(()),
            Some(_) => Err(MoveRejection::DestinationOccupied),
            None => Err(MoveRejection::IllegalShape),
        };
    }

    Err(MoveRejection::IllegalShape)
}

/// An unmoved pawn may push up to its rule's range; afterwards one square
fn pawn_push_limit(pawn: &Piece) -> i8 {
    if pawn.has_moved {
        return 1;
    }
    pawn.kind
        .piece_type()
        .moves
        .iter()
        .find(|rule| rule.style == MoveStyle::Pawn)
        .map_or(1, |rule| rule.range as i8)
}

fn check_castle(
    board: &Board,
    rules: &RuleSet,
    king: &Piece,
    from: Square,
    to: Square,
) -> Result<CastleRook, MoveRejection> {
    let dc = to.col - from.col;
    if king.has_moved || to.row != from.row || from.row != king.color.home_row() || dc.abs() != 2 {
        return Err(MoveRejection::IllegalShape);
    }

    let dir = dc.signum();
    let rook_from = Square::new(from.row, if dir > 0 { 7 } else { 0 });
    let rook = match board.get(rook_from) {
        Some(p) if p.kind == PieceKind::Rook && p.color == king.color && !p.has_moved => *p,
        _ => return Err(MoveRejection::IllegalShape),
    };

    let mut col = from.col + dir;
    while col != rook_from.col {
        if !board.is_empty(Square::new(from.row, col)) {
            return Err(MoveRejection::PathBlocked);
        }
        col += dir;
    }

    if rules.king_safety {
        let by = king.color.opponent();
        let passing = Square::new(from.row, from.col + dir);
        if is_attacked(board, rules, from, by) || is_attacked(board, rules, passing, by) {
            return Err(MoveRejection::KingInCheck);
        }
    }

    Ok(CastleRook {
        rook: rook.id,
        from: rook_from,
        to: Square::new(from.row, from.col + dir),
    })
}

// ============================================================================
// BOARD DELTA
// ============================================================================

/// Apply the board part of an effect
pub fn apply_to_board(board: &mut Board, effect: &MoveEffect) {
    if effect.shield_absorbed.is_some() {
        if let Some(guardian) = board.get_mut(effect.to) {
            guardian.flags.can_prevent_capture = false;
        }
        return;
    }

    board.relocate(effect.from, effect.to);

    if let Some(kind) = effect.promotion {
        if let Some(piece) = board.get_mut(effect.to) {
            piece.kind = kind;
        }
    }

    if let Some(castle) = effect.castle {
        board.relocate(castle.from, castle.to);
    }
}

// ============================================================================
// ATTACKS AND CHECK
// ============================================================================

/// Could `piece` standing on `from` capture on `target`?
fn attacks(board: &Board, piece: &Piece, from: Square, target: Square) -> bool {
    if from == target {
        return false;
    }
    if piece.kind == PieceKind::Pawn {
        let dr = target.row - from.row;
        let dc = target.col - from.col;
        return dr == piece.color.forward() && dc.abs() == 1;
    }
    trace(board, piece.kind.piece_type().moves, from, target) == Reach::Clear
}

/// Is `sq` attacked by any checking piece of color `by`?
pub fn is_attacked(board: &Board, rules: &RuleSet, sq: Square, by: Color) -> bool {
    board.pieces().any(|p| {
        p.color == by
            && rules.checks_king(p.kind)
            && attacks(board, p, Square::new(p.row, p.col), sq)
    })
}

pub fn is_in_check(board: &Board, rules: &RuleSet, color: Color) -> bool {
    match board.king_square(color) {
        Some(king) => is_attacked(board, rules, king, color.opponent()),
        None => false,
    }
}

/// Destinations the piece on `from` could reach, ignoring energy and cooldown
pub fn legal_destinations(board: &Board, rules: &RuleSet, from: Square) -> Vec<Square> {
    let Some(piece) = board.get(from) else {
        return Vec::new();
    };
    Square::all()
        .filter(|&to| plan(board, rules, piece, from, to, Timestamp::default()).is_ok())
        .collect()
}

pub fn has_legal_move(board: &Board, rules: &RuleSet, color: Color) -> bool {
    board
        .pieces()
        .filter(|p| p.color == color)
        .any(|p| !legal_destinations(board, rules, Square::new(p.row, p.col)).is_empty())
}

pub fn is_checkmate(board: &Board, rules: &RuleSet, color: Color) -> bool {
    is_in_check(board, rules, color) && !has_legal_move(board, rules, color)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Placement;

    fn rules() -> RuleSet {
        RuleSet {
            initial_energy: 10.0,
            ..RuleSet::default()
        }
    }

    fn board(extra: &[Placement]) -> Board {
        let mut placements = vec![
            Placement::new(PieceKind::King, Color::White, 7, 4),
            Placement::new(PieceKind::King, Color::Black, 0, 4),
        ];
        placements.extend_from_slice(extra);
        Board::from_placements(&placements).unwrap()
    }

    fn full_energy() -> PlayerResources {
        PlayerResources::new(&rules(), Timestamp(0))
    }

    fn check(b: &Board, player: Color, req: MoveRequest) -> Result<MoveEffect, MoveRejection> {
        validate(b, &full_energy(), &rules(), player, req, Timestamp(0))
    }

    #[test]
    fn test_bounds_checked_first() {
        let b = board(&[]);
        let res = check(&b, Color::Black, MoveRequest::new(7, 4, 8, 4));
        assert_eq!(res, Err(MoveRejection::OutOfBounds));
    }

    #[test]
    fn test_empty_source() {
        let b = board(&[]);
        let res = check(&b, Color::White, MoveRequest::new(4, 4, 3, 4));
        assert_eq!(res, Err(MoveRejection::NoPieceAtSource));
    }

    #[test]
    fn test_ownership() {
        let b = board(&[]);
        let res = check(&b, Color::White, MoveRequest::new(0, 4, 1, 4));
        assert_eq!(res, Err(MoveRejection::NotYourPiece));
    }

    #[test]
    fn test_cooldown_before_energy() {
        let b = board(&[Placement::new(PieceKind::Knight, Color::White, 7, 1)]);
        let knight = b.get(Square::new(7, 1)).unwrap().id;
        let mut res = PlayerResources::new(&RuleSet { initial_energy: 0.0, ..rules() }, Timestamp(0));
        res.start_cooldown(knight, Timestamp(1_000));

        let req = MoveRequest::new(7, 1, 5, 2);
        let out = validate(&b, &res, &rules(), Color::White, req, Timestamp(500));
        assert_eq!(out, Err(MoveRejection::PieceOnCooldown));
    }

    #[test]
    fn test_insufficient_energy() {
        let b = board(&[Placement::new(PieceKind::Queen, Color::White, 4, 4)]);
        let res = PlayerResources::new(&RuleSet { initial_energy: 3.5, ..rules() }, Timestamp(0));
        let out = validate(&b, &res, &rules(), Color::White, MoveRequest::new(4, 4, 4, 0), Timestamp(0));
        assert_eq!(out, Err(MoveRejection::InsufficientEnergy));
    }

    #[test]
    fn test_knight_shape_and_jump() {
        let b = board(&[
            Placement::new(PieceKind::Knight, Color::White, 7, 1),
            Placement::new(PieceKind::Pawn, Color::White, 6, 1),
            Placement::new(PieceKind::Pawn, Color::White, 6, 2),
        ]);
        assert!(check(&b, Color::White, MoveRequest::new(7, 1, 5, 2)).is_ok());
        assert_eq!(
            check(&b, Color::White, MoveRequest::new(7, 1, 5, 1)),
            Err(MoveRejection::IllegalShape)
        );
    }

    #[test]
    fn test_rook_path_blocked() {
        let b = board(&[
            Placement::new(PieceKind::Rook, Color::White, 7, 0),
            Placement::new(PieceKind::Pawn, Color::White, 5, 0),
        ]);
        assert!(check(&b, Color::White, MoveRequest::new(7, 0, 6, 0)).is_ok());
        assert_eq!(
            check(&b, Color::White, MoveRequest::new(7, 0, 3, 0)),
            Err(MoveRejection::PathBlocked)
        );
        assert_eq!(
            check(&b, Color::White, MoveRequest::new(7, 0, 5, 0)),
            Err(MoveRejection::DestinationOccupied)
        );
    }

    #[test]
    fn test_capture_opponent() {
        let b = board(&[
            Placement::new(PieceKind::Bishop, Color::White, 5, 2),
            Placement::new(PieceKind::Knight, Color::Black, 2, 5),
        ]);
        let effect = check(&b, Color::White, MoveRequest::new(5, 2, 2, 5)).unwrap();
        assert_eq!(effect.captured.map(|p| p.kind), Some(PieceKind::Knight));
        assert_eq!(effect.energy_cost, 2.0);
        assert_eq!(effect.cooldown_until, Timestamp(2_500));
    }

    #[test]
    fn test_pawn_rules() {
        let b = board(&[
            Placement::new(PieceKind::Pawn, Color::White, 6, 0),
            Placement::new(PieceKind::Pawn, Color::White, 6, 3),
            Placement::new(PieceKind::Knight, Color::Black, 5, 3),
            Placement::new(PieceKind::Rook, Color::Black, 5, 1),
        ]);
        // double step from the start
        assert!(check(&b, Color::White, MoveRequest::new(6, 0, 4, 0)).is_ok());
        // diagonal capture
        assert!(check(&b, Color::White, MoveRequest::new(6, 0, 5, 1)).is_ok());
        // diagonal without a capture
        assert_eq!(
            check(&b, Color::White, MoveRequest::new(6, 3, 5, 2)),
            Err(MoveRejection::IllegalShape)
        );
        // straight into a piece
        assert_eq!(
            check(&b, Color::White, MoveRequest::new(6, 3, 5, 3)),
            Err(MoveRejection::DestinationOccupied)
        );
        // double step through a piece
        assert_eq!(
            check(&b, Color::White, MoveRequest::new(6, 3, 4, 3)),
            Err(MoveRejection::PathBlocked)
        );
        // backwards
        assert_eq!(
            check(&b, Color::White, MoveRequest::new(6, 0, 7, 0)),
            Err(MoveRejection::IllegalShape)
        );
    }

    #[test]
    fn test_pawn_push_follows_rule_range() {
        let mut b = board(&[Placement::new(PieceKind::Pawn, Color::White, 6, 0)]);
        assert_eq!(
            check(&b, Color::White, MoveRequest::new(6, 0, 3, 0)),
            Err(MoveRejection::IllegalShape)
        );

        b.relocate(Square::new(6, 0), Square::new(5, 0));
        assert_eq!(
            check(&b, Color::White, MoveRequest::new(5, 0, 3, 0)),
            Err(MoveRejection::IllegalShape)
        );
        assert!(check(&b, Color::White, MoveRequest::new(5, 0, 4, 0)).is_ok());
    }

    #[test]
    fn test_pawn_promotes() {
        let b = board(&[Placement::new(PieceKind::Pawn, Color::White, 1, 0)]);
        let effect = check(&b, Color::White, MoveRequest::new(1, 0, 0, 0)).unwrap();
        assert_eq!(effect.promotion, Some(PieceKind::Queen));

        let mut after = b.clone();
        apply_to_board(&mut after, &effect);
        assert_eq!(after.get(Square::new(0, 0)).unwrap().kind, PieceKind::Queen);
    }

    #[test]
    fn test_flying_castle() {
        let b = board(&[
            Placement::new(PieceKind::FlyingCastle, Color::White, 4, 4),
            Placement::new(PieceKind::Pawn, Color::White, 3, 3),
        ]);
        // orthogonal, unlimited
        assert!(check(&b, Color::White, MoveRequest::new(4, 4, 4, 0)).is_ok());
        // diagonal up to two
        assert!(check(&b, Color::White, MoveRequest::new(4, 4, 2, 6)).is_ok());
        assert_eq!(
            check(&b, Color::White, MoveRequest::new(4, 4, 1, 7)),
            Err(MoveRejection::IllegalShape)
        );
        // diagonal blocked
        assert_eq!(
            check(&b, Color::White, MoveRequest::new(4, 4, 2, 2)),
            Err(MoveRejection::PathBlocked)
        );
    }

    #[test]
    fn test_ice_bishop_freezes_neighbours() {
        let b = board(&[
            Placement::new(PieceKind::IceBishop, Color::White, 6, 1),
            Placement::new(PieceKind::Rook, Color::Black, 3, 5),
            Placement::new(PieceKind::Knight, Color::Black, 2, 3),
            Placement::new(PieceKind::Pawn, Color::White, 4, 4),
        ]);
        let rook = b.get(Square::new(3, 5)).unwrap().id;
        let effect = validate(
            &b,
            &full_energy(),
            &rules(),
            Color::White,
            MoveRequest::new(6, 1, 3, 4),
            Timestamp(1_000),
        )
        .unwrap();
        assert_eq!(effect.frozen, vec![(rook, Timestamp(3_000))]);

        // range is three
        assert_eq!(
            check(&b, Color::White, MoveRequest::new(6, 1, 2, 5)),
            Err(MoveRejection::IllegalShape)
        );
    }

    #[test]
    fn test_guardian_absorbs_first_capture() {
        let b = board(&[
            Placement::new(PieceKind::Rook, Color::White, 7, 0),
            Placement::new(PieceKind::Guardian, Color::Black, 3, 0),
        ]);
        let effect = check(&b, Color::White, MoveRequest::new(7, 0, 3, 0)).unwrap();
        assert!(effect.shield_absorbed.is_some());
        assert!(effect.captured.is_none());
        assert_eq!(effect.landing(), Square::new(7, 0));

        let mut after = b.clone();
        apply_to_board(&mut after, &effect);
        let guardian = after.get(Square::new(3, 0)).unwrap();
        assert_eq!(guardian.kind, PieceKind::Guardian);
        assert!(!guardian.flags.can_prevent_capture);
        assert_eq!(after.get(Square::new(7, 0)).unwrap().kind, PieceKind::Rook);

        let second = check(&after, Color::White, MoveRequest::new(7, 0, 3, 0)).unwrap();
        assert_eq!(second.captured.map(|p| p.kind), Some(PieceKind::Guardian));
    }

    #[test]
    fn test_prince_and_herald_jumps() {
        let b = board(&[
            Placement::new(PieceKind::Prince, Color::White, 4, 4),
            Placement::new(PieceKind::Herald, Color::White, 6, 1),
            Placement::new(PieceKind::Pawn, Color::White, 5, 1),
        ]);
        assert!(check(&b, Color::White, MoveRequest::new(4, 4, 3, 4)).is_ok());
        assert!(check(&b, Color::White, MoveRequest::new(4, 4, 2, 5)).is_ok());
        assert_eq!(
            check(&b, Color::White, MoveRequest::new(4, 4, 2, 4)),
            Err(MoveRejection::IllegalShape)
        );
        // herald leaps over the pawn
        assert!(check(&b, Color::White, MoveRequest::new(6, 1, 4, 1)).is_ok());
        assert!(check(&b, Color::White, MoveRequest::new(6, 1, 4, 3)).is_ok());
        assert_eq!(
            check(&b, Color::White, MoveRequest::new(6, 1, 5, 2)),
            Err(MoveRejection::IllegalShape)
        );
    }

    #[test]
    fn test_castling() {
        let b = board(&[
            Placement::new(PieceKind::Rook, Color::White, 7, 7),
            Placement::new(PieceKind::Rook, Color::White, 7, 0),
            Placement::new(PieceKind::Knight, Color::White, 7, 1),
        ]);
        let effect = check(&b, Color::White, MoveRequest::new(7, 4, 7, 6)).unwrap();
        let castle = effect.castle.unwrap();
        assert_eq!(castle.from, Square::new(7, 7));
        assert_eq!(castle.to, Square::new(7, 5));

        let mut after = b.clone();
        apply_to_board(&mut after, &effect);
        assert!(after.get(Square::new(7, 6)).unwrap().is_king());
        assert_eq!(after.get(Square::new(7, 5)).unwrap().kind, PieceKind::Rook);

        // queenside blocked by the knight
        assert_eq!(
            check(&b, Color::White, MoveRequest::new(7, 4, 7, 2)),
            Err(MoveRejection::PathBlocked)
        );
    }

    #[test]
    fn test_king_safety_only_when_enabled() {
        let b = board(&[
            Placement::new(PieceKind::Rook, Color::White, 6, 4),
            Placement::new(PieceKind::Rook, Color::Black, 2, 4),
        ]);
        // moving the pinned rook off the file exposes the king
        let req = MoveRequest::new(6, 4, 6, 0);
        assert!(check(&b, Color::White, req).is_ok());

        let strict = RuleSet { king_safety: true, ..rules() };
        let out = validate(&b, &full_energy(), &strict, Color::White, req, Timestamp(0));
        assert_eq!(out, Err(MoveRejection::KingInCheck));
    }

    #[test]
    fn test_non_checking_kind_ignored() {
        let b = board(&[Placement::new(PieceKind::Rook, Color::Black, 3, 4)]);
        let mut strict = RuleSet { king_safety: true, ..rules() };
        assert!(is_in_check(&b, &strict, Color::White));
        strict.pieces.get_mut(PieceKind::Rook).checks_king = false;
        assert!(!is_in_check(&b, &strict, Color::White));
    }

    #[test]
    fn test_checkmate_detection() {
        // back-rank mate: white king boxed in by own pawns, black rook on the rank
        let b = board(&[
            Placement::new(PieceKind::Pawn, Color::White, 6, 3),
            Placement::new(PieceKind::Pawn, Color::White, 6, 4),
            Placement::new(PieceKind::Pawn, Color::White, 6, 5),
            Placement::new(PieceKind::Rook, Color::Black, 7, 0),
        ]);
        let strict = RuleSet { king_safety: true, ..rules() };
        assert!(is_checkmate(&b, &strict, Color::White));
        assert!(!is_checkmate(&b, &strict, Color::Black));
    }
}
