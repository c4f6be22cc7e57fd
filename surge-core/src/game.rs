//! Game engine: one game's board, resources and lifecycle
//!
//! ```text
//! waiting -> active -> finished
//!              ^  |
//!              |  v
//!             paused -> finished
//! ```
//!
//! Moves are check-then-apply: validation reads the state, and only a fully
//! validated effect is written back. A rejected move leaves the state as it
//! was (apart from the lazy energy recompute, which is observationally
//! neutral).
//!
//! While paused, energy and cooldowns keep following real elapsed time. A
//! player who comes back from a disconnect finds the same economy as if they
//! had been idle, not one frozen at the moment they dropped.

use crate::board::{Board, Square};
use crate::clock::Timestamp;
use crate::elo::{rating_change, RatingChange};
use crate::error::{EngineError, MoveRejection};
use crate::pieces::{Color, PieceId, PieceKind};
use crate::resources::PlayerResources;
use crate::ruleset::RuleSet;
use crate::validator::{apply_to_board, is_checkmate, validate, MoveEffect, MoveRequest};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Unique identifier for a game
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(Uuid);

impl GameId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for GameId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for GameId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Verified user id supplied by the authentication layer
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// STATE TYPES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Active,
    Paused,
    Finished,
}

impl GameStatus {
    pub fn is_live(self) -> bool {
        !matches!(self, GameStatus::Finished)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    KingCaptured,
    Checkmate,
    Resignation,
    DrawAgreed,
    InsufficientMaterial,
    Forfeit,
    Aborted,
}

/// Canonical, fully serializable game snapshot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub id: GameId,
    pub board: Board,
    pub white_state: PlayerResources,
    pub black_state: PlayerResources,
    pub white_player_id: PlayerId,
    pub black_player_id: PlayerId,
    /// Opponent of the last mover; informational only, never gates moves
    pub current_turn: Option<Color>,
    pub status: GameStatus,
    /// `None` with `status == Finished` is a draw
    pub winner: Option<Color>,
    pub end_reason: Option<EndReason>,
    pub draw_offer: Option<Color>,
    /// Increases with every accepted move
    pub move_count: u32,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub last_move_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
}

impl GameState {
    pub fn resources(&self, color: Color) -> &PlayerResources {
        match color {
            Color::White => &self.white_state,
            Color::Black => &self.black_state,
        }
    }

    fn resources_mut(&mut self, color: Color) -> &mut PlayerResources {
        match color {
            Color::White => &mut self.white_state,
            Color::Black => &mut self.black_state,
        }
    }

    pub fn player(&self, color: Color) -> &PlayerId {
        match color {
            Color::White => &self.white_player_id,
            Color::Black => &self.black_player_id,
        }
    }
}

/// One accepted move, as logged and broadcast
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    pub piece_id: PieceId,
    pub kind: PieceKind,
    pub color: Color,
    pub from: Square,
    pub to: Square,
    pub captured: Option<PieceKind>,
    pub shield_absorbed: bool,
    pub promotion: Option<PieceKind>,
    pub castle: bool,
    pub frozen: Vec<PieceId>,
    pub energy_cost: f64,
    pub cooldown_until: Timestamp,
    pub at: Timestamp,
}

impl MoveRecord {
    fn from_effect(effect: &MoveEffect, at: Timestamp) -> Self {
        Self {
            piece_id: effect.mover.id,
            kind: effect.mover.kind,
            color: effect.mover.color,
            from: effect.from,
            to: effect.to,
            captured: effect.captured.map(|p| p.kind),
            shield_absorbed: effect.shield_absorbed.is_some(),
            promotion: effect.promotion,
            castle: effect.castle.is_some(),
            frozen: effect.frozen.iter().map(|&(id, _)| id).collect(),
            energy_cost: effect.energy_cost,
            cooldown_until: effect.cooldown_until,
            at,
        }
    }
}

/// Result of an accepted move
#[derive(Clone, Debug)]
pub struct MoveOutcome {
    pub record: MoveRecord,
    pub finished: bool,
}

/// Finished-game record handed to persistence
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub game_id: GameId,
    pub white_player_id: PlayerId,
    pub black_player_id: PlayerId,
    pub white_rating: i32,
    pub black_rating: i32,
    pub winner: Option<Color>,
    pub end_reason: EndReason,
    pub moves: Vec<MoveRecord>,
    pub started_at: Option<Timestamp>,
    pub ended_at: Timestamp,
    pub rating_change: RatingChange,
}

// ============================================================================
// ENGINE
// ============================================================================

/// Owns one game's canonical state. Not thread-safe on its own; the session
/// layer serializes access.
#[derive(Clone, Debug)]
pub struct GameEngine {
    state: GameState,
    rules: RuleSet,
    moves: Vec<MoveRecord>,
}

impl GameEngine {
    /// Create a game in `waiting`
    pub fn new(
        id: GameId,
        white: PlayerId,
        black: PlayerId,
        rules: RuleSet,
        now: Timestamp,
    ) -> Result<Self, EngineError> {
        let board = Board::from_placements(&rules.layout.placements())?;
        let state = GameState {
            id,
            board,
            white_state: PlayerResources::new(&rules, now),
            black_state: PlayerResources::new(&rules, now),
            white_player_id: white,
            black_player_id: black,
            current_turn: None,
            status: GameStatus::Waiting,
            winner: None,
            end_reason: None,
            draw_offer: None,
            move_count: 0,
            created_at: now,
            started_at: None,
            last_move_at: None,
            ended_at: None,
        };
        Ok(Self {
            state,
            rules,
            moves: Vec::new(),
        })
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn id(&self) -> GameId {
        self.state.id
    }

    pub fn status(&self) -> GameStatus {
        self.state.status
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    #[cfg(any(test, feature = "test-hooks"))]
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.state.board
    }

    pub fn moves(&self) -> &[MoveRecord] {
        &self.moves
    }

    pub fn color_of(&self, player: &PlayerId) -> Option<Color> {
        if &self.state.white_player_id == player {
            Some(Color::White)
        } else if &self.state.black_player_id == player {
            Some(Color::Black)
        } else {
            None
        }
    }

    /// Lazy recompute of both players' energy, dropping expired cooldowns
    pub fn refresh(&mut self, now: Timestamp) {
        if !self.state.status.is_live() {
            return;
        }
        for color in [Color::White, Color::Black] {
            let res = self.state.resources_mut(color);
            res.recompute(now);
            res.prune_cooldowns(now);
        }
    }

    /// Refresh, then copy out the canonical state
    pub fn snapshot(&mut self, now: Timestamp) -> GameState {
        self.refresh(now);
        self.state.clone()
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    fn transition(&mut self, to: GameStatus) -> Result<(), EngineError> {
        use GameStatus::*;
        let from = self.state.status;
        let allowed = matches!(
            (from, to),
            (Waiting, Active)
                | (Waiting, Finished)
                | (Active, Paused)
                | (Active, Finished)
                | (Paused, Active)
                | (Paused, Finished)
        );
        if !allowed {
            return Err(EngineError::InvalidTransition { from, to });
        }
        self.state.status = to;
        Ok(())
    }

    /// Both seats are filled: start the clock and reset both economies
    pub fn start(&mut self, now: Timestamp) -> Result<(), EngineError> {
        self.transition(GameStatus::Active)?;
        self.state.started_at = Some(now);
        self.state.white_state = PlayerResources::new(&self.rules, now);
        self.state.black_state = PlayerResources::new(&self.rules, now);
        tracing::info!(game = %self.state.id, "game started");
        Ok(())
    }

    pub fn pause(&mut self, now: Timestamp) -> Result<(), EngineError> {
        self.refresh(now);
        self.transition(GameStatus::Paused)
    }

    pub fn resume(&mut self, now: Timestamp) -> Result<(), EngineError> {
        self.transition(GameStatus::Active)?;
        self.refresh(now);
        Ok(())
    }

    fn conclude(
        &mut self,
        winner: Option<Color>,
        reason: EndReason,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        self.refresh(now);
        self.transition(GameStatus::Finished)?;
        self.state.winner = winner;
        self.state.end_reason = Some(reason);
        self.state.ended_at = Some(now);
        self.state.draw_offer = None;
        tracing::info!(game = %self.state.id, ?winner, ?reason, "game finished");
        Ok(())
    }

    fn require_in_play(&self) -> Result<(), EngineError> {
        match self.state.status {
            GameStatus::Active | GameStatus::Paused => Ok(()),
            from => Err(EngineError::InvalidTransition {
                from,
                to: GameStatus::Finished,
            }),
        }
    }

    pub fn resign(&mut self, player: &PlayerId, now: Timestamp) -> Result<(), EngineError> {
        let color = self.color_of(player).ok_or(EngineError::NotAPlayer)?;
        self.require_in_play()?;
        self.conclude(Some(color.opponent()), EndReason::Resignation, now)
    }

    /// The absent player loses after the reconnection grace period
    pub fn forfeit(&mut self, loser: Color, now: Timestamp) -> Result<(), EngineError> {
        self.require_in_play()?;
        self.conclude(Some(loser.opponent()), EndReason::Forfeit, now)
    }

    /// End without a result (cancelled or corrupted game)
    pub fn abort(&mut self, now: Timestamp) -> Result<(), EngineError> {
        self.conclude(None, EndReason::Aborted, now)
    }

    /// Offer a draw. Returns true if this matched a pending offer from the
    /// opponent and the game ended drawn.
    pub fn offer_draw(&mut self, player: &PlayerId, now: Timestamp) -> Result<bool, EngineError> {
        let color = self.color_of(player).ok_or(EngineError::NotAPlayer)?;
        if self.state.status != GameStatus::Active {
            return Err(MoveRejection::GameNotActive.into());
        }
        if self.state.draw_offer == Some(color.opponent()) {
            self.conclude(None, EndReason::DrawAgreed, now)?;
            return Ok(true);
        }
        self.state.draw_offer = Some(color);
        Ok(false)
    }

    /// Answer the opponent's draw offer. Returns true if the game ended.
    pub fn respond_draw(
        &mut self,
        player: &PlayerId,
        accept: bool,
        now: Timestamp,
    ) -> Result<bool, EngineError> {
        let color = self.color_of(player).ok_or(EngineError::NotAPlayer)?;
        if self.state.status != GameStatus::Active {
            return Err(MoveRejection::GameNotActive.into());
        }
        if self.state.draw_offer != Some(color.opponent()) {
            return Err(EngineError::NoDrawOffer);
        }
        if accept {
            self.conclude(None, EndReason::DrawAgreed, now)?;
            Ok(true)
        } else {
            self.state.draw_offer = None;
            Ok(false)
        }
    }

    // ========================================================================
    // MOVES
    // ========================================================================

    /// Validate and apply one move atomically
    pub fn apply_move(
        &mut self,
        player: &PlayerId,
        request: MoveRequest,
        now: Timestamp,
    ) -> Result<MoveOutcome, EngineError> {
        let color = self.color_of(player).ok_or(MoveRejection::NotAPlayer)?;
        if self.state.status != GameStatus::Active {
            return Err(MoveRejection::GameNotActive.into());
        }

        self.refresh(now);
        let effect = validate(
            &self.state.board,
            self.state.resources(color),
            &self.rules,
            color,
            request,
            now,
        )?;

        // Only the debit can fail, and validation already priced it in.
        let own = self.state.resources_mut(color);
        own.debit(effect.energy_cost)?;
        own.start_cooldown(effect.mover.id, effect.cooldown_until);

        let opponent = self.state.resources_mut(color.opponent());
        if let Some(captured) = effect.captured {
            opponent.clear_cooldown(captured.id);
        }
        for &(id, until) in &effect.frozen {
            opponent.extend_cooldown(id, until);
        }

        apply_to_board(&mut self.state.board, &effect);
        self.state.board.verify()?;

        self.state.move_count += 1;
        self.state.last_move_at = Some(now);
        self.state.current_turn = Some(color.opponent());
        if self.state.draw_offer == Some(color) {
            self.state.draw_offer = None;
        }

        let record = MoveRecord::from_effect(&effect, now);
        self.moves.push(record.clone());
        tracing::debug!(
            game = %self.state.id,
            piece = %effect.mover.id,
            from = ?effect.from,
            to = ?effect.to,
            "move applied"
        );

        self.evaluate_terminal(color, &effect, now)?;

        Ok(MoveOutcome {
            record,
            finished: self.state.status == GameStatus::Finished,
        })
    }

    fn evaluate_terminal(
        &mut self,
        mover: Color,
        effect: &MoveEffect,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        if effect.captured.is_some_and(|p| p.is_king()) {
            return self.conclude(Some(mover), EndReason::KingCaptured, now);
        }
        if self.rules.king_safety && is_checkmate(&self.state.board, &self.rules, mover.opponent()) {
            return self.conclude(Some(mover), EndReason::Checkmate, now);
        }
        if self.state.board.pieces().all(|p| p.is_king()) {
            return self.conclude(None, EndReason::InsufficientMaterial, now);
        }
        Ok(())
    }

    /// Persistence record, once the game is over
    pub fn record(&self, white_rating: i32, black_rating: i32, k: f64) -> Option<GameRecord> {
        let end_reason = self.state.end_reason?;
        let ended_at = self.state.ended_at?;
        let change = if end_reason == EndReason::Aborted {
            RatingChange::default()
        } else {
            rating_change(white_rating, black_rating, self.state.winner, k)
        };
        Some(GameRecord {
            game_id: self.state.id,
            white_player_id: self.state.white_player_id.clone(),
            black_player_id: self.state.black_player_id.clone(),
            white_rating,
            black_rating,
            winner: self.state.winner,
            end_reason,
            moves: self.moves.clone(),
            started_at: self.state.started_at,
            ended_at,
            rating_change: change,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
