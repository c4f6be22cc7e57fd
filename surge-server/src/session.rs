//! Game session manager
//!
//! Owns every live `GameEngine`. Each game sits behind its own mutex, so at
//! most one command touches a game at a time and commands on different
//! games never contend. A command locks the game, validates and applies,
//! copies out what must be sent, and releases the lock. All fan-out and the
//! hand-off to the archive happen after release.
//!
//! The session also tracks which connection currently occupies each seat.
//! A seat whose connection drops starts a grace period; the game pauses
//! while anyone is missing and the absent player forfeits when the grace
//! period runs out.

use crate::archive::ArchiveSender;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::hub::{ConnectionId, Hub};
use crate::protocol::ServerEvent;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use surge_core::{
    Color, GameEngine, GameId, GameRecord, GameState, GameStatus, MoveRequest, PlayerId, RuleSet,
    Timestamp,
};

// ============================================================================
// TYPES
// ============================================================================

/// A player taking a seat in a new game
#[derive(Clone, Debug)]
pub struct SeatSpec {
    pub player: PlayerId,
    pub rating: i32,
    pub connection: Option<ConnectionId>,
}

#[derive(Clone, Debug)]
struct Seat {
    rating: i32,
    connection: Option<ConnectionId>,
    disconnected_at: Option<Timestamp>,
}

impl Seat {
    fn new(spec: SeatSpec, now: Timestamp) -> Self {
        let disconnected_at = spec.connection.is_none().then_some(now);
        Self {
            rating: spec.rating,
            connection: spec.connection,
            disconnected_at,
        }
    }
}

struct Session {
    engine: GameEngine,
    seats: [Seat; 2],
    /// Room games may only be started by their creator
    creator: Option<PlayerId>,
}

/// What to announce once a game is over
struct Closing {
    state: GameState,
    record: Option<GameRecord>,
    abort_reason: Option<&'static str>,
}

impl Session {
    fn seat(&self, color: Color) -> &Seat {
        &self.seats[color.index()]
    }

    fn seat_mut(&mut self, color: Color) -> &mut Seat {
        &mut self.seats[color.index()]
    }

    fn all_present(&self) -> bool {
        self.seats.iter().all(|s| s.connection.is_some())
    }

    fn color_of(&self, player: &PlayerId) -> Result<Color, SessionError> {
        self.engine
            .color_of(player)
            .ok_or(SessionError::Engine(surge_core::EngineError::NotAPlayer))
    }

    /// Some(..) once the engine has reached `finished`
    fn closing(&mut self, now: Timestamp, elo_k: f64, abort_reason: Option<&'static str>) -> Option<Closing> {
        if self.engine.status() != GameStatus::Finished {
            return None;
        }
        let record = self.engine.record(
            self.seat(Color::White).rating,
            self.seat(Color::Black).rating,
            elo_k,
        );
        Some(Closing {
            state: self.engine.snapshot(now),
            record,
            abort_reason,
        })
    }
}

fn lock(handle: &Mutex<Session>) -> MutexGuard<'_, Session> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// SESSION MANAGER
// ============================================================================

pub struct SessionManager {
    config: SessionConfig,
    rules: RuleSet,
    hub: Arc<Hub>,
    archive: Option<ArchiveSender>,
    games: RwLock<FxHashMap<GameId, Arc<Mutex<Session>>>>,
    player_games: RwLock<FxHashMap<PlayerId, GameId>>,
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        rules: RuleSet,
        hub: Arc<Hub>,
        archive: Option<ArchiveSender>,
    ) -> Self {
        Self {
            config,
            rules,
            hub,
            archive,
            games: RwLock::new(FxHashMap::default()),
            player_games: RwLock::new(FxHashMap::default()),
        }
    }

    fn session(&self, game_id: GameId) -> Result<Arc<Mutex<Session>>, SessionError> {
        self.games
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&game_id)
            .cloned()
            .ok_or(SessionError::GameNotFound)
    }

    fn all_sessions(&self) -> Vec<(GameId, Arc<Mutex<Session>>)> {
        self.games
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, s)| (*id, s.clone()))
            .collect()
    }

    pub fn contains(&self, game_id: GameId) -> bool {
        self.games
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&game_id)
    }

    pub fn len(&self) -> usize {
        self.games.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The live game a player is seated in
    pub fn game_of(&self, player: &PlayerId) -> Option<GameId> {
        self.player_games
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(player)
            .copied()
    }

    /// Current snapshot, for status queries and tests
    pub fn snapshot(&self, game_id: GameId, now: Timestamp) -> Result<GameState, SessionError> {
        let handle = self.session(game_id)?;
        let mut session = lock(&handle);
        Ok(session.engine.snapshot(now))
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Create a game in `waiting` and subscribe the seated connections
    pub fn open_game(
        &self,
        white: SeatSpec,
        black: SeatSpec,
        creator: Option<PlayerId>,
        now: Timestamp,
    ) -> Result<GameId, SessionError> {
        let game_id = GameId::new();
        let engine = GameEngine::new(
            game_id,
            white.player.clone(),
            black.player.clone(),
            self.rules.clone(),
            now,
        )?;

        {
            let mut player_games = self.player_games.write().unwrap_or_else(PoisonError::into_inner);
            if player_games.contains_key(&white.player) || player_games.contains_key(&black.player) {
                return Err(SessionError::AlreadyInGame);
            }
            player_games.insert(white.player.clone(), game_id);
            player_games.insert(black.player.clone(), game_id);
        }

        for conn in [white.connection, black.connection].into_iter().flatten() {
            self.hub.subscribe(game_id, conn);
        }

        let session = Session {
            engine,
            seats: [Seat::new(white, now), Seat::new(black, now)],
            creator,
        };
        self.games
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(game_id, Arc::new(Mutex::new(session)));
        tracing::info!(game = %game_id, "game opened");
        Ok(game_id)
    }

    /// `waiting -> active`; room games only on the creator's request
    pub fn start_game(
        &self,
        game_id: GameId,
        requester: Option<&PlayerId>,
        now: Timestamp,
    ) -> Result<(), SessionError> {
        let handle = self.session(game_id)?;
        let state = {
            let mut session = lock(&handle);
            if let (Some(creator), Some(requester)) = (&session.creator, requester) {
                if creator != requester {
                    return Err(SessionError::NotRoomCreator);
                }
            }
            session.engine.start(now)?;
            if !session.all_present() {
                session.engine.pause(now)?;
            }
            session.engine.snapshot(now)
        };
        self.hub.publish(
            game_id,
            ServerEvent::GameStarted {
                game_id,
                state: Box::new(state),
            },
        );
        Ok(())
    }

    // ========================================================================
    // GAME COMMANDS
    // ========================================================================

    /// Validate and apply a move. On success the mover gets `moveAccepted`
    /// and every subscriber a fresh snapshot; on failure nothing is sent and
    /// the error carries the rejection reason.
    pub fn make_move(
        &self,
        game_id: GameId,
        player: &PlayerId,
        connection: ConnectionId,
        request: MoveRequest,
        now: Timestamp,
    ) -> Result<(), SessionError> {
        let handle = self.session(game_id)?;
        let result = {
            let mut session = lock(&handle);
            match session.engine.apply_move(player, request, now) {
                Ok(outcome) => {
                    let state = session.engine.snapshot(now);
                    let closing = session.closing(now, self.config.elo_k, None);
                    Ok((outcome.record, state, closing))
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(game = %game_id, "aborting game: {e}");
                    if let Err(abort) = session.engine.abort(now) {
                        tracing::error!(game = %game_id, "abort failed: {abort}");
                    }
                    Err((e, session.closing(now, self.config.elo_k, Some("INVARIANT_VIOLATION"))))
                }
                Err(e) => Err((e, None)),
            }
        };

        match result {
            Ok((record, state, closing)) => {
                self.hub.send(connection, ServerEvent::MoveAccepted { game_id, record });
                self.hub.publish(game_id, ServerEvent::state_update(state));
                if let Some(closing) = closing {
                    self.close(game_id, closing);
                }
                Ok(())
            }
            Err((e, closing)) => {
                tracing::debug!(game = %game_id, player = %player, reason = e.code(), "move rejected");
                if let Some(closing) = closing {
                    self.close(game_id, closing);
                }
                Err(e.into())
            }
        }
    }

    pub fn resign(&self, game_id: GameId, player: &PlayerId, now: Timestamp) -> Result<(), SessionError> {
        let handle = self.session(game_id)?;
        let closing = {
            let mut session = lock(&handle);
            session.engine.resign(player, now)?;
            session.closing(now, self.config.elo_k, None)
        };
        if let Some(closing) = closing {
            self.close(game_id, closing);
        }
        Ok(())
    }

    pub fn offer_draw(&self, game_id: GameId, player: &PlayerId, now: Timestamp) -> Result<(), SessionError> {
        let handle = self.session(game_id)?;
        let (color, closing) = {
            let mut session = lock(&handle);
            let color = session.color_of(player)?;
            session.engine.offer_draw(player, now)?;
            (color, session.closing(now, self.config.elo_k, None))
        };
        match closing {
            Some(closing) => self.close(game_id, closing),
            None => self.hub.publish(game_id, ServerEvent::DrawOffered { game_id, by: color }),
        }
        Ok(())
    }

    pub fn respond_draw(
        &self,
        game_id: GameId,
        player: &PlayerId,
        accept: bool,
        now: Timestamp,
    ) -> Result<(), SessionError> {
        let handle = self.session(game_id)?;
        let closing = {
            let mut session = lock(&handle);
            session.engine.respond_draw(player, accept, now)?;
            session.closing(now, self.config.elo_k, None)
        };
        match closing {
            Some(closing) => self.close(game_id, closing),
            None => self.hub.publish(game_id, ServerEvent::DrawDeclined { game_id }),
        }
        Ok(())
    }

    /// Subscribe a spectator and push a fresh snapshot to every subscriber
    pub fn spectate(&self, game_id: GameId, connection: ConnectionId, now: Timestamp) -> Result<(), SessionError> {
        let state = self.snapshot(game_id, now)?;
        self.hub.subscribe(game_id, connection);
        self.hub.publish(game_id, ServerEvent::state_update(state));
        Ok(())
    }

    pub fn send_state(&self, game_id: GameId, connection: ConnectionId, now: Timestamp) -> Result<(), SessionError> {
        let state = self.snapshot(game_id, now)?;
        self.hub.send(connection, ServerEvent::state_update(state));
        Ok(())
    }

    /// A spectator stops watching; a seated player gives the game up
    pub fn leave(
        &self,
        game_id: GameId,
        player: &PlayerId,
        connection: ConnectionId,
        now: Timestamp,
    ) -> Result<(), SessionError> {
        let handle = self.session(game_id)?;
        let closing = {
            let mut session = lock(&handle);
            if session.engine.color_of(player).is_none() {
                None
            } else if session.engine.status() == GameStatus::Waiting {
                session.engine.abort(now)?;
                session.closing(now, self.config.elo_k, Some("PLAYER_LEFT"))
            } else {
                session.engine.resign(player, now)?;
                session.closing(now, self.config.elo_k, None)
            }
        };
        match closing {
            Some(closing) => self.close(game_id, closing),
            None => self.hub.unsubscribe(game_id, connection),
        }
        Ok(())
    }

    // ========================================================================
    // CONNECTIONS
    // ========================================================================

    /// Rebind a returning player to their live game and resync everyone
    pub fn reconnect(&self, player: &PlayerId, connection: ConnectionId, now: Timestamp) -> Option<GameId> {
        let game_id = self.game_of(player)?;
        let handle = self.session(game_id).ok()?;
        let state = {
            let mut session = lock(&handle);
            let color = session.color_of(player).ok()?;
            let seat = session.seat_mut(color);
            seat.connection = Some(connection);
            seat.disconnected_at = None;
            if session.engine.status() == GameStatus::Paused && session.all_present() {
                if let Err(e) = session.engine.resume(now) {
                    tracing::warn!(game = %game_id, "resume failed: {e}");
                }
            }
            session.engine.snapshot(now)
        };
        self.hub.subscribe(game_id, connection);
        self.hub.publish(game_id, ServerEvent::state_update(state));
        tracing::info!(game = %game_id, player = %player, "player reconnected");
        Some(game_id)
    }

    /// Vacate the player's seat if `connection` holds it; pauses the game
    pub fn disconnect(&self, player: &PlayerId, connection: ConnectionId, now: Timestamp) {
        let Some(game_id) = self.game_of(player) else {
            return;
        };
        let Ok(handle) = self.session(game_id) else {
            return;
        };
        let state = {
            let mut session = lock(&handle);
            let Ok(color) = session.color_of(player) else {
                return;
            };
            let seat = session.seat_mut(color);
            if seat.connection != Some(connection) {
                return;
            }
            seat.connection = None;
            seat.disconnected_at = Some(now);
            if session.engine.status() == GameStatus::Active {
                if let Err(e) = session.engine.pause(now) {
                    tracing::warn!(game = %game_id, "pause failed: {e}");
                }
            }
            session.engine.snapshot(now)
        };
        self.hub.unsubscribe(game_id, connection);
        self.hub.publish(game_id, ServerEvent::state_update(state));
        tracing::info!(game = %game_id, player = %player, "player disconnected");
    }

    // ========================================================================
    // HOUSEKEEPING
    // ========================================================================

    /// Forfeit players whose grace period ran out; abort unstarted games
    pub fn expire_disconnects(&self, now: Timestamp) {
        let grace = self.config.reconnect_grace_ms;
        for (game_id, handle) in self.all_sessions() {
            let closing = {
                let mut session = lock(&handle);
                let absent = [Color::White, Color::Black]
                    .into_iter()
                    .filter_map(|c| session.seat(c).disconnected_at.map(|t| (t, c)))
                    .filter(|&(t, _)| now.millis_since(t) >= grace)
                    .min_by_key(|&(t, _)| t);
                let Some((_, loser)) = absent else {
                    continue;
                };
                let outcome = match session.engine.status() {
                    GameStatus::Waiting => session.engine.abort(now).map(|_| Some("PLAYER_LEFT")),
                    GameStatus::Finished => continue,
                    _ => session.engine.forfeit(loser, now).map(|_| None),
                };
                match outcome {
                    Ok(reason) => session.closing(now, self.config.elo_k, reason),
                    Err(e) => {
                        tracing::warn!(game = %game_id, "forfeit failed: {e}");
                        None
                    }
                }
            };
            if let Some(closing) = closing {
                tracing::info!(game = %game_id, "grace period expired");
                self.close(game_id, closing);
            }
        }
    }

    /// Push a snapshot of every active game to its subscribers
    pub fn broadcast_snapshots(&self, now: Timestamp) {
        for (game_id, handle) in self.all_sessions() {
            let state = {
                let mut session = lock(&handle);
                if session.engine.status() != GameStatus::Active {
                    continue;
                }
                session.engine.snapshot(now)
            };
            self.hub.publish(game_id, ServerEvent::state_update(state));
        }
    }

    // ========================================================================
    // CLOSING
    // ========================================================================

    fn close(&self, game_id: GameId, closing: Closing) {
        let Closing {
            state,
            record,
            abort_reason,
        } = closing;

        match abort_reason {
            Some(reason) => self.hub.publish(
                game_id,
                ServerEvent::GameAborted {
                    game_id,
                    reason: reason.to_string(),
                },
            ),
            None => self.hub.publish(
                game_id,
                ServerEvent::GameEnded {
                    game_id,
                    winner: state.winner,
                    reason: state.end_reason,
                    state: Box::new(state),
                },
            ),
        }

        if let (Some(tx), Some(record)) = (&self.archive, record) {
            if tx.send(record).is_err() {
                tracing::warn!(game = %game_id, "archive channel closed; record dropped");
            }
        }

        self.games
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&game_id);
        self.player_games
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, g| *g != game_id);
        self.hub.drop_topic(game_id);
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").field("games", &self.len()).finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
