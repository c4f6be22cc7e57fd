//! Server state and command dispatch
//!
//! Transport-agnostic: a connection is an authenticated identity plus an
//! outbound channel. The WebSocket route feeds it, and tests drive it
//! directly with channel receivers standing in for sockets.

use crate::archive::ArchiveSender;
use crate::auth::{self, Authenticator, Identity};
use crate::config::ServerConfig;
use crate::error::{MatchmakingError, RoomError, SessionError};
use crate::hub::{ConnectionId, EventSender, Hub};
use crate::matchmaking::{Matchmaker, MatchmakingEntry, Pairing};
use crate::protocol::{ClientCommand, ServerEvent};
use crate::rooms::RoomRegistry;
use crate::session::{SeatSpec, SessionManager};
use rustc_hash::FxHashMap;
use std::sync::{Arc, PoisonError, RwLock};
use surge_core::{Clock, Color, GameId, MoveRequest, SystemClock, Timestamp};

/// Server-wide shared state
pub struct ServerState {
    pub config: ServerConfig,
    pub auth: Arc<dyn Authenticator>,
    pub hub: Arc<Hub>,
    pub sessions: SessionManager,
    pub matchmaker: Matchmaker,
    pub rooms: RoomRegistry,
    clock: Arc<dyn Clock>,
    clients: RwLock<FxHashMap<ConnectionId, Identity>>,
}

impl ServerState {
    pub fn new(config: ServerConfig, archive: Option<ArchiveSender>) -> Self {
        Self::with_clock(config, Arc::new(SystemClock), archive)
    }

    pub fn with_clock(config: ServerConfig, clock: Arc<dyn Clock>, archive: Option<ArchiveSender>) -> Self {
        let hub = Arc::new(Hub::new());
        Self {
            auth: auth::from_config(&config.auth),
            sessions: SessionManager::new(
                config.session.clone(),
                config.rules.clone(),
                hub.clone(),
                archive,
            ),
            matchmaker: Matchmaker::new(config.matchmaking.clone()),
            rooms: RoomRegistry::new(config.rooms.clone()),
            hub,
            clock,
            clients: RwLock::new(FxHashMap::default()),
            config,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn identity(&self, connection: ConnectionId) -> Option<Identity> {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&connection)
            .cloned()
    }

    pub fn connection_count(&self) -> usize {
        self.clients.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    // ========================================================================
    // CONNECTION LIFECYCLE
    // ========================================================================

    /// Register an authenticated connection. A player with a live game is
    /// rebound to it and resynced.
    pub fn connect(&self, identity: Identity, tx: EventSender) -> ConnectionId {
        let connection = self.hub.register(tx);
        tracing::info!(%connection, user = %identity.user_id, "connected");
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(connection, identity.clone());
        self.sessions.reconnect(&identity.user_id, connection, self.now());
        connection
    }

    pub fn disconnect(&self, connection: ConnectionId) {
        let Some(identity) = self
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&connection)
        else {
            return;
        };
        let now = self.now();

        if self.matchmaker.cancel_connection(connection).is_some() {
            tracing::debug!(user = %identity.user_id, "left matchmaking on disconnect");
        }
        if let Some(code) = self.rooms.cancel_connection(connection) {
            tracing::info!(%code, "room cancelled on creator disconnect");
        }
        self.sessions.disconnect(&identity.user_id, connection, now);
        self.hub.unregister(connection);
        tracing::info!(%connection, user = %identity.user_id, "disconnected");
    }

    /// Parse and dispatch one text frame
    pub fn handle_text(&self, connection: ConnectionId, text: &str) {
        match ClientCommand::parse(text) {
            Ok(command) => self.handle(connection, command),
            Err(e) => {
                tracing::warn!(%connection, "malformed message: {e}");
                self.hub.send(connection, ServerEvent::error(None, "MALFORMED_MESSAGE"));
            }
        }
    }

    pub fn handle(&self, connection: ConnectionId, command: ClientCommand) {
        let Some(identity) = self.identity(connection) else {
            tracing::warn!(%connection, "command from unknown connection");
            return;
        };
        let now = self.now();

        match command {
            ClientCommand::RequestMatchmaking => self.request_matchmaking(connection, &identity, now),
            ClientCommand::CancelMatchmaking => match self.matchmaker.cancel(&identity.user_id) {
                Ok(_) => self.hub.send(connection, ServerEvent::MatchmakingCancelled),
                Err(e) => self.matchmaking_error(connection, e),
            },
            ClientCommand::MatchmakingStatus => self.hub.send(
                connection,
                ServerEvent::MatchmakingStatus {
                    in_queue: self.matchmaker.contains(&identity.user_id),
                    queue_size: self.matchmaker.len(),
                },
            ),
            ClientCommand::CreateRoom => self.create_room(connection, &identity, now),
            ClientCommand::JoinRoom { code } => self.join_room(connection, &identity, &code, now),
            ClientCommand::CancelRoom => match self.rooms.cancel(&identity.user_id) {
                Ok(code) => self.hub.send(connection, ServerEvent::RoomCancelled { code }),
                Err(e) => self.room_error(connection, e),
            },
            ClientCommand::StartGame { game_id } => {
                let result = self.sessions.start_game(game_id, Some(&identity.user_id), now);
                self.report(connection, game_id, result);
            }
            ClientCommand::MakeMove {
                game_id,
                from_row,
                from_col,
                to_row,
                to_col,
            } => {
                let request = MoveRequest::new(from_row, from_col, to_row, to_col);
                if let Err(e) = self
                    .sessions
                    .make_move(game_id, &identity.user_id, connection, request, now)
                {
                    self.hub.send(
                        connection,
                        ServerEvent::MoveRejected {
                            game_id,
                            reason: e.code().to_string(),
                        },
                    );
                }
            }
            ClientCommand::SpectateGame { game_id } => {
                let result = self.sessions.spectate(game_id, connection, now);
                self.report(connection, game_id, result);
            }
            ClientCommand::LeaveGame { game_id } => {
                let result = self.sessions.leave(game_id, &identity.user_id, connection, now);
                self.report(connection, game_id, result);
            }
            ClientCommand::RequestGameState { game_id } => {
                let result = self.sessions.send_state(game_id, connection, now);
                self.report(connection, game_id, result);
            }
            ClientCommand::Resign { game_id } => {
                let result = self.sessions.resign(game_id, &identity.user_id, now);
                self.report(connection, game_id, result);
            }
            ClientCommand::OfferDraw { game_id } => {
                let result = self.sessions.offer_draw(game_id, &identity.user_id, now);
                self.report(connection, game_id, result);
            }
            ClientCommand::RespondDraw { game_id, accept } => {
                let result = self.sessions.respond_draw(game_id, &identity.user_id, accept, now);
                self.report(connection, game_id, result);
            }
        }
    }

    fn report(&self, connection: ConnectionId, game_id: GameId, result: Result<(), SessionError>) {
        if let Err(e) = result {
            tracing::debug!(%connection, game = %game_id, "command rejected: {e}");
            self.hub.send(connection, ServerEvent::error(Some(game_id), e.code()));
        }
    }

    fn matchmaking_error(&self, connection: ConnectionId, e: MatchmakingError) {
        self.hub.send(
            connection,
            ServerEvent::MatchmakingError {
                reason: e.code().to_string(),
            },
        );
    }

    fn room_error(&self, connection: ConnectionId, e: RoomError) {
        self.hub.send(
            connection,
            ServerEvent::RoomError {
                reason: e.code().to_string(),
            },
        );
    }

    // ========================================================================
    // MATCHMAKING
    // ========================================================================

    fn request_matchmaking(&self, connection: ConnectionId, identity: &Identity, now: Timestamp) {
        if self.sessions.game_of(&identity.user_id).is_some() {
            return self.matchmaking_error(connection, MatchmakingError::AlreadyInGame);
        }
        if self.rooms.hosts_open_room(&identity.user_id) {
            return self.matchmaking_error(connection, MatchmakingError::HostingRoom);
        }
        let entry = MatchmakingEntry {
            player: identity.user_id.clone(),
            rating: identity.rating,
            connection,
            enqueued_at: now,
        };
        match self.matchmaker.enqueue(entry, now) {
            Ok(None) => self.hub.send(
                connection,
                ServerEvent::MatchmakingStarted {
                    queue_size: self.matchmaker.len(),
                },
            ),
            Ok(Some(pairing)) => {
                self.hub.send(
                    connection,
                    ServerEvent::MatchmakingStarted {
                        queue_size: self.matchmaker.len(),
                    },
                );
                self.start_match(pairing, now);
            }
            Err(e) => self.matchmaking_error(connection, e),
        }
    }

    /// Open and start a game for a matched pair
    fn start_match(&self, pairing: Pairing, now: Timestamp) {
        let Pairing { white, black } = pairing;
        let seat = |e: &MatchmakingEntry| SeatSpec {
            player: e.player.clone(),
            rating: e.rating,
            connection: Some(e.connection),
        };

        let game_id = match self.sessions.open_game(seat(&white), seat(&black), None, now) {
            Ok(game_id) => game_id,
            Err(e) => {
                tracing::warn!("could not open matched game: {e}");
                for entry in [white, black] {
                    if self.sessions.game_of(&entry.player).is_some() {
                        self.matchmaking_error(entry.connection, MatchmakingError::AlreadyInGame);
                    } else {
                        self.matchmaker.requeue(entry);
                    }
                }
                return;
            }
        };

        tracing::info!(
            game = %game_id,
            white = %white.player,
            black = %black.player,
            "match found"
        );
        self.hub.send(white.connection, ServerEvent::MatchFound { game_id, color: Color::White });
        self.hub.send(black.connection, ServerEvent::MatchFound { game_id, color: Color::Black });

        if let Err(e) = self.sessions.start_game(game_id, None, now) {
            tracing::error!(game = %game_id, "could not start matched game: {e}");
        }
    }

    // ========================================================================
    // ROOMS
    // ========================================================================

    /// A player sits in at most one of: a game, the queue, an open room
    fn room_precheck(&self, identity: &Identity) -> Result<(), RoomError> {
        if self.sessions.game_of(&identity.user_id).is_some() {
            return Err(RoomError::AlreadyInGame);
        }
        if self.matchmaker.contains(&identity.user_id) {
            return Err(RoomError::InQueue);
        }
        Ok(())
    }

    fn create_room(&self, connection: ConnectionId, identity: &Identity, now: Timestamp) {
        if let Err(e) = self.room_precheck(identity) {
            return self.room_error(connection, e);
        }
        match self
            .rooms
            .create(identity.user_id.clone(), identity.rating, connection, now)
        {
            Ok(code) => self.hub.send(connection, ServerEvent::RoomCreated { code }),
            Err(e) => self.room_error(connection, e),
        }
    }

    fn join_room(&self, connection: ConnectionId, identity: &Identity, code: &str, now: Timestamp) {
        if let Err(e) = self.room_precheck(identity) {
            return self.room_error(connection, e);
        }
        let room = match self.rooms.join(code, &identity.user_id, now) {
            Ok(room) => room,
            Err(e) => return self.room_error(connection, e),
        };

        let creator_connection = self
            .hub
            .is_connected(room.creator_connection)
            .then_some(room.creator_connection);
        let white = SeatSpec {
            player: room.creator.clone(),
            rating: room.creator_rating,
            connection: creator_connection,
        };
        let black = SeatSpec {
            player: identity.user_id.clone(),
            rating: identity.rating,
            connection: Some(connection),
        };

        let game_id = match self.sessions.open_game(white, black, Some(room.creator.clone()), now) {
            Ok(game_id) => game_id,
            Err(e) => {
                self.rooms.remove(&room.code);
                tracing::warn!(code = %room.code, "could not open room game: {e}");
                return self.room_error(connection, RoomError::AlreadyInGame);
            }
        };
        self.rooms.bind_game(&room.code, game_id);

        tracing::info!(code = %room.code, game = %game_id, "room filled");
        self.hub.send(
            connection,
            ServerEvent::RoomJoined {
                game_id,
                code: room.code.clone(),
            },
        );
        self.hub.send(
            room.creator_connection,
            ServerEvent::PlayerJoined {
                game_id,
                user_id: identity.user_id.clone(),
            },
        );
        self.hub.publish(game_id, ServerEvent::GameWaiting { game_id });
    }

    // ========================================================================
    // HOUSEKEEPING
    // ========================================================================

    /// Periodic sweep: widen matchmaking windows, expire rooms, forfeit
    /// players whose grace period ran out
    pub fn housekeeping(&self) {
        let now = self.now();

        for pairing in self.matchmaker.sweep(now) {
            self.start_match(pairing, now);
        }

        for room in self.rooms.expire(now) {
            tracing::info!(code = %room.code, "room expired");
            self.hub.send(room.creator_connection, ServerEvent::RoomCancelled { code: room.code });
        }
        self.rooms.prune(|game| self.sessions.contains(game));

        self.sessions.expire_disconnects(now);
    }

    pub fn broadcast_snapshots(&self) {
        self.sessions.broadcast_snapshots(self.now());
    }
}
