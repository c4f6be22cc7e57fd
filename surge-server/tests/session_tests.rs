//! Session, matchmaking and room behavior driven through the dispatcher
//!
//! Each client is a connection id plus the receiving end of its outbound
//! channel; time comes from a manual clock.

use std::sync::Arc;
use std::time::Duration;
use surge_core::{
    Color, EndReason, GameId, GameRecord, GameStatus, Layout, ManualClock, PieceKind, Placement,
    PlayerId, Timestamp,
};
use surge_server::hub::EventReceiver;
use surge_server::session::SeatSpec;
use surge_server::{ClientCommand, ConnectionId, Identity, ServerConfig, ServerEvent, ServerState};
use tokio::sync::mpsc;

const START: Timestamp = Timestamp(1_000_000);

struct Client {
    conn: ConnectionId,
    rx: EventReceiver,
}

impl Client {
    fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

struct Harness {
    state: ServerState,
    clock: Arc<ManualClock>,
    archive: mpsc::UnboundedReceiver<GameRecord>,
}

impl Harness {
    fn new(config: ServerConfig) -> Self {
        let clock = Arc::new(ManualClock::new(START));
        let (tx, archive) = mpsc::unbounded_channel();
        let state = ServerState::with_clock(config, clock.clone(), Some(tx));
        Self {
            state,
            clock,
            archive,
        }
    }

    fn connect(&self, user: &str, rating: i32) -> Client {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = self.state.connect(Identity::new(user, rating), tx);
        Client { conn, rx }
    }

    fn send(&self, client: &Client, command: ClientCommand) {
        self.state.handle(client.conn, command);
    }

    fn advance(&self, ms: u64) {
        self.clock.advance(Duration::from_millis(ms));
    }

    /// Pair two fresh players through matchmaking; the first one plays white
    fn matched_pair(&self) -> (Client, Client, GameId) {
        let mut white = self.connect("alice", 1500);
        let mut black = self.connect("bob", 1500);
        self.send(&white, ClientCommand::RequestMatchmaking);
        self.send(&black, ClientCommand::RequestMatchmaking);
        let game_id = match_found(&white.drain());
        black.drain();
        (white, black, game_id)
    }

    fn make_move(&self, client: &Client, game_id: GameId, from: (i8, i8), to: (i8, i8)) {
        self.send(
            client,
            ClientCommand::MakeMove {
                game_id,
                from_row: from.0,
                from_col: from.1,
                to_row: to.0,
                to_col: to.1,
            },
        );
    }
}

fn match_found(events: &[ServerEvent]) -> GameId {
    events
        .iter()
        .find_map(|e| match e {
            ServerEvent::MatchFound { game_id, .. } => Some(*game_id),
            _ => None,
        })
        .expect("matchFound event")
}

fn last_state(events: &[ServerEvent]) -> Option<&surge_core::GameState> {
    events.iter().rev().find_map(|e| match e {
        ServerEvent::GameStateUpdate { state } => Some(state.as_ref()),
        _ => None,
    })
}

fn rejection(events: &[ServerEvent]) -> Option<&str> {
    events.iter().find_map(|e| match e {
        ServerEvent::MoveRejected { reason, .. } => Some(reason.as_str()),
        _ => None,
    })
}

fn custom_config(pieces: Vec<Placement>) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.rules.layout = Layout::Custom { pieces };
    config.rooms.seed = Some(7);
    config
}

fn rook_duel() -> ServerConfig {
    custom_config(vec![
        Placement::new(PieceKind::King, Color::White, 7, 4),
        Placement::new(PieceKind::King, Color::Black, 0, 4),
        Placement::new(PieceKind::Rook, Color::White, 4, 0),
        Placement::new(PieceKind::Rook, Color::Black, 4, 7),
    ])
}

// ============================================================================
// MATCHMAKING
// ============================================================================

#[test]
fn test_close_ratings_are_matched_and_started() {
    let h = Harness::new(ServerConfig::default());
    let mut alice = h.connect("alice", 1500);
    let mut bob = h.connect("bob", 1550);

    h.send(&alice, ClientCommand::RequestMatchmaking);
    assert_eq!(alice.drain(), vec![ServerEvent::MatchmakingStarted { queue_size: 1 }]);

    h.send(&bob, ClientCommand::RequestMatchmaking);
    let alice_events = alice.drain();
    let bob_events = bob.drain();

    let game_id = match_found(&alice_events);
    assert!(alice_events.contains(&ServerEvent::MatchFound {
        game_id,
        color: Color::White
    }));
    assert!(bob_events.contains(&ServerEvent::MatchFound {
        game_id,
        color: Color::Black
    }));
    for events in [&alice_events, &bob_events] {
        assert!(events.iter().any(|e| matches!(
            e,
            ServerEvent::GameStarted { state, .. } if state.status == GameStatus::Active
        )));
    }
    assert!(h.state.matchmaker.is_empty());
}

#[test]
fn test_wide_gap_matched_after_window_widens() {
    let h = Harness::new(ServerConfig::default());
    let mut low = h.connect("low", 1200);
    let mut high = h.connect("high", 1800);
    h.send(&low, ClientCommand::RequestMatchmaking);
    h.send(&high, ClientCommand::RequestMatchmaking);
    assert_eq!(h.state.matchmaker.len(), 2);

    h.advance(10_000);
    h.state.housekeeping();
    assert_eq!(h.state.matchmaker.len(), 2);

    h.advance(10_000);
    h.state.housekeeping();
    assert!(h.state.matchmaker.is_empty());
    let game_id = match_found(&low.drain());
    assert_eq!(match_found(&high.drain()), game_id);
}

#[test]
fn test_matchmaking_status_and_cancel() {
    let h = Harness::new(ServerConfig::default());
    let mut alice = h.connect("alice", 1500);

    h.send(&alice, ClientCommand::RequestMatchmaking);
    h.send(&alice, ClientCommand::MatchmakingStatus);
    h.send(&alice, ClientCommand::RequestMatchmaking);
    h.send(&alice, ClientCommand::CancelMatchmaking);
    h.send(&alice, ClientCommand::CancelMatchmaking);

    assert_eq!(
        alice.drain(),
        vec![
            ServerEvent::MatchmakingStarted { queue_size: 1 },
            ServerEvent::MatchmakingStatus {
                in_queue: true,
                queue_size: 1
            },
            ServerEvent::MatchmakingError {
                reason: "ALREADY_IN_QUEUE".into()
            },
            ServerEvent::MatchmakingCancelled,
            ServerEvent::MatchmakingError {
                reason: "NOT_IN_QUEUE".into()
            },
        ]
    );
}

#[test]
fn test_disconnect_while_queued_leaves_queue() {
    let h = Harness::new(ServerConfig::default());
    let alice = h.connect("alice", 1500);
    h.send(&alice, ClientCommand::RequestMatchmaking);
    h.state.disconnect(alice.conn);
    assert!(h.state.matchmaker.is_empty());
}

#[test]
fn test_player_in_game_cannot_queue() {
    let h = Harness::new(ServerConfig::default());
    let (mut alice, _bob, _game) = h.matched_pair();
    h.send(&alice, ClientCommand::RequestMatchmaking);
    assert_eq!(
        alice.drain(),
        vec![ServerEvent::MatchmakingError {
            reason: "ALREADY_IN_GAME".into()
        }]
    );
}

#[test]
fn test_queue_and_rooms_are_exclusive() {
    let h = Harness::new(ServerConfig::default());
    let mut alice = h.connect("alice", 1500);
    let mut bob = h.connect("bob", 1500);
    let mut carol = h.connect("carol", 1500);

    h.send(&alice, ClientCommand::RequestMatchmaking);
    alice.drain();
    h.send(&carol, ClientCommand::CreateRoom);
    let code = match carol.drain().as_slice() {
        [ServerEvent::RoomCreated { code }] => code.clone(),
        other => panic!("unexpected {other:?}"),
    };

    let in_queue = vec![ServerEvent::RoomError {
        reason: "IN_MATCHMAKING_QUEUE".into(),
    }];
    h.send(&alice, ClientCommand::JoinRoom { code: code.clone() });
    assert_eq!(alice.drain(), in_queue);
    h.send(&alice, ClientCommand::CreateRoom);
    assert_eq!(alice.drain(), in_queue);
    assert!(h.state.rooms.get(&code).is_some());

    h.send(&carol, ClientCommand::RequestMatchmaking);
    assert_eq!(
        carol.drain(),
        vec![ServerEvent::MatchmakingError {
            reason: "ALREADY_HOSTING_ROOM".into()
        }]
    );

    // alice is still queued, so bob is paired with her straight away
    h.send(&bob, ClientCommand::RequestMatchmaking);
    let game_id = match_found(&bob.drain());
    assert_eq!(match_found(&alice.drain()), game_id);
    assert!(h.state.matchmaker.is_empty());
}

#[test]
fn test_failed_pairing_keeps_the_free_player_queued() {
    let h = Harness::new(ServerConfig::default());
    let mut alice = h.connect("alice", 1500);
    let mut bob = h.connect("bob", 1500);
    let _carol = h.connect("carol", 1500);

    h.send(&alice, ClientCommand::RequestMatchmaking);
    alice.drain();
    // alice gets seated elsewhere while her queue entry is still live
    let seat = |name: &str| SeatSpec {
        player: PlayerId::new(name),
        rating: 1500,
        connection: None,
    };
    h.state
        .sessions
        .open_game(seat("alice"), seat("carol"), None, START)
        .unwrap();

    h.advance(5_000);
    h.send(&bob, ClientCommand::RequestMatchmaking);
    assert_eq!(
        alice.drain(),
        vec![ServerEvent::MatchmakingError {
            reason: "ALREADY_IN_GAME".into()
        }]
    );
    assert_eq!(
        bob.drain(),
        vec![ServerEvent::MatchmakingStarted { queue_size: 0 }]
    );
    assert!(h.state.matchmaker.contains(&PlayerId::new("bob")));
    assert!(!h.state.matchmaker.contains(&PlayerId::new("alice")));
    assert_eq!(h.state.sessions.game_of(&PlayerId::new("bob")), None);
}

// ============================================================================
// ROOMS
// ============================================================================

#[test]
fn test_room_create_join_start() {
    let h = Harness::new(ServerConfig::default());
    let mut alice = h.connect("alice", 1500);
    let mut bob = h.connect("bob", 1400);
    let mut carol = h.connect("carol", 1300);

    h.send(&alice, ClientCommand::CreateRoom);
    let code = match alice.drain().as_slice() {
        [ServerEvent::RoomCreated { code }] => code.clone(),
        other => panic!("unexpected {other:?}"),
    };

    h.send(&bob, ClientCommand::JoinRoom { code: code.clone() });
    let bob_events = bob.drain();
    let game_id = match &bob_events[0] {
        ServerEvent::RoomJoined { game_id, code: c } => {
            assert_eq!(c, &code);
            *game_id
        }
        other => panic!("unexpected {other:?}"),
    };
    assert!(bob_events.contains(&ServerEvent::GameWaiting { game_id }));

    let alice_events = alice.drain();
    assert!(alice_events.contains(&ServerEvent::PlayerJoined {
        game_id,
        user_id: surge_core::PlayerId::new("bob")
    }));
    assert!(alice_events.contains(&ServerEvent::GameWaiting { game_id }));

    h.send(&carol, ClientCommand::JoinRoom { code: code.clone() });
    assert_eq!(
        carol.drain(),
        vec![ServerEvent::RoomError {
            reason: "ROOM_FULL".into()
        }]
    );

    h.send(&bob, ClientCommand::StartGame { game_id });
    assert_eq!(
        bob.drain(),
        vec![ServerEvent::error(Some(game_id), "NOT_ROOM_CREATOR")]
    );

    h.send(&alice, ClientCommand::StartGame { game_id });
    for client in [&mut alice, &mut bob] {
        let events = client.drain();
        assert!(matches!(
            events.as_slice(),
            [ServerEvent::GameStarted { state, .. }] if state.status == GameStatus::Active
        ));
    }
}

#[test]
fn test_room_join_errors() {
    let h = Harness::new(ServerConfig::default());
    let mut alice = h.connect("alice", 1500);
    let mut bob = h.connect("bob", 1500);

    h.send(&bob, ClientCommand::JoinRoom { code: "ZZZZZZ".into() });
    assert_eq!(
        bob.drain(),
        vec![ServerEvent::RoomError {
            reason: "ROOM_NOT_FOUND".into()
        }]
    );

    h.send(&alice, ClientCommand::CreateRoom);
    let code = match alice.drain().as_slice() {
        [ServerEvent::RoomCreated { code }] => code.clone(),
        other => panic!("unexpected {other:?}"),
    };
    h.send(&alice, ClientCommand::JoinRoom { code });
    assert_eq!(
        alice.drain(),
        vec![ServerEvent::RoomError {
            reason: "CANNOT_JOIN_OWN_ROOM".into()
        }]
    );
}

#[test]
fn test_room_cancel_and_creator_disconnect() {
    let h = Harness::new(ServerConfig::default());
    let mut alice = h.connect("alice", 1500);

    h.send(&alice, ClientCommand::CreateRoom);
    let code = match alice.drain().as_slice() {
        [ServerEvent::RoomCreated { code }] => code.clone(),
        other => panic!("unexpected {other:?}"),
    };
    h.send(&alice, ClientCommand::CancelRoom);
    assert_eq!(alice.drain(), vec![ServerEvent::RoomCancelled { code }]);
    assert!(h.state.rooms.is_empty());

    h.send(&alice, ClientCommand::CreateRoom);
    assert_eq!(h.state.rooms.len(), 1);
    h.state.disconnect(alice.conn);
    assert!(h.state.rooms.is_empty());
}

#[test]
fn test_unjoined_room_expires() {
    let h = Harness::new(ServerConfig::default());
    let mut alice = h.connect("alice", 1500);
    h.send(&alice, ClientCommand::CreateRoom);
    alice.drain();

    h.advance(600_000);
    h.state.housekeeping();
    assert!(matches!(
        alice.drain().as_slice(),
        [ServerEvent::RoomCancelled { .. }]
    ));
    assert!(h.state.rooms.is_empty());
}

// ============================================================================
// MOVES AND FAN-OUT
// ============================================================================

#[test]
fn test_rejection_goes_to_requester_only() {
    let h = Harness::new(ServerConfig::default());
    let (mut alice, mut bob, game_id) = h.matched_pair();

    h.make_move(&bob, game_id, (6, 0), (5, 0));
    assert_eq!(rejection(&bob.drain()), Some("NOT_YOUR_PIECE"));
    assert!(alice.drain().is_empty());
}

#[test]
fn test_accepted_move_fans_out_to_players_and_spectators() {
    let h = Harness::new(ServerConfig::default());
    let (mut alice, mut bob, game_id) = h.matched_pair();
    let mut carol = h.connect("carol", 1000);

    h.send(&carol, ClientCommand::SpectateGame { game_id });
    let snapshot = last_state(&carol.drain()).cloned().unwrap();
    assert_eq!(snapshot.move_count, 0);
    // a new spectator resyncs everyone watching the game
    for client in [&mut alice, &mut bob] {
        assert_eq!(last_state(&client.drain()), Some(&snapshot));
    }

    h.advance(100);
    h.make_move(&alice, game_id, (6, 0), (4, 0));

    let alice_events = alice.drain();
    assert!(matches!(
        &alice_events[0],
        ServerEvent::MoveAccepted { record, .. } if record.kind == PieceKind::Pawn
    ));
    for events in [alice_events, bob.drain(), carol.drain()] {
        let state = last_state(&events).unwrap();
        assert_eq!(state.move_count, 1);
        assert!(state.board.get(surge_core::Square::new(4, 0)).is_some());
        assert!((state.white_state.energy() - 3.05).abs() < 1e-9);
    }

    h.send(&carol, ClientCommand::LeaveGame { game_id });
    h.make_move(&alice, game_id, (6, 2), (5, 2));
    assert!(carol.drain().is_empty());
    assert!(last_state(&bob.drain()).is_some());
}

#[test]
fn test_cooldown_rejection_then_success() {
    let h = Harness::new(ServerConfig::default());
    let (mut alice, _bob, game_id) = h.matched_pair();

    h.make_move(&alice, game_id, (6, 0), (5, 0));
    h.make_move(&alice, game_id, (5, 0), (4, 0));
    assert_eq!(rejection(&alice.drain()), Some("PIECE_ON_COOLDOWN"));

    h.advance(1_500);
    h.make_move(&alice, game_id, (5, 0), (4, 0));
    assert_eq!(rejection(&alice.drain()), None);
}

#[test]
fn test_request_state_and_unknown_game() {
    let h = Harness::new(ServerConfig::default());
    let (mut alice, _bob, game_id) = h.matched_pair();

    h.send(&alice, ClientCommand::RequestGameState { game_id });
    assert_eq!(last_state(&alice.drain()).unwrap().id, game_id);

    let missing = GameId::new();
    h.send(&alice, ClientCommand::RequestGameState { game_id: missing });
    assert_eq!(
        alice.drain(),
        vec![ServerEvent::error(Some(missing), "GAME_NOT_FOUND")]
    );
}

#[test]
fn test_malformed_message() {
    let h = Harness::new(ServerConfig::default());
    let mut alice = h.connect("alice", 1500);
    h.state.handle_text(alice.conn, r#"{"type":"makeMove","gameId":"nope"}"#);
    assert_eq!(alice.drain(), vec![ServerEvent::error(None, "MALFORMED_MESSAGE")]);
}

#[test]
fn test_racing_moves_resolved_by_admission_order() {
    let h = Harness::new(rook_duel());
    let (mut alice, mut bob, game_id) = h.matched_pair();

    let state = &h.state;
    let (white, black) = (alice.conn, bob.conn);
    let rook_move = |from: (i8, i8), to: (i8, i8)| ClientCommand::MakeMove {
        game_id,
        from_row: from.0,
        from_col: from.1,
        to_row: to.0,
        to_col: to.1,
    };
    std::thread::scope(|s| {
        s.spawn(|| state.handle(white, rook_move((4, 0), (4, 7))));
        s.spawn(|| state.handle(black, rook_move((4, 7), (4, 0))));
    });

    let alice_events = alice.drain();
    let bob_events = bob.drain();
    let accepted = [&alice_events, &bob_events]
        .iter()
        .filter(|events| events.iter().any(|e| matches!(e, ServerEvent::MoveAccepted { .. })))
        .count();
    assert_eq!(accepted, 1);

    let loser = if rejection(&alice_events).is_some() {
        &alice_events
    } else {
        &bob_events
    };
    assert_eq!(rejection(loser), Some("NO_PIECE_AT_SOURCE"));
}

// ============================================================================
// GAME END
// ============================================================================

#[test]
fn test_king_capture_ends_game_and_archives() {
    let mut h = Harness::new(custom_config(vec![
        Placement::new(PieceKind::King, Color::White, 7, 4),
        Placement::new(PieceKind::King, Color::Black, 0, 0),
        Placement::new(PieceKind::Queen, Color::Black, 0, 4),
    ]));
    let (mut alice, mut bob, game_id) = h.matched_pair();

    h.make_move(&bob, game_id, (0, 4), (7, 4));

    for events in [alice.drain(), bob.drain()] {
        let ended = events.iter().find_map(|e| match e {
            ServerEvent::GameEnded { winner, reason, state, .. } => Some((*winner, *reason, state)),
            _ => None,
        });
        let (winner, reason, state) = ended.expect("gameEnded");
        assert_eq!(winner, Some(Color::Black));
        assert_eq!(reason, Some(EndReason::KingCaptured));
        assert_eq!(state.status, GameStatus::Finished);
    }

    assert!(!h.state.sessions.contains(game_id));
    let record = h.archive.try_recv().unwrap();
    assert_eq!(record.game_id, game_id);
    assert_eq!(record.rating_change.black, 16);
}

#[test]
fn test_resign_and_draw() {
    let mut h = Harness::new(ServerConfig::default());
    let (mut alice, mut bob, game_id) = h.matched_pair();

    h.send(&alice, ClientCommand::OfferDraw { game_id });
    assert!(bob.drain().contains(&ServerEvent::DrawOffered {
        game_id,
        by: Color::White
    }));
    h.send(&bob, ClientCommand::RespondDraw { game_id, accept: false });
    assert!(alice.drain().contains(&ServerEvent::DrawDeclined { game_id }));

    h.send(&bob, ClientCommand::Resign { game_id });
    let events = alice.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        ServerEvent::GameEnded { winner: Some(Color::White), reason: Some(EndReason::Resignation), .. }
    )));
    assert_eq!(h.archive.try_recv().unwrap().end_reason, EndReason::Resignation);

    // both players are free again
    assert!(h.state.sessions.game_of(&surge_core::PlayerId::new("alice")).is_none());
}

// ============================================================================
// DISCONNECTS
// ============================================================================

#[test]
fn test_disconnect_pauses_and_reconnect_resyncs() {
    let h = Harness::new(ServerConfig::default());
    let (mut alice, bob, game_id) = h.matched_pair();

    h.state.disconnect(bob.conn);
    assert_eq!(last_state(&alice.drain()).unwrap().status, GameStatus::Paused);

    h.make_move(&alice, game_id, (6, 0), (5, 0));
    assert_eq!(rejection(&alice.drain()), Some("GAME_NOT_ACTIVE"));

    h.advance(5_000);
    let mut bob = h.connect("bob", 1500);
    let resync = last_state(&bob.drain()).cloned().unwrap();
    assert_eq!(resync.status, GameStatus::Active);
    // energy kept accruing while paused
    assert_eq!(resync.black_state.energy(), 4.0 + 2.5);
    assert_eq!(last_state(&alice.drain()).unwrap().status, GameStatus::Active);

    h.make_move(&bob, game_id, (1, 0), (2, 0));
    assert_eq!(rejection(&bob.drain()), None);
}

#[test]
fn test_grace_period_forfeit() {
    let mut h = Harness::new(ServerConfig::default());
    let (mut alice, bob, game_id) = h.matched_pair();

    h.state.disconnect(bob.conn);
    alice.drain();

    h.advance(29_999);
    h.state.housekeeping();
    assert!(h.state.sessions.contains(game_id));

    h.advance(1);
    h.state.housekeeping();
    assert!(alice.drain().iter().any(|e| matches!(
        e,
        ServerEvent::GameEnded { winner: Some(Color::White), reason: Some(EndReason::Forfeit), .. }
    )));
    assert!(!h.state.sessions.contains(game_id));
    assert_eq!(h.archive.try_recv().unwrap().end_reason, EndReason::Forfeit);
}

#[test]
fn test_second_connection_takes_over_seat() {
    let h = Harness::new(ServerConfig::default());
    let (mut alice, _bob, game_id) = h.matched_pair();

    let mut alice2 = h.connect("alice", 1500);
    assert!(last_state(&alice2.drain()).is_some());

    // the stale connection closing must not vacate the seat
    h.state.disconnect(alice.conn);
    h.make_move(&alice2, game_id, (6, 0), (5, 0));
    assert_eq!(rejection(&alice2.drain()), None);
    assert!(alice.drain().iter().all(|e| !matches!(e, ServerEvent::MoveAccepted { .. })));
}
