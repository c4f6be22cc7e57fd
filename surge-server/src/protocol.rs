//! Wire protocol
//!
//! JSON objects tagged by `type`. Game state always travels as a full
//! `GameState` snapshot; there is no diff format.

use serde::{Deserialize, Serialize};
use surge_core::{Color, EndReason, GameId, GameState, MoveRecord, PlayerId};

/// Client -> server
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    RequestMatchmaking,
    CancelMatchmaking,
    MatchmakingStatus,
    CreateRoom,
    JoinRoom {
        code: String,
    },
    CancelRoom,
    StartGame {
        game_id: GameId,
    },
    MakeMove {
        game_id: GameId,
        from_row: i8,
        from_col: i8,
        to_row: i8,
        to_col: i8,
    },
    SpectateGame {
        game_id: GameId,
    },
    LeaveGame {
        game_id: GameId,
    },
    RequestGameState {
        game_id: GameId,
    },
    Resign {
        game_id: GameId,
    },
    OfferDraw {
        game_id: GameId,
    },
    RespondDraw {
        game_id: GameId,
        accept: bool,
    },
}

impl ClientCommand {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Server -> client
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    MatchmakingStarted {
        queue_size: usize,
    },
    MatchFound {
        game_id: GameId,
        color: Color,
    },
    MatchmakingError {
        reason: String,
    },
    MatchmakingCancelled,
    MatchmakingStatus {
        in_queue: bool,
        queue_size: usize,
    },
    RoomCreated {
        code: String,
    },
    RoomJoined {
        game_id: GameId,
        code: String,
    },
    PlayerJoined {
        game_id: GameId,
        user_id: PlayerId,
    },
    RoomError {
        reason: String,
    },
    RoomCancelled {
        code: String,
    },
    GameWaiting {
        game_id: GameId,
    },
    GameStarted {
        game_id: GameId,
        state: Box<GameState>,
    },
    GameStateUpdate {
        state: Box<GameState>,
    },
    MoveAccepted {
        game_id: GameId,
        #[serde(rename = "move")]
        record: MoveRecord,
    },
    MoveRejected {
        game_id: GameId,
        reason: String,
    },
    DrawOffered {
        game_id: GameId,
        by: Color,
    },
    DrawDeclined {
        game_id: GameId,
    },
    GameEnded {
        game_id: GameId,
        winner: Option<Color>,
        reason: Option<EndReason>,
        state: Box<GameState>,
    },
    GameAborted {
        game_id: GameId,
        reason: String,
    },
    /// Rejection of a non-move command, or an unreadable message
    Error {
        game_id: Option<GameId>,
        reason: String,
    },
}

impl ServerEvent {
    pub fn state_update(state: GameState) -> Self {
        ServerEvent::GameStateUpdate {
            state: Box::new(state),
        }
    }

    pub fn error(game_id: Option<GameId>, reason: &str) -> Self {
        ServerEvent::Error {
            game_id,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_parse_make_move() {
        let id = GameId::new();
        let text = json!({
            "type": "makeMove",
            "gameId": id.to_string(),
            "fromRow": 6, "fromCol": 4, "toRow": 4, "toCol": 4
        })
        .to_string();
        assert_eq!(
            ClientCommand::parse(&text).unwrap(),
            ClientCommand::MakeMove {
                game_id: id,
                from_row: 6,
                from_col: 4,
                to_row: 4,
                to_col: 4,
            }
        );
    }

    #[test]
    fn test_parse_unit_commands() {
        assert_eq!(
            ClientCommand::parse(r#"{"type":"requestMatchmaking"}"#).unwrap(),
            ClientCommand::RequestMatchmaking
        );
        assert_eq!(
            ClientCommand::parse(r#"{"type":"joinRoom","code":"AB12CD"}"#).unwrap(),
            ClientCommand::JoinRoom { code: "AB12CD".into() }
        );
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        assert!(ClientCommand::parse(r#"{"type":"teleport"}"#).is_err());
        assert!(ClientCommand::parse("not json").is_err());
    }

    #[test]
    fn test_event_shape() {
        let event = ServerEvent::MatchmakingStatus {
            in_queue: true,
            queue_size: 3,
        };
        let value: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({"type": "matchmakingStatus", "inQueue": true, "queueSize": 3}));

        let value = serde_json::to_value(ServerEvent::MatchmakingCancelled).unwrap();
        assert_eq!(value, json!({"type": "matchmakingCancelled"}));
    }
}
