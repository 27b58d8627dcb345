//! WebSocket message types for room synchronization
//!
//! Every frame is a JSON envelope `{"event": ..., "data": ...}`. Each
//! direction is a closed enum; anything that does not parse is a
//! validation error answered to the sender.

use serde::{Deserialize, Serialize};

use crate::models::{Card, GameConfig, HiddenSong, RankEntry, RoomView, TiePolicy, Vote};
use crate::services::registry::JoinRequest;

// =============================================================================
// Client -> Server Messages
// =============================================================================

/// Events sent from a client to the server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Take a seat, or observe when the identity is the host
    #[serde(rename = "join")]
    Join(JoinRequest),

    /// Host starts the game
    #[serde(rename = "start")]
    Start(StartRequest),

    /// Winner asks for a fresh game
    #[serde(rename = "newGameRequest")]
    NewGameRequest(NewGameRequest),

    /// Non-winner replay ballot
    #[serde(rename = "voteReplay")]
    VoteReplay(VoteReplayRequest),

    /// Heartbeat to keep the connection alive
    #[serde(rename = "ping")]
    Ping,
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::Start(_) => "start",
            Self::NewGameRequest(_) => "newGameRequest",
            Self::VoteReplay(_) => "voteReplay",
            Self::Ping => "ping",
        }
    }
}

/// Payload of `start`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub host_id: String,
    #[serde(default)]
    pub tie_policy: Option<TiePolicy>,
    #[serde(default)]
    pub playlist_id: Option<String>,
    #[serde(default)]
    pub playlist_name: Option<String>,
    #[serde(default)]
    pub min_year: Option<i32>,
    #[serde(default)]
    pub max_year: Option<i32>,
}

impl StartRequest {
    pub fn game_config(&self) -> GameConfig {
        GameConfig {
            playlist_id: self.playlist_id.clone(),
            playlist_name: self.playlist_name.clone(),
            tie_policy: self.tie_policy.unwrap_or_default(),
            min_year: self.min_year,
            max_year: self.max_year,
        }
    }
}

/// Payload of `newGameRequest`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGameRequest {
    pub player_id: String,
    #[serde(default)]
    pub playlist_id: Option<String>,
    #[serde(default)]
    pub target_points: Option<u32>,
}

/// Payload of `voteReplay`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReplayRequest {
    pub player_id: String,
    pub vote: Vote,
}

// =============================================================================
// Server -> Client Messages
// =============================================================================

/// Events sent from the server to every client of a room
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Full room snapshot
    #[serde(rename = "room:init")]
    RoomInit(RoomView),

    #[serde(rename = "turn:begin", rename_all = "camelCase")]
    TurnBegin {
        turn_id: String,
        current_player_id: String,
    },

    /// Drawn card revealed without its date
    #[serde(rename = "turn:play", rename_all = "camelCase")]
    TurnPlay {
        turn_id: String,
        player_id: String,
        song: HiddenSong,
    },

    /// Playback confirmed, placement accepted from now on
    #[serde(rename = "turn:placing", rename_all = "camelCase")]
    TurnPlacing { turn_id: String },

    #[serde(rename = "turn:result")]
    TurnResult(TurnResult),

    /// Game over; `winner_id` is `None` when the deck ran out
    #[serde(rename = "game:finish", rename_all = "camelCase")]
    GameFinish { winner_id: Option<String> },

    #[serde(rename = "gameOver", rename_all = "camelCase")]
    GameOver {
        ranking: Vec<RankEntry>,
        winner_id: Option<String>,
        target_points: u32,
    },

    #[serde(rename = "winnerDeciding", rename_all = "camelCase")]
    WinnerDeciding { winner_id: String },

    #[serde(rename = "newGameStarted", rename_all = "camelCase")]
    NewGameStarted {
        config: GameConfig,
        target_points: u32,
    },

    #[serde(rename = "voteStatus")]
    VoteStatus { yes: u32, no: u32, needed: u32 },

    #[serde(rename = "game:error")]
    GameError { message: String },

    /// Heartbeat response
    #[serde(rename = "pong", rename_all = "camelCase")]
    Pong { server_time: i64 },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::GameError {
            message: message.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::RoomInit(_) => "room:init",
            Self::TurnBegin { .. } => "turn:begin",
            Self::TurnPlay { .. } => "turn:play",
            Self::TurnPlacing { .. } => "turn:placing",
            Self::TurnResult(_) => "turn:result",
            Self::GameFinish { .. } => "game:finish",
            Self::GameOver { .. } => "gameOver",
            Self::WinnerDeciding { .. } => "winnerDeciding",
            Self::NewGameStarted { .. } => "newGameStarted",
            Self::VoteStatus { .. } => "voteStatus",
            Self::GameError { .. } => "game:error",
            Self::Pong { .. } => "pong",
        }
    }
}

/// Payload of `turn:result`; the card is revealed here
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResult {
    pub turn_id: String,
    pub player_id: String,
    pub correct: bool,
    pub final_index: usize,
    pub new_score: Option<u32>,
    pub card: Card,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_deserialization() {
        let raw = json!({ "event": "join", "data": { "id": "p1", "name": "Ann", "isHost": false } });
        let event: ClientEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(
            event,
            ClientEvent::Join(JoinRequest {
                id: "p1".into(),
                name: "Ann".into(),
                is_host: false
            })
        );
    }

    #[test]
    fn test_start_optional_fields() {
        let raw = json!({ "event": "start", "data": { "hostId": "host-1", "tiePolicy": "strict" } });
        let event: ClientEvent = serde_json::from_value(raw).unwrap();
        let ClientEvent::Start(start) = event else {
            panic!("expected start");
        };
        assert_eq!(start.host_id, "host-1");
        assert_eq!(start.game_config().tie_policy, TiePolicy::Strict);
        assert!(start.playlist_id.is_none());
    }

    #[test]
    fn test_vote_deserialization() {
        let raw = json!({ "event": "voteReplay", "data": { "playerId": "p1", "vote": "NO" } });
        let event: ClientEvent = serde_json::from_value(raw).unwrap();
        assert!(matches!(
            event,
            ClientEvent::VoteReplay(VoteReplayRequest { vote: Vote::No, .. })
        ));
    }

    #[test]
    fn test_ping_without_data() {
        let event: ClientEvent = serde_json::from_str(r#"{"event":"ping"}"#).unwrap();
        assert_eq!(event, ClientEvent::Ping);
        assert_eq!(event.name(), "ping");
    }

    #[test]
    fn test_unknown_event_rejected() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"cheat","data":{}}"#).is_err());
        assert!(serde_json::from_str::<ClientEvent>(r#"{"data":{}}"#).is_err());
        assert!(serde_json::from_str::<ClientEvent>("not json").is_err());
    }

    #[test]
    fn test_server_event_envelope_names() {
        let event = ServerEvent::TurnBegin {
            turn_id: "t-1".into(),
            current_player_id: "p1".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "turn:begin");
        assert_eq!(json["data"]["currentPlayerId"], "p1");
        assert_eq!(event.name(), "turn:begin");

        let json = serde_json::to_value(ServerEvent::VoteStatus {
            yes: 1,
            no: 0,
            needed: 2,
        })
        .unwrap();
        assert_eq!(json, json!({ "event": "voteStatus", "data": { "yes": 1, "no": 0, "needed": 2 } }));
    }

    #[test]
    fn test_game_error_envelope() {
        let json = serde_json::to_value(ServerEvent::error("not your turn")).unwrap();
        assert_eq!(json["event"], "game:error");
        assert_eq!(json["data"]["message"], "not your turn");
    }
}
