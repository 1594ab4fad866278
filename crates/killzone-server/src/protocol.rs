//! WebSocket protocol messages for hosted Killzone matches.

use killzone_core::{MatchEvent, MatchRecord, MatchState, Side};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Create a new room, seating the creator on `side`
    CreateRoom { player_name: String, side: Side },

    /// Join an existing room, on `side` or else on whichever side is free
    JoinRoom {
        room_id: Uuid,
        player_name: String,
        #[serde(default)]
        side: Option<Side>,
    },

    /// Leave current room
    LeaveRoom,

    /// Start the match (host only); the seed defaults to the server's
    StartMatch {
        #[serde(default)]
        seed: Option<u64>,
    },

    /// Submit an action for the seated side; `null` passes
    SubmitAction { action: serde_json::Value },

    /// Ask for the current match state
    RequestState,

    /// Request room list
    ListRooms,

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Welcome message with assigned player ID
    Welcome { player_id: Uuid },

    /// Room created successfully
    RoomCreated { room_id: Uuid },

    /// Joined room successfully
    JoinedRoom { room: RoomInfo },

    /// Left room successfully
    LeftRoom,

    /// Room state updated (player joined/left)
    RoomUpdated { room: RoomInfo },

    /// Match started
    MatchStarted { state: MatchState },

    /// Match state updated
    MatchState { state: MatchState },

    /// Outcome of a submitted action, including any automatic turns it triggered
    ActionResult {
        success: bool,
        events: Vec<MatchEvent>,
        error: Option<String>,
    },

    /// The side to play changed
    TurnChanged { side: Side },

    /// List of rooms waiting for players
    RoomList { rooms: Vec<RoomInfo> },

    /// Error occurred
    Error { message: String },

    /// Pong response
    Pong,

    /// Match finished, with the full replayable record; no winner on a draw
    MatchOver {
        attacker_score: u32,
        defender_score: u32,
        winner: Option<Side>,
        record: MatchRecord,
    },
}

/// Room information for clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: Uuid,
    pub name: String,
    pub players: Vec<PlayerInfo>,
    pub host_id: Uuid,
    pub status: RoomStatus,
}

/// Player information in a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: Uuid,
    pub name: String,
    pub side: Side,
    pub connected: bool,
}

/// Room status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Waiting,
    InMatch,
    Finished,
}
