// Wire protocol: one JSON object per WebSocket text frame, discriminated by `type`.

use serde::{Deserialize, Deserializer, Serialize};

use super::coin::Coin;
use super::player::{PlayerMap, SessionId};

/// Intents sent by clients.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Join {
        #[serde(deserialize_with = "string_or_number")]
        id: SessionId,
        #[serde(default)]
        name: String,
    },
    StartGame {
        #[serde(deserialize_with = "string_or_number")]
        id: SessionId,
    },
    Restart {
        #[serde(deserialize_with = "string_or_number")]
        id: SessionId,
    },
    Move {
        #[serde(deserialize_with = "string_or_number")]
        id: SessionId,
        x: f64,
        y: f64,
    },
    Pickup {
        #[serde(deserialize_with = "string_or_number")]
        id: SessionId,
        #[serde(rename = "coinId", deserialize_with = "string_or_number")]
        coin_id: String,
    },
    Pause {
        #[serde(deserialize_with = "string_or_number")]
        id: SessionId,
    },
    Resume {
        #[serde(deserialize_with = "string_or_number")]
        id: SessionId,
    },
    Quit {
        #[serde(deserialize_with = "string_or_number")]
        id: SessionId,
    },
}

impl ClientMessage {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The session id the sender claims to act as.
    pub fn session_id(&self) -> &str {
        match self {
            ClientMessage::Join { id, .. }
            | ClientMessage::StartGame { id }
            | ClientMessage::Restart { id }
            | ClientMessage::Move { id, .. }
            | ClientMessage::Pickup { id, .. }
            | ClientMessage::Pause { id }
            | ClientMessage::Resume { id }
            | ClientMessage::Quit { id } => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Join { .. } => "join",
            ClientMessage::StartGame { .. } => "startGame",
            ClientMessage::Restart { .. } => "restart",
            ClientMessage::Move { .. } => "move",
            ClientMessage::Pickup { .. } => "pickup",
            ClientMessage::Pause { .. } => "pause",
            ClientMessage::Resume { .. } => "resume",
            ClientMessage::Quit { .. } => "quit",
        }
    }
}

/// Browser clients generate ids with `Date.now()`, which may arrive as a number.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Float(f64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(f) => f.to_string(),
    })
}

/// Menu notifications relayed to every client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuAction {
    Pause,
    Resume,
    Quit,
    Restart,
}

/// Messages pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Lobby {
        players: PlayerMap,
        #[serde(rename = "leaderId")]
        leader_id: Option<SessionId>,
    },
    /// Snapshot for a session that reattaches while a game is running.
    Rejoin {
        players: PlayerMap,
        #[serde(rename = "leaderId")]
        leader_id: Option<SessionId>,
        coins: Vec<Coin>,
        #[serde(rename = "gameTime")]
        game_time: u32,
    },
    Players {
        players: PlayerMap,
    },
    Coins {
        coins: Vec<Coin>,
    },
    GameStart {
        coins: Vec<Coin>,
        #[serde(rename = "gameTime")]
        game_time: u32,
        background: String,
    },
    GameOver {
        players: PlayerMap,
    },
    TimerUpdate {
        #[serde(rename = "gameTime")]
        game_time: u32,
    },
    SpeedBoost {
        id: SessionId,
        duration: u64,
    },
    MenuAction {
        action: MenuAction,
        name: String,
    },
    Error {
        message: String,
    },
    #[serde(rename = "clear-error")]
    ClearError,
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
