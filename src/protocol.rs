//! Wire events. Every frame is a JSON text message of the form
//! `{"event": "<name>", "data": <payload>}`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub room: String,
    pub username: String,
    pub message: String,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Inbound {
    CreateRoom {
        #[serde(rename = "roomCode")]
        room_code: String,
    },
    JoinRoom {
        #[serde(rename = "roomCode")]
        room_code: String,
    },
    SendMessage {
        message: String,
        room: String,
    },
    Typing {
        room: String,
        #[serde(default)]
        username: Option<String>,
    },
    StopTyping {
        room: String,
        #[serde(default)]
        username: Option<String>,
    },
    DeleteRoom(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRequest,
    NotAuthorized,
    RoomMissing,
    StoreUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Outbound {
    RoomExists,
    RoomCreated {
        #[serde(rename = "roomCode")]
        room_code: String,
        #[serde(rename = "isAdmin")]
        is_admin: bool,
    },
    RoomNotFound,
    PreviousMessages(Vec<ChatMessage>),
    JoinedRoom {
        #[serde(rename = "isAdmin")]
        is_admin: bool,
    },
    UpdateUsers(Vec<String>),
    ReceiveMessage(ChatMessage),
    UserTyping {
        username: String,
    },
    UserStoppedTyping {
        username: String,
    },
    RoomDeleted,
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl Outbound {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Outbound::Error { kind, message: message.into() }
    }
}
