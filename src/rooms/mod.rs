//! Room and session coordination.
//!
//! [`Chat`] owns the process-local state (presence and broadcast groups) and
//! hands it to the lifecycle controller ([`Rooms`]) and the [`MessageRouter`].
//! Each is constructed once at startup, so tests can build a fresh one per case.

mod hub;
mod msg;
mod presence;
mod room;
mod ws;

use std::sync::Arc;

use axum::{routing::get, Router};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    ai::Responder,
    auth::Identity,
    db::Db,
    protocol::{ErrorKind, Inbound, Outbound},
    AppState,
};

pub use hub::{Hub, Outbox, OUTBOX_CAPACITY};
pub use msg::{MessageRouter, PendingReply, Stamp};
pub use presence::{Presence, PresenceEntry};
pub use room::Rooms;

pub const USER_OWNER_PREFIX: &str = "user:";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::room_ws))
}

/// One authenticated connection.
#[derive(Debug, Clone)]
pub struct Participant {
    pub connection: Uuid,
    pub identity: Identity,
}

impl Participant {
    pub fn new(identity: Identity) -> Self {
        Self { connection: Uuid::now_v7(), identity }
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    /// Ownership is keyed on the durable identity, so it survives reconnects.
    /// The prefix keeps user keys apart from system owners such as the AI room's.
    pub fn owner_key(&self) -> String {
        format!("{USER_OWNER_PREFIX}{}", self.identity.email)
    }
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("room {0} already exists")]
    AlreadyExists(String),
    #[error("room {0} not found")]
    NotFound(String),
    #[error("only the admin of room {0} may delete it")]
    NotAuthorized(String),
    #[error("messages cannot be sent to missing room {0}")]
    Missing(String),
    #[error("store unavailable: {0}")]
    Store(#[from] sqlx::Error),
}

impl RoomError {
    /// What the requester is told.
    pub fn reply(&self) -> Outbound {
        match self {
            RoomError::AlreadyExists(_) => Outbound::RoomExists,
            RoomError::NotFound(_) => Outbound::RoomNotFound,
            RoomError::NotAuthorized(_) => Outbound::error(ErrorKind::NotAuthorized, self.to_string()),
            RoomError::Missing(_) => Outbound::error(ErrorKind::RoomMissing, self.to_string()),
            RoomError::Store(_) => Outbound::error(ErrorKind::StoreUnavailable, "the message store is unavailable, try again"),
        }
    }
}

pub struct Chat {
    db: Db,
    presence: Arc<Presence>,
    hub: Arc<Hub>,
    rooms: Rooms,
    router: MessageRouter,
}

impl Chat {
    pub fn new(db: Db, responder: Arc<dyn Responder>, ai_room: impl Into<String>) -> Self {
        let presence = Arc::new(Presence::new());
        let hub = Arc::new(Hub::new());

        Self {
            rooms: Rooms::new(db.clone(), presence.clone(), hub.clone()),
            router: MessageRouter::new(db.clone(), hub.clone(), responder, ai_room),
            db,
            presence,
            hub,
        }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// Registers a freshly authenticated connection and returns its outbox.
    pub fn connect(&self, identity: Identity) -> (Participant, Outbox) {
        let participant = Participant::new(identity);
        let outbox = self.hub.connect(participant.connection);
        tracing::info!(connection = %participant.connection, user = %participant.name(), "connected");
        (participant, outbox)
    }

    /// Parses and handles one text frame.
    pub async fn handle_frame(&self, who: &Participant, frame: &str) {
        match serde_json::from_str::<Inbound>(frame) {
            Ok(event) => self.handle(who, event).await,
            Err(err) => {
                tracing::debug!(connection = %who.connection, error = %err, "unparseable frame");
                self.hub.emit(who.connection, Outbound::error(ErrorKind::BadRequest, err.to_string()));
            }
        }
    }

    pub async fn handle(&self, who: &Participant, event: Inbound) {
        let outcome = match event {
            Inbound::CreateRoom { room_code } => self.rooms.create(&room_code, who).await,
            Inbound::JoinRoom { room_code } => self.rooms.join(&room_code, who).await,
            Inbound::DeleteRoom(room_code) => self.rooms.delete(&room_code, who).await,
            Inbound::SendMessage { message, room } => self.router.send(&room, who, message).await,
            Inbound::Typing { room, .. } => {
                self.typing(&room, who, true);
                Ok(())
            }
            Inbound::StopTyping { room, .. } => {
                self.typing(&room, who, false);
                Ok(())
            }
        };

        if let Err(err) = outcome {
            match &err {
                RoomError::Store(_) => tracing::error!(connection = %who.connection, error = %err, "request failed"),
                _ => tracing::debug!(connection = %who.connection, error = %err, "request refused"),
            }
            self.hub.emit(who.connection, err.reply());
        }
    }

    fn typing(&self, room: &str, who: &Participant, typing: bool) {
        let username = who.name().to_owned();
        tracing::debug!(room, user = %username, typing, "typing");

        let event = if typing {
            Outbound::UserTyping { username }
        } else {
            Outbound::UserStoppedTyping { username }
        };
        self.hub.broadcast_except(room, who.connection, event);
    }

    /// The only cleanup path for a connection.
    pub fn disconnect(&self, who: &Participant) {
        let rooms = self.presence.remove_member(who.connection);
        self.hub.disconnect(who.connection);

        for room in rooms {
            self.hub.broadcast(&room, Outbound::UpdateUsers(self.presence.list_names(&room)));
        }
        tracing::info!(connection = %who.connection, user = %who.name(), "disconnected");
    }
}
