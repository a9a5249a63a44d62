use std::sync::Arc;

use crate::{
    db::{Db, Deletion, Room},
    protocol::Outbound,
};

use super::{Hub, Participant, Presence, RoomError};

/// Room lifecycle: absent, then active, then deleted (after which the code is
/// free again).
pub struct Rooms {
    db: Db,
    presence: Arc<Presence>,
    hub: Arc<Hub>,
}

impl Rooms {
    pub fn new(db: Db, presence: Arc<Presence>, hub: Arc<Hub>) -> Self {
        Self { db, presence, hub }
    }

    pub async fn create(&self, code: &str, who: &Participant) -> Result<(), RoomError> {
        let room = Room {
            code: code.to_owned(),
            admin_id: who.owner_key(),
            admin_name: who.name().to_owned(),
        };

        if !self.db.create_room(&room).await? {
            return Err(RoomError::AlreadyExists(room.code));
        }

        // A join racing the previous incarnation's delete can leave stale members behind.
        self.presence.clear(code);
        self.hub.evict_all(code);
        self.presence.add_member(code, who.connection, who.name());
        self.hub.join(code, who.connection);
        self.hub.emit(who.connection, Outbound::RoomCreated { room_code: room.code, is_admin: true });

        tracing::info!(room = code, admin = %who.name(), "room created");
        Ok(())
    }

    pub async fn join(&self, code: &str, who: &Participant) -> Result<(), RoomError> {
        let Some(room) = self.db.find_room(code).await? else {
            return Err(RoomError::NotFound(code.to_owned()));
        };
        let history = self.db.messages(code).await?;

        self.presence.add_member(code, who.connection, who.name());
        self.hub.join(code, who.connection);

        self.hub.emit(who.connection, Outbound::PreviousMessages(history));
        self.hub.emit(who.connection, Outbound::JoinedRoom { is_admin: room.admin_id == who.owner_key() });
        self.hub.broadcast(code, Outbound::UpdateUsers(self.presence.list_names(code)));

        tracing::info!(room = code, user = %who.name(), "joined room");
        Ok(())
    }

    /// Deleting a room that does not exist is a no-op.
    pub async fn delete(&self, code: &str, who: &Participant) -> Result<(), RoomError> {
        match self.db.delete_room(code, &who.owner_key()).await? {
            Deletion::Missing => {
                tracing::debug!(room = code, "delete of missing room ignored");
                Ok(())
            }
            Deletion::NotOwner => Err(RoomError::NotAuthorized(code.to_owned())),
            Deletion::Deleted => {
                self.presence.clear(code);
                self.hub.broadcast(code, Outbound::RoomDeleted);
                self.hub.evict_all(code);

                tracing::info!(room = code, admin = %who.name(), "room deleted");
                Ok(())
            }
        }
    }
}
