use std::sync::Arc;

use time::{format_description::BorrowedFormatItem, macros::format_description, OffsetDateTime};

use crate::{
    ai::{Responder, AI_BOT_NAME},
    db::Db,
    protocol::{ChatMessage, Outbound},
};

use super::{Hub, Participant, RoomError};

const TIME_OF_DAY: &[BorrowedFormatItem<'_>] =
    format_description!("[hour repr:12 padding:none]:[minute]:[second] [period]");

/// The moment a message was sent: the rendered time of day that goes on the
/// wire, and epoch milliseconds for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    pub time: String,
    pub epoch_ms: i64,
}

impl Stamp {
    pub fn now() -> Self {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        Self::at(now)
    }

    pub fn at(moment: OffsetDateTime) -> Self {
        Self {
            time: moment.format(TIME_OF_DAY).unwrap_or_else(|_| moment.time().to_string()),
            epoch_ms: (moment.unix_timestamp_nanos() / 1_000_000) as i64,
        }
    }
}

/// Second stage of an AI exchange: the user's message has been echoed and the
/// responder has not been asked yet.
#[derive(Debug)]
pub struct PendingReply {
    room: String,
    prompt: String,
}

impl PendingReply {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

pub struct MessageRouter {
    db: Db,
    hub: Arc<Hub>,
    responder: Arc<dyn Responder>,
    ai_room: String,
}

impl MessageRouter {
    pub fn new(db: Db, hub: Arc<Hub>, responder: Arc<dyn Responder>, ai_room: impl Into<String>) -> Self {
        Self { db, hub, responder, ai_room: ai_room.into() }
    }

    pub async fn send(&self, room: &str, who: &Participant, text: String) -> Result<(), RoomError> {
        if room == self.ai_room {
            let pending = self.echo(who, text);
            self.answer(pending).await;
            return Ok(());
        }

        let stamp = Stamp::now();
        let msg = ChatMessage {
            room: room.to_owned(),
            username: who.name().to_owned(),
            message: text,
            time: stamp.time,
        };

        if !self.db.insert_message(&msg, stamp.epoch_ms).await? {
            return Err(RoomError::Missing(room.to_owned()));
        }

        self.hub.broadcast(room, Outbound::ReceiveMessage(msg));
        Ok(())
    }

    /// Stage one of the AI path: broadcast the user's own message. Nothing is
    /// persisted.
    pub fn echo(&self, who: &Participant, text: String) -> PendingReply {
        let msg = ChatMessage {
            room: self.ai_room.clone(),
            username: who.name().to_owned(),
            message: text.clone(),
            time: Stamp::now().time,
        };
        self.hub.broadcast(&self.ai_room, Outbound::ReceiveMessage(msg));

        PendingReply { room: self.ai_room.clone(), prompt: text }
    }

    /// Stage two: ask the responder and broadcast its answer as the bot.
    /// Other senders' stages may run while this one awaits.
    pub async fn answer(&self, pending: PendingReply) -> ChatMessage {
        let reply = self.responder.reply(&pending.prompt).await;

        let msg = ChatMessage {
            room: pending.room,
            username: AI_BOT_NAME.to_owned(),
            message: reply,
            time: Stamp::now().time,
        };
        self.hub.broadcast(&msg.room, Outbound::ReceiveMessage(msg.clone()));
        msg
    }
}
