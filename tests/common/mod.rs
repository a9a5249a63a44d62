#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use parley::{
    ai::{Responder, AI_BOT_NAME},
    auth::Identity,
    db::{Db, Room},
    protocol::{Inbound, Outbound},
    rooms::{Chat, Outbox, Participant},
};

pub const AI_ROOM: &str = "ai-assistant";

/// Answers every prompt immediately.
pub struct Parrot;

#[async_trait]
impl Responder for Parrot {
    async fn reply(&self, prompt: &str) -> String {
        format!("you said: {prompt}")
    }
}

pub async fn chat_with(responder: Arc<dyn Responder>) -> Arc<Chat> {
    let db = Db::in_memory().await.unwrap();
    db.create_room(&Room {
        code: AI_ROOM.to_owned(),
        admin_id: "system".to_owned(),
        admin_name: AI_BOT_NAME.to_owned(),
    })
    .await
    .unwrap();

    Arc::new(Chat::new(db, responder, AI_ROOM))
}

pub async fn chat() -> Arc<Chat> {
    chat_with(Arc::new(Parrot)).await
}

pub fn identity(name: &str) -> Identity {
    Identity { name: name.to_owned(), email: format!("{}@example.com", name.to_lowercase()) }
}

pub struct Client {
    pub me: Participant,
    pub outbox: Outbox,
}

impl Client {
    pub fn connect(chat: &Chat, name: &str) -> Client {
        Client::connect_as(chat, identity(name))
    }

    pub fn connect_as(chat: &Chat, identity: Identity) -> Client {
        let (me, outbox) = chat.connect(identity);
        Client { me, outbox }
    }

    pub async fn send(&self, chat: &Chat, event: Inbound) {
        chat.handle(&self.me, event).await;
    }

    pub async fn create(&self, chat: &Chat, code: &str) {
        self.send(chat, Inbound::CreateRoom { room_code: code.to_owned() }).await;
    }

    pub async fn join(&self, chat: &Chat, code: &str) {
        self.send(chat, Inbound::JoinRoom { room_code: code.to_owned() }).await;
    }

    pub async fn say(&self, chat: &Chat, room: &str, text: &str) {
        self.send(chat, Inbound::SendMessage { message: text.to_owned(), room: room.to_owned() }).await;
    }

    pub async fn delete(&self, chat: &Chat, code: &str) {
        self.send(chat, Inbound::DeleteRoom(code.to_owned())).await;
    }

    pub fn leave(&self, chat: &Chat) {
        chat.disconnect(&self.me);
    }

    /// Everything delivered so far.
    pub fn drain(&mut self) -> Vec<Outbound> {
        std::iter::from_fn(|| self.outbox.try_recv().ok()).collect()
    }
}

pub fn users(names: &[&str]) -> Outbound {
    Outbound::UpdateUsers(names.iter().map(|name| name.to_string()).collect())
}
