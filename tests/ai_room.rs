mod common;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use common::{chat, chat_with, Client, AI_ROOM};
use parley::{
    ai::{Gemini, Responder, AI_BOT_NAME, FALLBACK_REPLY},
    protocol::{ChatMessage, Inbound, Outbound},
};
use tokio::sync::Notify;

/// Holds each prompt's reply until the test releases it.
#[derive(Default)]
struct Gated {
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl Gated {
    fn gate(&self, prompt: &str) -> Arc<Notify> {
        self.gates.lock().unwrap().entry(prompt.to_owned()).or_default().clone()
    }

    fn release(&self, prompt: &str) {
        self.gate(prompt).notify_one();
    }
}

#[async_trait]
impl Responder for Gated {
    async fn reply(&self, prompt: &str) -> String {
        let gate = self.gate(prompt);
        gate.notified().await;
        format!("re: {prompt}")
    }
}

fn message(event: Outbound) -> ChatMessage {
    match event {
        Outbound::ReceiveMessage(msg) => msg,
        other => panic!("expected receive_message, got {other:?}"),
    }
}

#[tokio::test]
async fn hello_gets_an_echo_then_a_bot_reply() {
    let chat = chat().await;
    let mut alice = Client::connect(&chat, "Alice");
    alice.join(&chat, AI_ROOM).await;
    alice.drain();

    alice.say(&chat, AI_ROOM, "hello").await;

    let events = alice.drain();
    assert_eq!(events.len(), 2);
    let echo = message(events[0].clone());
    let reply = message(events[1].clone());

    assert_eq!((echo.room.as_str(), echo.username.as_str(), echo.message.as_str()), (AI_ROOM, "Alice", "hello"));
    assert_eq!((reply.room.as_str(), reply.username.as_str(), reply.message.as_str()), (AI_ROOM, AI_BOT_NAME, "you said: hello"));
    assert!(chat.db().messages(AI_ROOM).await.unwrap().is_empty());
}

#[tokio::test]
async fn failing_responder_still_answers_and_persists_nothing() {
    let gemini = Gemini::new(None, "gemini-2.0-flash").unwrap();
    let chat = chat_with(Arc::new(gemini)).await;
    let mut alice = Client::connect(&chat, "Alice");
    alice.join(&chat, AI_ROOM).await;
    alice.drain();

    alice.say(&chat, AI_ROOM, "are you there?").await;

    let events = alice.drain();
    assert_eq!(events.len(), 2);
    assert_eq!(message(events[1].clone()).message, FALLBACK_REPLY);
    assert!(chat.db().messages(AI_ROOM).await.unwrap().is_empty());

    // Joining later replays no AI history.
    let mut bob = Client::connect(&chat, "Bob");
    bob.join(&chat, AI_ROOM).await;
    assert_eq!(bob.drain()[0], Outbound::PreviousMessages(vec![]));
}

#[tokio::test]
async fn ai_traffic_stays_in_the_ai_room() {
    let chat = chat().await;
    let mut alice = Client::connect(&chat, "Alice");
    let mut bob = Client::connect(&chat, "Bob");
    alice.join(&chat, AI_ROOM).await;
    bob.create(&chat, "abc123").await;
    alice.drain();
    bob.drain();

    alice.say(&chat, AI_ROOM, "just us?").await;

    assert_eq!(alice.drain().len(), 2);
    assert!(bob.drain().is_empty());
}

#[tokio::test]
async fn pipeline_stages_can_be_driven_separately() {
    let chat = chat().await;
    let mut alice = Client::connect(&chat, "Alice");
    alice.join(&chat, AI_ROOM).await;
    alice.drain();

    let pending = chat.router().echo(&alice.me, "step by step".to_owned());
    assert_eq!(pending.prompt(), "step by step");
    assert_eq!(message(alice.drain().remove(0)).username, "Alice");

    let reply = chat.router().answer(pending).await;
    assert_eq!(reply.username, AI_BOT_NAME);
    assert_eq!(alice.drain(), [Outbound::ReceiveMessage(reply)]);
}

#[tokio::test]
async fn concurrent_ai_exchanges_interleave() {
    let gated = Arc::new(Gated::default());
    let chat = chat_with(gated.clone()).await;
    let alice = Client::connect(&chat, "Alice");
    let bob = Client::connect(&chat, "Bob");
    let mut carol = Client::connect(&chat, "Carol");
    for client in [&alice, &bob, &carol] {
        client.join(&chat, AI_ROOM).await;
    }
    carol.drain();

    let first = tokio::spawn({
        let (chat, me) = (chat.clone(), alice.me.clone());
        async move {
            chat.handle(&me, Inbound::SendMessage { message: "first".to_owned(), room: AI_ROOM.to_owned() }).await
        }
    });
    assert_eq!(message(carol.outbox.recv().await.unwrap()).message, "first");

    let second = tokio::spawn({
        let (chat, me) = (chat.clone(), bob.me.clone());
        async move {
            chat.handle(&me, Inbound::SendMessage { message: "second".to_owned(), room: AI_ROOM.to_owned() }).await
        }
    });
    assert_eq!(message(carol.outbox.recv().await.unwrap()).message, "second");

    gated.release("second");
    let reply = message(carol.outbox.recv().await.unwrap());
    assert_eq!((reply.username.as_str(), reply.message.as_str()), (AI_BOT_NAME, "re: second"));
    second.await.unwrap();

    gated.release("first");
    let reply = message(carol.outbox.recv().await.unwrap());
    assert_eq!((reply.username.as_str(), reply.message.as_str()), (AI_BOT_NAME, "re: first"));
    first.await.unwrap();

    assert!(carol.drain().is_empty());
    assert!(chat.db().messages(AI_ROOM).await.unwrap().is_empty());
}
