use std::sync::Arc;

use axum::{debug_handler, extract::{ws::{Message, WebSocket}, Query, State, WebSocketUpgrade}, http::HeaderMap, response::Response};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::{auth::{Gate, Identity}, AppResult};

use super::Chat;

#[derive(Deserialize)]
pub(crate) struct HandshakeQuery {
    token: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn room_ws(
    Query(HandshakeQuery { token }): Query<HandshakeQuery>,
    State(chat): State<Arc<Chat>>,
    State(gate): State<Gate>,
    headers: HeaderMap,

    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    gate.check_origin(&headers)?;

    let identity = match gate.admit(token, &headers).await {
        Ok(identity) => identity,
        Err(err) => {
            tracing::warn!(error = %err, "connection refused");
            return Err(err.into());
        }
    };

    Ok(ws.on_upgrade(move |stream| session(stream, chat, identity)))
}

async fn session(stream: WebSocket, chat: Arc<Chat>, identity: Identity) {
    let (me, mut outbox) = chat.connect(identity);
    let (mut sender, mut receiver) = stream.split();

    let mut writer = tokio::spawn(async move {
        while let Some(event) = outbox.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => chat.handle_frame(&me, text.as_str()).await,
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = &mut writer => break,
        }
    }

    writer.abort();
    chat.disconnect(&me);
}
