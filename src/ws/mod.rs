pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::app::AppState;
use crate::broadcast::Delivery;
use crate::error::GameError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::room::{actor::Command, GameHandle};
use crate::types::ConnId;

/// One WebSocket connection and the game it currently talks to
pub struct Session {
    pub conn: ConnId,
    game: Option<GameHandle>,
    deliveries: Option<broadcast::Receiver<Arc<Delivery>>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            conn: ulid::Ulid::new().to_string(),
            game: None,
            deliveries: None,
        }
    }

    pub fn game(&self) -> Option<&GameHandle> {
        self.game.as_ref()
    }

    /// Point this connection at `handle`. Leaves the previous game if it
    /// was a different one. Subscribes before any command is sent so no
    /// reply can be missed.
    pub async fn enter(&mut self, handle: GameHandle) {
        if self.game.as_ref().is_some_and(|g| g.code == handle.code) {
            return;
        }
        self.leave().await;
        self.deliveries = Some(handle.subscribe());
        self.game = Some(handle);
    }

    /// Tell the current game this connection is gone and stop listening to it
    pub async fn leave(&mut self) {
        self.deliveries = None;
        if let Some(game) = self.game.take() {
            let _ = game
                .send(Command::Disconnect {
                    conn: self.conn.clone(),
                })
                .await;
        }
    }

    /// Next message addressed to this connection. Pends while not in a game.
    /// Falling behind the game's delivery buffer triggers a resync.
    pub async fn next_message(&mut self) -> ServerMessage {
        loop {
            let delivery = match self.deliveries.as_mut() {
                Some(rx) => rx.recv().await,
                None => std::future::pending().await,
            };
            match delivery {
                Ok(delivery) if delivery.is_for(&self.conn) => return delivery.msg.clone(),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Connection {} lagged, skipped {} messages", self.conn, skipped);
                    // Skipped deliveries are gone, ask for the whole state again
                    if let Some(game) = self.game.as_ref() {
                        let _ = game
                            .send(Command::Resync {
                                conn: self.conn.clone(),
                            })
                            .await;
                    }
                }
                Err(RecvError::Closed) => {
                    self.deliveries = None;
                    self.game = None;
                }
            }
        }
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn is_fatal(msg: &ServerMessage) -> bool {
    matches!(msg, ServerMessage::Error(payload) if payload.fatal)
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut session = Session::new();

    tracing::info!("WebSocket connected: {}", session.conn);

    loop {
        tokio::select! {
            // Deliveries of the game this connection is in
            msg = session.next_message() => {
                if let Ok(json) = serde_json::to_string(&msg) {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                if is_fatal(&msg) {
                    session.leave().await;
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message from {}: {}", session.conn, text);

                        let response = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                handlers::handle_message(client_msg, &mut session, &state).await
                            }
                            Err(e) => {
                                tracing::warn!("Failed to parse client message: {}", e);
                                Some(GameError::BadRequest(e.to_string()).into())
                            }
                        };

                        if let Some(response) = response {
                            if let Ok(json) = serde_json::to_string(&response) {
                                if sender.send(Message::Text(json.into())).await.is_err() {
                                    tracing::error!("Failed to send response");
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    session.leave().await;
    state.chat_limiter.forget(&session.conn).await;
    tracing::info!("WebSocket connection closed: {}", session.conn);
}
