//! WebSocket message dispatch
//!
//! Turns client messages into game commands. Only game creation and failed
//! lookups are answered here; everything else comes back through the game's
//! delivery channel.

use crate::app::AppState;
use crate::error::GameError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::room::{actor::Command, GameHandle};
use crate::types::ConnId;

use super::Session;

/// Queue a command; a game that has already ended is reported to the sender
async fn forward(handle: &GameHandle, cmd: Command) -> Option<ServerMessage> {
    handle.send(cmd).await.err().map(ServerMessage::from)
}

/// Forward to the game this connection is in
async fn forward_current(
    session: &Session,
    make: impl FnOnce(ConnId) -> Command,
) -> Option<ServerMessage> {
    match session.game() {
        Some(handle) => forward(handle, make(session.conn.clone())).await,
        None => Some(GameError::UnknownIdentity.into()),
    }
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    session: &mut Session,
    state: &AppState,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::HostGame => {
            let (handle, host_token) = state.registry.create_game().await;
            let game_code = handle.code.clone();
            session.enter(handle).await;
            Some(ServerMessage::GameCreated {
                game_code,
                host_token,
            })
        }

        ClientMessage::JoinGame {
            game_code,
            username,
        } => {
            let Some(handle) = state.registry.get(&game_code).await else {
                return Some(GameError::RoomNotFound.into());
            };
            session.enter(handle.clone()).await;
            let cmd = Command::Join {
                conn: session.conn.clone(),
                username,
            };
            forward(&handle, cmd).await
        }

        ClientMessage::AnnounceInGame {
            game_code,
            host_token,
            username,
        } => {
            let Some(handle) = state.registry.get(&game_code).await else {
                tracing::info!("Announce for unknown game {}", game_code);
                return Some(GameError::RoomNotFound.into());
            };
            session.enter(handle.clone()).await;
            let cmd = Command::Announce {
                conn: session.conn.clone(),
                host_token,
                username,
            };
            forward(&handle, cmd).await
        }

        ClientMessage::TeacherSelectsQuestion { question_id } => {
            forward_current(session, |conn| Command::SelectQuestion { conn, question_id }).await
        }

        ClientMessage::HostNextRound => {
            forward_current(session, |conn| Command::NextRound { conn }).await
        }

        ClientMessage::HostEndGame => {
            forward_current(session, |conn| Command::EndGame { conn }).await
        }

        ClientMessage::PlayerSubmitAnswer { answer } => {
            forward_current(session, |conn| Command::SubmitAnswer {
                conn,
                answer: answer.into(),
            })
            .await
        }

        ClientMessage::PlayerSubmitVote { contestant_sid } => {
            forward_current(session, |conn| Command::SubmitVote {
                conn,
                contestant: contestant_sid,
            })
            .await
        }

        ClientMessage::SendMessage { message } => {
            if !state.chat_limiter.check(&session.conn).await {
                tracing::warn!("Chat rate limited for {}", session.conn);
                return Some(GameError::RateLimited.into());
            }
            forward_current(session, |conn| Command::Chat { conn, message }).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use std::time::Duration;

    fn app_state() -> AppState {
        let config = ServerConfig {
            bind_addr: ([127, 0, 0, 1], 0).into(),
            static_dir: "static".into(),
            questions_path: None,
            chat_rate_limit: 2,
            chat_rate_window: Duration::from_secs(60),
            game: Default::default(),
        };
        AppState::new(&config, crate::questions::default_bank())
    }

    #[tokio::test]
    async fn test_host_game_replies_with_code_and_token() {
        let state = app_state();
        let mut session = Session::new();

        match handle_message(ClientMessage::HostGame, &mut session, &state).await {
            Some(ServerMessage::GameCreated {
                game_code,
                host_token,
            }) => {
                assert_eq!(game_code.len(), 4);
                assert!(!host_token.is_empty());
                assert_eq!(session.game().map(|g| g.code.clone()), Some(game_code));
            }
            other => panic!("Expected GameCreated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_game_is_not_found() {
        let state = app_state();
        let mut session = Session::new();

        let msg = ClientMessage::AnnounceInGame {
            game_code: "ZZZZ".to_string(),
            host_token: None,
            username: Some("alice".to_string()),
        };
        match handle_message(msg, &mut session, &state).await {
            Some(ServerMessage::Error(payload)) => {
                assert_eq!(payload.code, "ROOM_NOT_FOUND");
                assert!(payload.fatal);
            }
            other => panic!("Expected Error message, got {:?}", other),
        }
        assert!(session.game().is_none());
    }

    #[tokio::test]
    async fn test_game_message_without_game() {
        let state = app_state();
        let mut session = Session::new();

        match handle_message(ClientMessage::HostNextRound, &mut session, &state).await {
            Some(ServerMessage::Error(payload)) => assert_eq!(payload.code, "UNKNOWN_IDENTITY"),
            other => panic!("Expected Error message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_chat_is_rate_limited() {
        let state = app_state();
        let mut session = Session::new();
        handle_message(ClientMessage::HostGame, &mut session, &state).await;

        for _ in 0..2 {
            let msg = ClientMessage::SendMessage {
                message: "hi".to_string(),
            };
            assert!(handle_message(msg, &mut session, &state).await.is_none());
        }
        let msg = ClientMessage::SendMessage {
            message: "hi".to_string(),
        };
        match handle_message(msg, &mut session, &state).await {
            Some(ServerMessage::Error(payload)) => assert_eq!(payload.code, "RATE_LIMITED"),
            other => panic!("Expected Error message, got {:?}", other),
        }
    }
}
