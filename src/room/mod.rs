//! Live games: the registry mapping game codes to running game tasks

pub mod actor;
pub mod timer;

use crate::broadcast::{ChannelDispatcher, Delivery};
use crate::config::GameConfig;
use crate::error::{GameError, GameResult};
use crate::policy::Policies;
use crate::state::Game;
use crate::types::*;
use actor::Command;
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};

/// Characters for game codes (no 0/O, 1/I/L)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 4;

/// Commands buffered per game before senders wait
const COMMAND_QUEUE: usize = 256;

fn generate_game_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Public summary of a game, as served by the HTTP API
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GameSummary {
    pub game_code: GameCode,
    pub game_state: GameState,
    pub player_count: usize,
}

impl GameSummary {
    pub fn of(game: &Game) -> Self {
        Self {
            game_code: game.code.clone(),
            game_state: game.game_state(),
            player_count: game.participants.len(),
        }
    }
}

/// A way to talk to one running game
#[derive(Clone)]
pub struct GameHandle {
    pub code: GameCode,
    cmd_tx: mpsc::Sender<Command>,
    dispatcher: Arc<ChannelDispatcher>,
}

impl GameHandle {
    /// Deliveries of this game, unfiltered
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Delivery>> {
        self.dispatcher.subscribe()
    }

    /// Queue a command. Fails once the game task has ended.
    pub async fn send(&self, cmd: Command) -> GameResult<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| GameError::RoomClosed)
    }

    pub async fn summary(&self) -> GameResult<GameSummary> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Inspect { reply }).await?;
        rx.await.map_err(|_| GameError::RoomClosed)
    }
}

/// Registry holds all active games
pub struct Registry {
    games: RwLock<HashMap<GameCode, GameHandle>>,
    questions: Arc<[Question]>,
    config: GameConfig,
}

impl Registry {
    pub fn new(questions: Vec<Question>, config: GameConfig) -> Arc<Self> {
        Arc::new(Self {
            games: RwLock::new(HashMap::new()),
            questions: questions.into(),
            config,
        })
    }

    /// Create a game and spawn its task. Returns the handle and the host token.
    pub async fn create_game(self: &Arc<Self>) -> (GameHandle, String) {
        let host_token = ulid::Ulid::new().to_string();
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);
        let dispatcher = Arc::new(ChannelDispatcher::new());

        // Generate a unique code (check for collisions)
        let handle = {
            let mut games = self.games.write().await;
            let code = loop {
                let code = generate_game_code();
                if !games.contains_key(&code) {
                    break code;
                }
            };
            let handle = GameHandle {
                code: code.clone(),
                cmd_tx: cmd_tx.clone(),
                dispatcher: dispatcher.clone(),
            };
            games.insert(code, handle.clone());
            handle
        };

        let game = Game::new(
            handle.code.clone(),
            host_token.clone(),
            self.questions.clone(),
            self.config.clone(),
            Policies::from_kind(self.config.contestant_policy),
        );
        tokio::spawn(actor::run(
            game,
            cmd_rx,
            cmd_tx,
            dispatcher,
            self.clone(),
        ));

        tracing::info!("Game created: {} ({} running)", handle.code, self.game_count().await);
        (handle, host_token)
    }

    /// Look up a game by code, case-insensitively
    pub async fn get(&self, code: &str) -> Option<GameHandle> {
        let code = code.trim().to_uppercase();
        self.games.read().await.get(&code).cloned()
    }

    pub async fn remove(&self, code: &str) {
        if self.games.write().await.remove(code).is_some() {
            tracing::info!("Game {} removed", code);
        }
    }

    pub async fn game_count(&self) -> usize {
        self.games.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ServerMessage;

    fn registry() -> Arc<Registry> {
        Registry::new(
            crate::questions::default_bank(),
            GameConfig {
                host_grace_seconds: 5,
                ..GameConfig::default()
            },
        )
    }

    #[test]
    fn test_game_code_alphabet() {
        for _ in 0..50 {
            let code = generate_game_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_CHARS.contains(&b)));
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let registry = registry();
        let (handle, token) = registry.create_game().await;

        assert!(!token.is_empty());
        assert_eq!(registry.game_count().await, 1);
        let found = registry.get(&handle.code.to_lowercase()).await;
        assert_eq!(found.map(|h| h.code), Some(handle.code.clone()));
        assert!(registry.get("????").await.is_none());

        let summary = handle.summary().await.unwrap();
        assert_eq!(summary.game_state, GameState::Lobby);
        assert_eq!(summary.player_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_game_without_host_is_removed_after_grace() {
        let registry = registry();
        let (handle, _token) = registry.create_game().await;

        tokio::time::sleep(std::time::Duration::from_secs(6)).await;

        assert!(registry.get(&handle.code).await.is_none());
        assert_eq!(
            handle.send(Command::Disconnect { conn: "x".into() }).await,
            Err(GameError::RoomClosed)
        );
    }

    #[tokio::test]
    async fn test_commands_reach_subscribers() {
        let registry = registry();
        let (handle, token) = registry.create_game().await;
        let mut rx = handle.subscribe();

        handle
            .send(Command::Announce {
                conn: "host".into(),
                host_token: Some(token),
                username: None,
            })
            .await
            .unwrap();

        let delivery = rx.recv().await.unwrap();
        assert!(delivery.is_for("host"));
        match &delivery.msg {
            ServerMessage::IdentityConfirmed(snapshot) => assert!(snapshot.is_host),
            other => panic!("Expected IdentityConfirmed, got {:?}", other),
        }
    }
}
