//! The authority for a single game.
//!
//! `Game` is owned by exactly one actor task (see `crate::room`), so none of
//! its methods lock or await. Every method validates against the current
//! phase and roster, mutates, and queues `Effect`s that the actor carries out
//! afterwards: deliveries to connections, timer requests, and room closing.

mod roster;
mod round;
mod score;
mod snapshot;
mod submission;
mod vote;

pub use score::evaluate_winners;

use crate::broadcast::Delivery;
use crate::config::GameConfig;
use crate::error::{GameError, GameResult};
use crate::policy::Policies;
use crate::protocol::ServerMessage;
use crate::types::*;
use std::sync::Arc;
use std::time::Duration;

/// Maximum length of a chat message, longer ones are cut
const MAX_CHAT_CHARS: usize = 500;

/// Side effects requested by the game, executed by its actor
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Deliver(Delivery),
    /// Start (or replace) the phase timer for a round generation
    StartTimer {
        generation: u64,
        phase: RoundPhase,
        seconds: u32,
    },
    CancelTimer,
    /// Check whether the host came back after `after`
    ScheduleHostCheck { epoch: u64, after: Duration },
    /// Close the room after `after` (game over)
    ScheduleClose { after: Duration },
    /// Stop the actor and forget the game
    Close,
}

pub struct Game {
    pub code: GameCode,
    host_token: String,
    pub host_connection: Option<ConnId>,
    /// Bumped on every host attach/detach so stale host checks are ignored
    host_epoch: u64,
    pub participants: Vec<Participant>,
    next_join_seq: u32,
    pub questions: Arc<[Question]>,
    pub used_question_ids: Vec<QuestionId>,
    pub lifecycle: Lifecycle,
    pub round: Option<Round>,
    /// Monotonic round generation, guards timers against superseded rounds
    pub generation: u64,
    pub rounds_played: u32,
    pub config: GameConfig,
    policies: Policies,
    closed: bool,
    effects: Vec<Effect>,
}

impl Game {
    pub fn new(
        code: GameCode,
        host_token: String,
        questions: Arc<[Question]>,
        config: GameConfig,
        policies: Policies,
    ) -> Self {
        let mut game = Self {
            code,
            host_token,
            host_connection: None,
            host_epoch: 0,
            participants: Vec::new(),
            next_join_seq: 0,
            questions,
            used_question_ids: Vec::new(),
            lifecycle: Lifecycle::Lobby,
            round: None,
            generation: 0,
            rounds_played: 0,
            config,
            policies,
            closed: false,
            effects: Vec::new(),
        };
        // The host has to announce within the grace period or the room goes away
        game.schedule_host_check();
        game
    }

    pub fn host_token(&self) -> &str {
        &self.host_token
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drain the effects queued since the last call
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// Client-facing state of the game
    pub fn game_state(&self) -> GameState {
        match self.lifecycle {
            Lifecycle::Lobby => GameState::Lobby,
            Lifecycle::GameOver => GameState::GameOver,
            Lifecycle::InRound => self
                .round
                .as_ref()
                .map(|r| r.phase.into())
                .unwrap_or(GameState::Lobby),
        }
    }

    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.round.as_ref().and_then(|r| self.question(r.question_id))
    }

    pub fn participant(&self, username: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.username == username)
    }

    fn participant_mut(&mut self, username: &str) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.username == username)
    }

    /// Identity bound to a connection, if any
    pub fn identity_of(&self, conn: &str) -> Option<Identity> {
        if self.host_connection.as_deref() == Some(conn) {
            return Some(Identity::Host);
        }
        self.participants
            .iter()
            .find(|p| p.connection.as_deref() == Some(conn))
            .map(|p| Identity::Player(p.username.clone()))
    }

    fn require_identity(&self, conn: &str) -> GameResult<Identity> {
        self.identity_of(conn).ok_or(GameError::UnknownIdentity)
    }

    fn require_host(&self, conn: &str, denied: &'static str) -> GameResult<()> {
        match self.require_identity(conn)? {
            Identity::Host => Ok(()),
            Identity::Player(_) => Err(GameError::Forbidden(denied)),
        }
    }

    /// The participant behind `conn`; the host is turned away with `denied`
    fn require_player(&self, conn: &str, denied: &'static str) -> GameResult<Username> {
        match self.require_identity(conn)? {
            Identity::Host => Err(GameError::Forbidden(denied)),
            Identity::Player(name) => Ok(name),
        }
    }

    /// Every attached connection: host first, then participants
    fn all_connections(&self) -> Vec<ConnId> {
        self.host_connection
            .iter()
            .cloned()
            .chain(self.player_connections())
            .collect()
    }

    fn player_connections(&self) -> Vec<ConnId> {
        self.participants
            .iter()
            .filter_map(|p| p.connection.clone())
            .collect()
    }

    fn deliver(&mut self, to: Vec<ConnId>, msg: ServerMessage) {
        if to.is_empty() {
            return;
        }
        self.effects.push(Effect::Deliver(Delivery { to, msg }));
    }

    pub fn send_to(&mut self, conn: &str, msg: ServerMessage) {
        self.deliver(vec![conn.to_string()], msg);
    }

    fn send_to_player(&mut self, username: &str, msg: ServerMessage) {
        if let Some(conn) = self.participant(username).and_then(|p| p.connection.clone()) {
            self.send_to(&conn, msg);
        }
    }

    pub fn broadcast_to_all(&mut self, msg: ServerMessage) {
        let to = self.all_connections();
        self.deliver(to, msg);
    }

    /// Everyone except the host
    fn broadcast_to_players(&mut self, msg: ServerMessage) {
        let to = self.player_connections();
        self.deliver(to, msg);
    }

    fn broadcast_to_host(&mut self, msg: ServerMessage) {
        if let Some(conn) = self.host_connection.clone() {
            self.send_to(&conn, msg);
        }
    }

    /// Report a failed request to the connection that made it
    pub fn reject(&mut self, conn: &str, err: GameError) {
        tracing::debug!("Game {}: rejected request from {}: {}", self.code, conn, err);
        self.send_to(conn, err.into());
    }

    /// Relay a chat line to the room. Not part of the round state machine.
    pub fn send_chat(&mut self, conn: &str, message: &str) -> GameResult<()> {
        let (user, color) = match self.require_identity(conn)? {
            Identity::Host => (HOST_DISPLAY_NAME.to_string(), HOST_COLOR.to_string()),
            Identity::Player(name) => {
                let color = self
                    .participant(&name)
                    .map(|p| p.color.clone())
                    .unwrap_or_default();
                (name, color)
            }
        };

        let text: String = message.trim().chars().take(MAX_CHAT_CHARS).collect();
        if text.is_empty() {
            return Ok(());
        }

        self.broadcast_to_all(ServerMessage::NewMessage { user, color, text });
        Ok(())
    }

    /// Broadcast a closing notice and ask the actor to stop
    fn close_room(&mut self, message: &str) {
        if self.closed {
            return;
        }
        tracing::info!("Game {} closing: {}", self.code, message);
        let mut payload = GameError::RoomClosed.to_payload();
        payload.message = message.to_string();
        self.broadcast_to_all(ServerMessage::Error(payload));
        self.closed = true;
        self.effects.push(Effect::CancelTimer);
        self.effects.push(Effect::Close);
    }

    /// Fired when the game-over grace period is over
    pub fn close_expired(&mut self) {
        self.close_room("The game has closed");
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub const HOST: &str = "conn-host";

    pub fn question(id: QuestionId, options: &[&str], correct: usize) -> Question {
        Question {
            id,
            prompt: format!("Question {}", id),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct,
        }
    }

    pub fn config() -> GameConfig {
        GameConfig {
            answering_seconds: 30,
            voting_seconds: 20,
            results_seconds: Some(10),
            ..GameConfig::default()
        }
    }

    /// Game with an attached host and the given questions
    pub fn game_with(questions: Vec<Question>, config: GameConfig) -> Game {
        let mut game = Game::new(
            "ABCD".to_string(),
            "host-token".to_string(),
            questions.into(),
            config,
            Policies::default(),
        );
        game.announce(HOST, Some("host-token"), None).unwrap();
        game.take_effects();
        game
    }

    pub fn game() -> Game {
        game_with(
            vec![
                question(1, &["Paris", "Lyon"], 0),
                question(2, &["Mars", "Venus"], 0),
            ],
            config(),
        )
    }

    /// Join and announce a player on connection `conn-<name>`
    pub fn add_player(game: &mut Game, name: &str) -> String {
        let conn = format!("conn-{}", name);
        game.join(&conn, name).unwrap();
        game.announce(&conn, None, Some(name)).unwrap();
        game.take_effects();
        conn
    }

    /// Messages delivered to one connection, in order
    pub fn messages_for(effects: &[Effect], conn: &str) -> Vec<ServerMessage> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Deliver(d) if d.is_for(conn) => Some(d.msg.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn error_code(effects: &[Effect], conn: &str) -> Option<String> {
        messages_for(effects, conn).into_iter().find_map(|m| match m {
            ServerMessage::Error(p) => Some(p.code),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_new_game_starts_in_lobby_and_waits_for_host() {
        let mut game = Game::new(
            "WXYZ".to_string(),
            "token".to_string(),
            vec![question(1, &["a", "b"], 0)].into(),
            config(),
            Policies::default(),
        );

        assert_eq!(game.lifecycle, Lifecycle::Lobby);
        assert_eq!(game.game_state(), GameState::Lobby);
        assert!(game.round.is_none());

        let effects = game.take_effects();
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::ScheduleHostCheck { .. })));
    }

    #[test]
    fn test_chat_is_broadcast_with_sender_color() {
        let mut game = game();
        let alice = add_player(&mut game, "alice");

        game.send_chat(&alice, "  hello there ").unwrap();
        let effects = game.take_effects();

        let msgs = messages_for(&effects, HOST);
        assert_eq!(msgs.len(), 1);
        match &msgs[0] {
            ServerMessage::NewMessage { user, color, text } => {
                assert_eq!(user, "alice");
                assert!(!color.is_empty());
                assert_eq!(text, "hello there");
            }
            other => panic!("Expected NewMessage, got {:?}", other),
        }
        assert_eq!(messages_for(&effects, &alice).len(), 1);
    }

    #[test]
    fn test_host_chat_uses_teacher_name() {
        let mut game = game();
        let alice = add_player(&mut game, "alice");

        game.send_chat(HOST, "Welcome").unwrap();
        let effects = game.take_effects();

        match &messages_for(&effects, &alice)[0] {
            ServerMessage::NewMessage { user, .. } => assert_eq!(user, HOST_DISPLAY_NAME),
            other => panic!("Expected NewMessage, got {:?}", other),
        }
    }

    #[test]
    fn test_chat_requires_identity() {
        let mut game = game();
        let result = game.send_chat("stranger", "hi");
        assert_eq!(result, Err(GameError::UnknownIdentity));
    }

    #[test]
    fn test_close_expired_closes_once() {
        let mut game = game();
        let alice = add_player(&mut game, "alice");

        game.close_expired();
        let effects = game.take_effects();
        assert!(game.is_closed());
        assert_eq!(error_code(&effects, &alice).as_deref(), Some("ROOM_CLOSED"));
        assert!(effects.contains(&Effect::Close));

        game.close_expired();
        assert!(game.take_effects().is_empty());
    }
}
