use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque ID types for readability
pub type GameCode = String;
pub type ConnId = String;
pub type Username = String;
pub type QuestionId = u32;

/// Display name used for the host in chat and results
pub const HOST_DISPLAY_NAME: &str = "Teacher";

/// Color shown for the host in chat
pub const HOST_COLOR: &str = "#FFFFFF";

/// Lifecycle of a whole game
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Lobby,
    InRound,
    GameOver,
}

/// Phase within a single round
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    Answering,
    Voting,
    Results,
}

/// Client-facing summary of where the game is
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    Lobby,
    Answering,
    Voting,
    Results,
    GameOver,
}

impl From<RoundPhase> for GameState {
    fn from(phase: RoundPhase) -> Self {
        match phase {
            RoundPhase::Answering => GameState::Answering,
            RoundPhase::Voting => GameState::Voting,
            RoundPhase::Results => GameState::Results,
        }
    }
}

/// Who a connection speaks for inside a game
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Host,
    Player(Username),
}

/// Role of a player in the current round. The host never takes one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Contestant,
    Audience,
}

/// A question from the bank. The correct option is only ever sent to the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: QuestionId,
    pub prompt: String,
    pub options: Vec<String>,
    /// Index into `options`
    pub correct: usize,
}

impl Question {
    /// Text of the correct option
    pub fn correct_answer(&self) -> &str {
        self.options
            .get(self.correct)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// A non-host member of a game
#[derive(Debug, Clone)]
pub struct Participant {
    pub username: Username,
    pub color: String,
    pub connection: Option<ConnId>,
    pub score: u32,
    /// Order of joining, used as a stable tie-breaker
    pub join_seq: u32,
    /// Generation of the last round this participant was a contestant in
    pub last_played_round: Option<u64>,
}

/// A submitted answer. Contestants write free text, audience members pick an option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Text(String),
    Option(usize),
}

/// A single round of play
#[derive(Debug, Clone)]
pub struct Round {
    pub generation: u64,
    pub number: u32,
    pub question_id: QuestionId,
    pub phase: RoundPhase,
    pub contestants: Vec<Username>,
    /// RFC 3339 deadline of the current phase
    pub deadline: Option<String>,
    pub answers: HashMap<Username, Answer>,
    pub votes: HashMap<Username, Username>,
    /// Set once votes have been tabulated, scoring never runs twice
    pub scored: bool,
}

impl Round {
    pub fn is_contestant(&self, username: &str) -> bool {
        self.contestants.iter().any(|c| c == username)
    }

    pub fn role_of(&self, username: &str) -> Role {
        if self.is_contestant(username) {
            Role::Contestant
        } else {
            Role::Audience
        }
    }

    /// Number of votes each contestant received (every contestant present)
    pub fn tally(&self) -> HashMap<Username, u32> {
        let mut counts: HashMap<Username, u32> =
            self.contestants.iter().map(|c| (c.clone(), 0)).collect();
        for target in self.votes.values() {
            if let Some(count) = counts.get_mut(target) {
                *count += 1;
            }
        }
        counts
    }
}
