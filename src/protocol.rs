use crate::error::ErrorPayload;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a new game; the sender receives the host token
    HostGame,
    JoinGame {
        game_code: String,
        username: String,
    },
    /// Bind this connection to an identity (first visit or reconnect)
    AnnounceInGame {
        game_code: String,
        #[serde(default)]
        host_token: Option<String>,
        #[serde(default)]
        username: Option<String>,
    },
    // Host-only messages
    TeacherSelectsQuestion {
        question_id: QuestionId,
    },
    HostNextRound,
    HostEndGame,
    // Player messages
    PlayerSubmitAnswer {
        answer: AnswerPayload,
    },
    PlayerSubmitVote {
        contestant_sid: String,
    },
    SendMessage {
        message: String,
    },
}

/// Contestants send free text, audience members send an option index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerPayload {
    Option(usize),
    Text(String),
}

impl From<AnswerPayload> for Answer {
    fn from(payload: AnswerPayload) -> Self {
        match payload {
            AnswerPayload::Option(index) => Answer::Option(index),
            AnswerPayload::Text(text) => Answer::Text(text),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    GameCreated {
        game_code: GameCode,
        host_token: String,
    },
    JoinSuccess {
        game_code: GameCode,
        username: Username,
        color: String,
    },
    /// Full resync for a freshly announced connection
    IdentityConfirmed(Box<Snapshot>),
    UpdatePlayerList {
        players: Vec<PlayerInfo>,
    },
    NewRoundStarted {
        round_no: u32,
        question_id: QuestionId,
        question: String,
        options: Vec<String>,
        contestants: Vec<PlayerInfo>,
        deadline: Option<String>,
        /// Host variant only
        #[serde(skip_serializing_if = "Option::is_none", default)]
        correct_answer: Option<String>,
    },
    TimerUpdate {
        time: u32,
        phase: RoundPhase,
    },
    PhaseChange {
        phase: RoundPhase,
        deadline: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        answers: Option<HashMap<Username, ContestantAnswer>>,
    },
    AnswerReceived,
    VoteReceived,
    /// Host-only progress counter for the running phase
    SubmissionProgress {
        phase: RoundPhase,
        received: usize,
        expected: usize,
    },
    ShowResults {
        correct_answer: String,
        contestant_answers: HashMap<Username, ContestantResult>,
        scores: HashMap<Username, u32>,
    },
    PrepareForNextRound,
    GameOver(GameOverInfo),
    UpdateMyScore {
        score: u32,
    },
    NewMessage {
        user: String,
        color: String,
        text: String,
    },
    Error(ErrorPayload),
}

impl From<crate::error::GameError> for ServerMessage {
    fn from(err: crate::error::GameError) -> Self {
        ServerMessage::Error(err.to_payload())
    }
}

/// Public info about a participant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerInfo {
    /// Stable identity the clients use to refer to this player (vote targets)
    pub sid: Username,
    pub username: Username,
    pub color: String,
    pub score: u32,
    pub connected: bool,
}

impl From<&Participant> for PlayerInfo {
    fn from(p: &Participant) -> Self {
        Self {
            sid: p.username.clone(),
            username: p.username.clone(),
            color: p.color.clone(),
            score: p.score,
            connected: p.connection.is_some(),
        }
    }
}

/// A contestant's sealed answer as shown to voters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContestantAnswer {
    pub sid: Username,
    pub username: Username,
    pub answer: String,
}

/// A contestant's line on the results screen
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContestantResult {
    pub sid: Username,
    pub username: Username,
    pub answer: String,
    pub votes: u32,
    pub correct: bool,
}

/// Question as shown to players (no solution)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionView {
    pub id: QuestionId,
    pub prompt: String,
    pub options: Vec<String>,
}

impl From<&Question> for QuestionView {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            prompt: q.prompt.clone(),
            options: q.options.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Standing {
    pub username: Username,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameOverInfo {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub winner: Option<Standing>,
    pub is_tie: bool,
    pub winners: Vec<Standing>,
}

/// Everything a client needs to rebuild its view after (re)connecting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub game_code: GameCode,
    pub is_host: bool,
    pub username: String,
    pub color: String,
    pub players: Vec<PlayerInfo>,
    pub current_contestants: Vec<PlayerInfo>,
    pub my_score: u32,
    pub game_state: GameState,
    pub round_no: u32,
    pub current_question: Option<QuestionView>,
    pub deadline: Option<String>,
    pub is_contestant: bool,
    pub is_audience: bool,
    pub has_submitted: bool,
    pub has_voted: bool,
    /// Sealed contestant answers once voting has started
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub answers: Option<HashMap<Username, ContestantAnswer>>,
    /// Host only: the whole bank including solutions
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub questions: Option<Vec<Question>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub used_question_ids: Option<Vec<QuestionId>>,
}
