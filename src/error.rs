use serde::Serialize;

/// Result type for game operations
pub type GameResult<T> = Result<T, GameError>;

/// Errors reported back to the client that caused them.
///
/// None of these abort the game; they are turned into an `error` event for the
/// originating connection only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("That question does not exist or has already been used")]
    InvalidQuestion,

    #[error("That action is not possible right now")]
    PhaseMismatch,

    #[error("You have already submitted for this round")]
    DuplicateSubmission,

    #[error("You cannot vote for that player")]
    InvalidTarget,

    #[error("Could not verify your identity, please rejoin the game")]
    UnknownIdentity,

    #[error("The game has closed")]
    RoomClosed,

    #[error("Game not found")]
    RoomNotFound,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("Invalid answer: {0}")]
    InvalidAnswer(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("That username is already taken")]
    UsernameTaken,

    #[error("At least one connected player is needed to start a round")]
    NotEnoughPlayers,

    #[error("You are sending messages too quickly")]
    RateLimited,

    #[error("Invalid message format: {0}")]
    BadRequest(String),
}

impl GameError {
    /// Stable machine-readable code for the client
    pub fn code(&self) -> &'static str {
        match self {
            GameError::InvalidQuestion => "INVALID_QUESTION",
            GameError::PhaseMismatch => "PHASE_MISMATCH",
            GameError::DuplicateSubmission => "DUPLICATE_SUBMISSION",
            GameError::InvalidTarget => "INVALID_TARGET",
            GameError::UnknownIdentity => "UNKNOWN_IDENTITY",
            GameError::RoomClosed => "ROOM_CLOSED",
            GameError::RoomNotFound => "ROOM_NOT_FOUND",
            GameError::Forbidden(_) => "UNAUTHORIZED",
            GameError::InvalidAnswer(_) => "INVALID_ANSWER",
            GameError::InvalidUsername(_) => "INVALID_USERNAME",
            GameError::UsernameTaken => "USERNAME_TAKEN",
            GameError::NotEnoughPlayers => "NOT_ENOUGH_PLAYERS",
            GameError::RateLimited => "RATE_LIMITED",
            GameError::BadRequest(_) => "PARSE_ERROR",
        }
    }

    /// Terminal errors: the client has to leave the game page
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GameError::UnknownIdentity | GameError::RoomClosed | GameError::RoomNotFound
        )
    }

    /// Wire representation of this error
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code().to_string(),
            message: self.to_string(),
            fatal: self.is_fatal(),
        }
    }
}

/// Body of an `error` event
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub fatal: bool,
}
