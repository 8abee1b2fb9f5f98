//! Process configuration, read from the environment (after `.env` is loaded)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which contestant selection policy new games use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContestantPolicyKind {
    LeastRecentlyPlayed,
    Random,
}

/// Per-game rules and timings
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub answering_seconds: u32,
    pub voting_seconds: u32,
    /// Move on from results by itself after this long. `None` leaves it
    /// to the host.
    pub results_seconds: Option<u32>,
    pub contestants_per_round: usize,
    pub points_per_vote: u32,
    pub correct_answer_bonus: u32,
    pub audience_correct_points: u32,
    pub max_answer_chars: usize,
    /// Stop after this many rounds even if questions remain
    pub max_rounds: Option<u32>,
    pub host_grace_seconds: u64,
    pub game_over_close_seconds: u64,
    pub contestant_policy: ContestantPolicyKind,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            answering_seconds: 60,
            voting_seconds: 30,
            results_seconds: None,
            contestants_per_round: 2,
            points_per_vote: 1,
            correct_answer_bonus: 0,
            audience_correct_points: 0,
            max_answer_chars: 280,
            max_rounds: None,
            host_grace_seconds: 10,
            game_over_close_seconds: 60,
            contestant_policy: ContestantPolicyKind::LeastRecentlyPlayed,
        }
    }
}

impl GameConfig {
    /// Load game rules from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let contestant_policy = match std::env::var("CONTESTANT_POLICY")
            .map(|v| v.trim().to_lowercase())
            .as_deref()
        {
            Ok("random") => ContestantPolicyKind::Random,
            Ok("least_recent") | Ok("") | Err(_) => ContestantPolicyKind::LeastRecentlyPlayed,
            Ok(other) => {
                tracing::warn!(
                    "Unknown CONTESTANT_POLICY '{}', using least_recent",
                    other
                );
                ContestantPolicyKind::LeastRecentlyPlayed
            }
        };

        Self {
            answering_seconds: env_or("ANSWERING_SECONDS", defaults.answering_seconds).max(1),
            voting_seconds: env_or("VOTING_SECONDS", defaults.voting_seconds).max(1),
            results_seconds: env_parse("RESULTS_SECONDS").filter(|n| *n > 0),
            contestants_per_round: env_or("CONTESTANTS_PER_ROUND", defaults.contestants_per_round)
                .clamp(1, 2),
            points_per_vote: env_or("POINTS_PER_VOTE", defaults.points_per_vote),
            correct_answer_bonus: env_or("CORRECT_ANSWER_BONUS", defaults.correct_answer_bonus),
            audience_correct_points: env_or(
                "AUDIENCE_CORRECT_POINTS",
                defaults.audience_correct_points,
            ),
            max_answer_chars: env_or("MAX_ANSWER_CHARS", defaults.max_answer_chars).max(1),
            max_rounds: env_parse("MAX_ROUNDS").filter(|n| *n > 0),
            host_grace_seconds: env_or("HOST_GRACE_SECONDS", defaults.host_grace_seconds),
            game_over_close_seconds: env_or(
                "GAME_OVER_CLOSE_SECONDS",
                defaults.game_over_close_seconds,
            ),
            contestant_policy,
        }
    }
}

/// Server-level configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub static_dir: PathBuf,
    /// JSON question bank; the built-in bank is used when unset
    pub questions_path: Option<PathBuf>,
    /// Chat messages allowed per connection per window
    pub chat_rate_limit: u32,
    pub chat_rate_window: Duration,
    pub game: GameConfig,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let bind_addr = env_parse("QUIZ_BIND_ADDR")
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 5000)));
        let static_dir = std::env::var("QUIZ_STATIC_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("static"));
        let questions_path = std::env::var("QUIZ_QUESTIONS_PATH")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Self {
            bind_addr,
            static_dir,
            questions_path,
            chat_rate_limit: env_or("CHAT_RATE_LIMIT", 5u32).max(1),
            chat_rate_window: Duration::from_secs(env_or("CHAT_RATE_WINDOW_SECONDS", 10u64).max(1)),
            game: GameConfig::from_env(),
        }
    }
}

/// Parse an env var, `None` if unset. Unparsable values are logged and ignored.
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: '{}'", key, raw);
            None
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env_parse(key).unwrap_or(default)
}
