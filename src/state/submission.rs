use super::Game;
use crate::error::{GameError, GameResult};
use crate::protocol::ServerMessage;
use crate::types::*;

impl Game {
    /// Record a participant's answer for the running round.
    ///
    /// Contestants write free text; everyone else picks one of the options.
    /// The first accepted answer is final.
    pub fn submit_answer(&mut self, conn: &str, answer: Answer) -> GameResult<()> {
        let username = self.require_player(conn, "The host does not answer questions")?;
        let max_chars = self.config.max_answer_chars;
        let option_count = self
            .current_question()
            .map(|q| q.options.len())
            .unwrap_or(0);

        let round = match self.round.as_mut() {
            Some(round) if round.phase == RoundPhase::Answering => round,
            _ => return Err(GameError::PhaseMismatch),
        };

        if round.answers.contains_key(&username) {
            return Err(GameError::DuplicateSubmission);
        }

        let answer = match (round.role_of(&username), answer) {
            (Role::Contestant, Answer::Text(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(GameError::InvalidAnswer(
                        "answer cannot be empty".to_string(),
                    ));
                }
                if text.chars().count() > max_chars {
                    return Err(GameError::InvalidAnswer(format!(
                        "answer cannot exceed {} characters",
                        max_chars
                    )));
                }
                Answer::Text(text.to_string())
            }
            (Role::Contestant, Answer::Option(_)) => {
                return Err(GameError::InvalidAnswer(
                    "contestants write their own answer".to_string(),
                ));
            }
            (_, Answer::Option(index)) if index < option_count => Answer::Option(index),
            (_, Answer::Option(index)) => {
                return Err(GameError::InvalidAnswer(format!(
                    "option {} does not exist",
                    index
                )));
            }
            (_, Answer::Text(_)) => {
                return Err(GameError::InvalidAnswer(
                    "pick one of the options".to_string(),
                ));
            }
        };

        round.answers.insert(username.clone(), answer);
        let expected = round.contestants.len();
        let received = round
            .contestants
            .iter()
            .filter(|c| round.answers.contains_key(*c))
            .count();

        tracing::debug!("Game {}: answer from {}", self.code, username);

        self.send_to(conn, ServerMessage::AnswerReceived);
        self.broadcast_to_host(ServerMessage::SubmissionProgress {
            phase: RoundPhase::Answering,
            received,
            expected,
        });

        if received == expected {
            self.advance_to_voting();
        }
        Ok(())
    }
}
