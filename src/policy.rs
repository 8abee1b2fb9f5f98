//! Pluggable rules: who plays each round, and how free-text answers are graded

use crate::config::ContestantPolicyKind;
use crate::types::{Question, Username};
use rand::seq::IndexedRandom;
use std::sync::Arc;

/// A participant eligible to become a contestant
#[derive(Debug, Clone)]
pub struct Candidate {
    pub username: Username,
    pub join_seq: u32,
    pub last_played_round: Option<u64>,
}

/// Picks contestants for a new round. Must be a pure choice over `candidates`;
/// the round engine discards anything that is not one of them.
pub trait ContestantPolicy: Send + Sync {
    fn select(&self, candidates: &[Candidate], count: usize) -> Vec<Username>;
}

/// Decides whether a contestant's free-text answer is correct
pub trait AnswerGrader: Send + Sync {
    fn is_correct(&self, answer: &str, question: &Question) -> bool;
}

/// Players who never played come first, then those who played longest ago.
/// Join order breaks ties.
#[derive(Debug, Default)]
pub struct LeastRecentlyPlayed;

impl ContestantPolicy for LeastRecentlyPlayed {
    fn select(&self, candidates: &[Candidate], count: usize) -> Vec<Username> {
        let mut sorted: Vec<&Candidate> = candidates.iter().collect();
        sorted.sort_by_key(|c| (c.last_played_round, c.join_seq));
        sorted
            .into_iter()
            .take(count)
            .map(|c| c.username.clone())
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct RandomPick;

impl ContestantPolicy for RandomPick {
    fn select(&self, candidates: &[Candidate], count: usize) -> Vec<Username> {
        let mut rng = rand::rng();
        candidates
            .choose_multiple(&mut rng, count)
            .map(|c| c.username.clone())
            .collect()
    }
}

/// Normalize text for comparison (trim whitespace, lowercase)
fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Answer matches the correct option ignoring case and surrounding whitespace
#[derive(Debug, Default)]
pub struct NormalizedMatch;

impl AnswerGrader for NormalizedMatch {
    fn is_correct(&self, answer: &str, question: &Question) -> bool {
        normalize(answer) == normalize(question.correct_answer())
    }
}

/// The set of policies a game runs with
#[derive(Clone)]
pub struct Policies {
    pub contestants: Arc<dyn ContestantPolicy>,
    pub grader: Arc<dyn AnswerGrader>,
}

impl Policies {
    pub fn from_kind(kind: ContestantPolicyKind) -> Self {
        let contestants: Arc<dyn ContestantPolicy> = match kind {
            ContestantPolicyKind::LeastRecentlyPlayed => Arc::new(LeastRecentlyPlayed),
            ContestantPolicyKind::Random => Arc::new(RandomPick),
        };
        Self {
            contestants,
            grader: Arc::new(NormalizedMatch),
        }
    }
}

impl Default for Policies {
    fn default() -> Self {
        Self::from_kind(ContestantPolicyKind::LeastRecentlyPlayed)
    }
}
