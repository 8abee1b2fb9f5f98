use super::Game;
use crate::protocol::{GameOverInfo, Standing};
use crate::types::*;
use std::collections::{HashMap, HashSet};

/// What tabulating a round produced
#[derive(Debug, Clone, Default)]
pub(super) struct RoundOutcome {
    /// Votes per contestant, zero-vote contestants included
    pub tally: HashMap<Username, u32>,
    /// Contestants whose answer matched the solution
    pub correct: HashSet<Username>,
    /// Participants whose score went up
    pub changed: Vec<Username>,
}

impl Game {
    /// Tabulate the current round and award points.
    ///
    /// Returns `None` if there is no round or it was already scored.
    pub(super) fn score_round(&mut self) -> Option<RoundOutcome> {
        let question = self.current_question()?.clone();
        let grader = self.policies.grader.clone();
        let points_per_vote = self.config.points_per_vote;
        let bonus = self.config.correct_answer_bonus;
        let audience_points = self.config.audience_correct_points;

        let round = self.round.as_mut()?;
        if round.scored {
            return None;
        }
        round.scored = true;

        let tally = round.tally();
        let mut awards: HashMap<Username, u32> = HashMap::new();
        let mut correct = HashSet::new();

        for (contestant, votes) in &tally {
            *awards.entry(contestant.clone()).or_default() += votes * points_per_vote;
        }
        for (name, answer) in &round.answers {
            match answer {
                Answer::Text(text) if round.is_contestant(name) => {
                    if grader.is_correct(text, &question) {
                        correct.insert(name.clone());
                        *awards.entry(name.clone()).or_default() += bonus;
                    }
                }
                Answer::Option(index) if !round.is_contestant(name) => {
                    if *index == question.correct {
                        *awards.entry(name.clone()).or_default() += audience_points;
                    }
                }
                _ => {}
            }
        }

        let mut changed = Vec::new();
        for p in self.participants.iter_mut() {
            if let Some(points) = awards.get(&p.username).filter(|pts| **pts > 0) {
                p.score += points;
                changed.push(p.username.clone());
            }
        }

        Some(RoundOutcome {
            tally,
            correct,
            changed,
        })
    }

    /// Current score of every participant
    pub fn scores(&self) -> HashMap<Username, u32> {
        self.participants
            .iter()
            .map(|p| (p.username.clone(), p.score))
            .collect()
    }
}

/// Everyone sharing the top score wins. Two or more winners is a tie;
/// nobody playing means no winner at all.
pub fn evaluate_winners(participants: &[Participant]) -> GameOverInfo {
    let Some(top) = participants.iter().map(|p| p.score).max() else {
        return GameOverInfo {
            winner: None,
            is_tie: false,
            winners: Vec::new(),
        };
    };

    let mut leaders: Vec<&Participant> =
        participants.iter().filter(|p| p.score == top).collect();
    leaders.sort_by_key(|p| p.join_seq);

    let winners: Vec<Standing> = leaders
        .into_iter()
        .map(|p| Standing {
            username: p.username.clone(),
            score: p.score,
        })
        .collect();
    let is_tie = winners.len() > 1;

    GameOverInfo {
        winner: if is_tie { None } else { winners.first().cloned() },
        is_tie,
        winners,
    }
}
