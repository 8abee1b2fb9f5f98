use super::Game;
use crate::error::{GameError, GameResult};
use crate::protocol::ServerMessage;
use crate::types::*;

impl Game {
    /// Record an audience vote for one of the round's contestants
    pub fn submit_vote(&mut self, conn: &str, contestant: &str) -> GameResult<()> {
        let voter = self.require_player(conn, "The host does not vote")?;

        let round = match self.round.as_mut() {
            Some(round) if round.phase == RoundPhase::Voting => round,
            _ => return Err(GameError::PhaseMismatch),
        };

        // Contestants never vote, not even for themselves
        if round.is_contestant(&voter) || !round.is_contestant(contestant) {
            return Err(GameError::InvalidTarget);
        }
        if round.votes.contains_key(&voter) {
            return Err(GameError::DuplicateSubmission);
        }

        round.votes.insert(voter.clone(), contestant.to_string());
        let received = round.votes.len();

        tracing::debug!("Game {}: {} voted for {}", self.code, voter, contestant);

        self.send_to(conn, ServerMessage::VoteReceived);
        let expected = self.eligible_voters().len();
        self.broadcast_to_host(ServerMessage::SubmissionProgress {
            phase: RoundPhase::Voting,
            received,
            expected,
        });

        self.check_voting_complete();
        Ok(())
    }

    /// Connected audience members for the running round
    pub(super) fn eligible_voters(&self) -> Vec<Username> {
        let Some(round) = &self.round else {
            return Vec::new();
        };
        self.participants
            .iter()
            .filter(|p| p.connection.is_some() && !round.is_contestant(&p.username))
            .map(|p| p.username.clone())
            .collect()
    }

    /// Close voting once every connected audience member has voted
    pub(super) fn check_voting_complete(&mut self) {
        let Some(round) = &self.round else {
            return;
        };
        if round.phase != RoundPhase::Voting {
            return;
        }
        let all_voted = self
            .eligible_voters()
            .iter()
            .all(|v| round.votes.contains_key(v));
        if all_voted {
            self.advance_to_results();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    /// Four players: A and B contest, C and D vote
    fn voting_game() -> (Game, Vec<String>) {
        let mut game = game();
        let conns: Vec<String> = ["A", "B", "C", "D"]
            .iter()
            .map(|n| add_player(&mut game, n))
            .collect();
        game.select_question(HOST, 1).unwrap();
        game.submit_answer(&conns[0], Answer::Text("Paris".into()))
            .unwrap();
        game.submit_answer(&conns[1], Answer::Text("Lyon".into()))
            .unwrap();
        game.take_effects();
        assert_eq!(game.game_state(), GameState::Voting);
        (game, conns)
    }

    #[test]
    fn test_vote_is_recorded_and_acked() {
        let (mut game, conns) = voting_game();

        game.submit_vote(&conns[2], "A").unwrap();
        let effects = game.take_effects();

        assert_eq!(
            messages_for(&effects, &conns[2]),
            vec![ServerMessage::VoteReceived]
        );
        assert_eq!(
            messages_for(&effects, HOST),
            vec![ServerMessage::SubmissionProgress {
                phase: RoundPhase::Voting,
                received: 1,
                expected: 2,
            }]
        );
        assert_eq!(game.game_state(), GameState::Voting);
    }

    #[test]
    fn test_contestant_cannot_vote() {
        let (mut game, conns) = voting_game();

        assert_eq!(game.submit_vote(&conns[0], "A"), Err(GameError::InvalidTarget));
        assert_eq!(game.submit_vote(&conns[0], "B"), Err(GameError::InvalidTarget));
        assert!(game.round.as_ref().unwrap().votes.is_empty());
    }

    #[test]
    fn test_vote_for_non_contestant_rejected() {
        let (mut game, conns) = voting_game();

        assert_eq!(game.submit_vote(&conns[2], "D"), Err(GameError::InvalidTarget));
        assert_eq!(
            game.submit_vote(&conns[2], "nobody"),
            Err(GameError::InvalidTarget)
        );
        assert!(game.round.as_ref().unwrap().votes.is_empty());
    }

    #[test]
    fn test_second_vote_rejected() {
        let (mut game, conns) = voting_game();

        game.submit_vote(&conns[2], "A").unwrap();
        assert_eq!(
            game.submit_vote(&conns[2], "B"),
            Err(GameError::DuplicateSubmission)
        );
        assert_eq!(game.round.as_ref().unwrap().votes["C"], "A");
    }

    #[test]
    fn test_all_votes_in_shows_results() {
        let (mut game, conns) = voting_game();
        game.submit_vote(&conns[2], "A").unwrap();
        game.submit_vote(&conns[3], "A").unwrap();
        assert_eq!(game.game_state(), GameState::Results);
        assert_eq!(game.participant("A").unwrap().score, 2);
    }

    #[test]
    fn test_disconnected_voter_is_not_waited_for() {
        let (mut game, conns) = voting_game();
        game.submit_vote(&conns[2], "B").unwrap();
        assert_eq!(game.game_state(), GameState::Voting);

        game.disconnect(&conns[3]);
        assert_eq!(game.game_state(), GameState::Results);
        assert_eq!(game.participant("B").unwrap().score, 1);
    }

    #[test]
    fn test_vote_outside_voting_phase() {
        let mut game = game();
        add_player(&mut game, "A");
        let c = add_player(&mut game, "C");
        assert_eq!(game.submit_vote(&c, "A"), Err(GameError::PhaseMismatch));

        game.select_question(HOST, 1).unwrap();
        assert_eq!(game.submit_vote(&c, "A"), Err(GameError::PhaseMismatch));
    }

    #[test]
    fn test_host_cannot_vote() {
        let (mut game, _conns) = voting_game();
        assert!(matches!(
            game.submit_vote(HOST, "A"),
            Err(GameError::Forbidden(_))
        ));
    }
}
