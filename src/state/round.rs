use super::{Effect, Game};
use crate::error::{GameError, GameResult};
use crate::policy::Candidate;
use crate::protocol::{ContestantAnswer, ContestantResult, PlayerInfo, ServerMessage};
use crate::types::*;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// RFC 3339 timestamp `seconds` from now
fn deadline_in(seconds: u32) -> String {
    (chrono::Utc::now() + chrono::Duration::seconds(i64::from(seconds))).to_rfc3339()
}

impl Game {
    /// Host picks the next question; starts a round in the answering phase
    pub fn select_question(&mut self, conn: &str, question_id: QuestionId) -> GameResult<()> {
        self.require_host(conn, "Only the host can select questions")?;

        if self.lifecycle != Lifecycle::Lobby {
            return Err(GameError::PhaseMismatch);
        }

        let question = self
            .question(question_id)
            .cloned()
            .ok_or(GameError::InvalidQuestion)?;
        if self.used_question_ids.contains(&question_id) {
            return Err(GameError::InvalidQuestion);
        }

        let contestants = self.pick_contestants()?;

        self.generation += 1;
        self.rounds_played += 1;
        self.used_question_ids.push(question_id);
        let generation = self.generation;
        for p in self
            .participants
            .iter_mut()
            .filter(|p| contestants.contains(&p.username))
        {
            p.last_played_round = Some(generation);
        }

        let seconds = self.config.answering_seconds;
        let deadline = deadline_in(seconds);
        self.round = Some(Round {
            generation,
            number: self.rounds_played,
            question_id,
            phase: RoundPhase::Answering,
            contestants: contestants.clone(),
            deadline: Some(deadline.clone()),
            answers: HashMap::new(),
            votes: HashMap::new(),
            scored: false,
        });
        self.lifecycle = Lifecycle::InRound;

        tracing::info!(
            "Game {}: round {} started with question {}, contestants {:?}",
            self.code,
            self.rounds_played,
            question_id,
            contestants
        );

        self.effects.push(Effect::StartTimer {
            generation,
            phase: RoundPhase::Answering,
            seconds,
        });

        let contestant_infos: Vec<PlayerInfo> = contestants
            .iter()
            .filter_map(|c| self.participant(c))
            .map(PlayerInfo::from)
            .collect();
        let public = ServerMessage::NewRoundStarted {
            round_no: self.rounds_played,
            question_id,
            question: question.prompt.clone(),
            options: question.options.clone(),
            contestants: contestant_infos.clone(),
            deadline: Some(deadline.clone()),
            correct_answer: None,
        };
        self.broadcast_to_players(public);
        self.broadcast_to_host(ServerMessage::NewRoundStarted {
            round_no: self.rounds_played,
            question_id,
            question: question.prompt.clone(),
            options: question.options.clone(),
            contestants: contestant_infos,
            deadline: Some(deadline),
            correct_answer: Some(question.correct_answer().to_string()),
        });
        Ok(())
    }

    /// Ask the policy for contestants and keep only what it may legally pick
    fn pick_contestants(&self) -> GameResult<Vec<Username>> {
        let candidates: Vec<Candidate> = self
            .participants
            .iter()
            .filter(|p| p.connection.is_some())
            .map(|p| Candidate {
                username: p.username.clone(),
                join_seq: p.join_seq,
                last_played_round: p.last_played_round,
            })
            .collect();
        if candidates.is_empty() {
            return Err(GameError::NotEnoughPlayers);
        }

        let count = self
            .config
            .contestants_per_round
            .clamp(1, 2)
            .min(candidates.len());

        let mut seen = HashSet::new();
        let mut picked: Vec<Username> = self
            .policies
            .contestants
            .select(&candidates, count)
            .into_iter()
            .filter(|name| candidates.iter().any(|c| &c.username == name))
            .filter(|name| seen.insert(name.clone()))
            .take(count)
            .collect();

        if picked.is_empty() {
            tracing::warn!(
                "Game {}: contestant policy picked nobody, using join order",
                self.code
            );
            picked = candidates
                .iter()
                .take(count)
                .map(|c| c.username.clone())
                .collect();
        }
        Ok(picked)
    }

    /// Contestant answers as revealed to voters. Contestants who did not
    /// answer in time appear with an empty answer.
    pub(super) fn sealed_answers(&self) -> HashMap<Username, ContestantAnswer> {
        let Some(round) = &self.round else {
            return HashMap::new();
        };
        round
            .contestants
            .iter()
            .map(|name| {
                let answer = match round.answers.get(name) {
                    Some(Answer::Text(text)) => text.clone(),
                    _ => String::new(),
                };
                (
                    name.clone(),
                    ContestantAnswer {
                        sid: name.clone(),
                        username: name.clone(),
                        answer,
                    },
                )
            })
            .collect()
    }

    fn current_phase(&self) -> Option<RoundPhase> {
        self.round.as_ref().map(|r| r.phase)
    }

    /// Seal answers and open voting
    pub(super) fn advance_to_voting(&mut self) {
        if self.current_phase() != Some(RoundPhase::Answering) {
            return;
        }

        let seconds = self.config.voting_seconds;
        let deadline = deadline_in(seconds);
        let generation = match self.round.as_mut() {
            Some(round) => {
                round.phase = RoundPhase::Voting;
                round.deadline = Some(deadline.clone());
                round.generation
            }
            None => return,
        };

        tracing::info!("Game {}: voting started", self.code);

        self.effects.push(Effect::StartTimer {
            generation,
            phase: RoundPhase::Voting,
            seconds,
        });
        let answers = self.sealed_answers();
        self.broadcast_to_all(ServerMessage::PhaseChange {
            phase: RoundPhase::Voting,
            deadline: Some(deadline),
            answers: Some(answers),
        });
        let expected = self.eligible_voters().len();
        self.broadcast_to_host(ServerMessage::SubmissionProgress {
            phase: RoundPhase::Voting,
            received: 0,
            expected,
        });

        // With nobody to vote there is nothing to wait for
        self.check_voting_complete();
    }

    /// Seal votes, score the round, and show results
    pub(super) fn advance_to_results(&mut self) {
        if self.current_phase() != Some(RoundPhase::Voting) {
            return;
        }

        let seconds = self.config.results_seconds;
        let deadline = seconds.map(deadline_in);
        let generation = match self.round.as_mut() {
            Some(round) => {
                round.phase = RoundPhase::Results;
                round.deadline = deadline.clone();
                round.generation
            }
            None => return,
        };

        let Some(outcome) = self.score_round() else {
            return;
        };

        tracing::info!(
            "Game {}: results, tally {:?}",
            self.code,
            outcome.tally
        );

        // Without a results timer only the host moves on
        if let Some(seconds) = seconds {
            self.effects.push(Effect::StartTimer {
                generation,
                phase: RoundPhase::Results,
                seconds,
            });
        }

        let correct_answer = self
            .current_question()
            .map(|q| q.correct_answer().to_string())
            .unwrap_or_default();
        let contestant_answers: HashMap<Username, ContestantResult> = self
            .sealed_answers()
            .into_values()
            .map(|a| {
                let result = ContestantResult {
                    votes: outcome.tally.get(&a.username).copied().unwrap_or(0),
                    correct: outcome.correct.contains(&a.username),
                    sid: a.sid,
                    username: a.username.clone(),
                    answer: a.answer,
                };
                (a.username, result)
            })
            .collect();

        self.broadcast_to_all(ServerMessage::PhaseChange {
            phase: RoundPhase::Results,
            deadline,
            answers: None,
        });
        self.broadcast_to_all(ServerMessage::ShowResults {
            correct_answer,
            contestant_answers,
            scores: self.scores(),
        });
        for name in &outcome.changed {
            if let Some(score) = self.participant(name).map(|p| p.score) {
                self.send_to_player(name, ServerMessage::UpdateMyScore { score });
            }
        }
    }

    /// Once-per-second countdown from the phase timer
    pub fn timer_tick(&mut self, generation: u64, phase: RoundPhase, remaining: u32) {
        if !self.timer_is_current(generation, phase) {
            return;
        }
        self.broadcast_to_all(ServerMessage::TimerUpdate {
            time: remaining,
            phase,
        });
    }

    /// Phase timer ran out. Ignored when the round or phase has moved on.
    pub fn timer_expired(&mut self, generation: u64, phase: RoundPhase) {
        if !self.timer_is_current(generation, phase) {
            tracing::debug!(
                "Game {}: ignoring stale {:?} timer for generation {}",
                self.code,
                phase,
                generation
            );
            return;
        }
        match phase {
            RoundPhase::Answering => self.advance_to_voting(),
            RoundPhase::Voting => self.advance_to_results(),
            RoundPhase::Results => self.finish_results(),
        }
    }

    fn timer_is_current(&self, generation: u64, phase: RoundPhase) -> bool {
        self.round
            .as_ref()
            .is_some_and(|r| r.generation == generation && r.phase == phase)
    }

    /// Host moves on from the results screen
    pub fn next_round(&mut self, conn: &str) -> GameResult<()> {
        self.require_host(conn, "Only the host can start the next round")?;
        if self.current_phase() != Some(RoundPhase::Results) {
            return Err(GameError::PhaseMismatch);
        }
        self.finish_results();
        Ok(())
    }

    /// Leave the results phase for the lobby, or end the game
    fn finish_results(&mut self) {
        self.effects.push(Effect::CancelTimer);
        self.round = None;

        if self.game_should_end() {
            self.enter_game_over();
        } else {
            self.lifecycle = Lifecycle::Lobby;
            tracing::info!("Game {}: back to lobby", self.code);
            self.broadcast_to_all(ServerMessage::PrepareForNextRound);
        }
    }

    /// Host ends the game early. A round still running is dropped unscored.
    pub fn end_game(&mut self, conn: &str) -> GameResult<()> {
        self.require_host(conn, "Only the host can end the game")?;
        if self.lifecycle == Lifecycle::GameOver {
            return Err(GameError::PhaseMismatch);
        }
        if let Some(round) = &self.round {
            if !round.scored {
                tracing::info!(
                    "Game {}: abandoning round {} without scoring",
                    self.code,
                    round.number
                );
            }
        }
        self.effects.push(Effect::CancelTimer);
        self.round = None;
        self.enter_game_over();
        Ok(())
    }

    fn game_should_end(&self) -> bool {
        let out_of_questions = self
            .questions
            .iter()
            .all(|q| self.used_question_ids.contains(&q.id));
        let out_of_rounds = self
            .config
            .max_rounds
            .is_some_and(|max| self.rounds_played >= max);
        out_of_questions || out_of_rounds
    }

    fn enter_game_over(&mut self) {
        self.lifecycle = Lifecycle::GameOver;
        let info = super::evaluate_winners(&self.participants);
        tracing::info!(
            "Game {} over, winners {:?}",
            self.code,
            info.winners.iter().map(|w| &w.username).collect::<Vec<_>>()
        );
        self.broadcast_to_all(ServerMessage::GameOver(info));
        self.effects.push(Effect::ScheduleClose {
            after: Duration::from_secs(self.config.game_over_close_seconds),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::GameConfig;
    use crate::protocol::AnswerPayload;

    fn started_game() -> (Game, String, String, String) {
        let mut game = game();
        let a = add_player(&mut game, "A");
        let b = add_player(&mut game, "B");
        let c = add_player(&mut game, "C");
        game.select_question(HOST, 1).unwrap();
        (game, a, b, c)
    }

    #[test]
    fn test_select_question_starts_round() {
        let (mut game, a, _b, c) = started_game();
        let effects = game.take_effects();

        assert_eq!(game.game_state(), GameState::Answering);
        assert_eq!(game.used_question_ids, vec![1]);
        let round = game.round.as_ref().unwrap();
        assert_eq!(round.contestants, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(round.generation, 1);
        assert!(effects.contains(&Effect::StartTimer {
            generation: 1,
            phase: RoundPhase::Answering,
            seconds: 30,
        }));

        // Players never see the solution, the host does
        for conn in [&a, &c] {
            match &messages_for(&effects, conn)[0] {
                ServerMessage::NewRoundStarted { correct_answer, .. } => {
                    assert!(correct_answer.is_none())
                }
                other => panic!("Expected NewRoundStarted, got {:?}", other),
            }
        }
        match &messages_for(&effects, HOST)[0] {
            ServerMessage::NewRoundStarted { correct_answer, .. } => {
                assert_eq!(correct_answer.as_deref(), Some("Paris"))
            }
            other => panic!("Expected NewRoundStarted, got {:?}", other),
        }
    }

    #[test]
    fn test_select_question_validation() {
        let mut game = game();
        let alice = add_player(&mut game, "alice");

        assert_eq!(
            game.select_question(&alice, 1),
            Err(GameError::Forbidden("Only the host can select questions"))
        );
        assert_eq!(
            game.select_question(HOST, 99),
            Err(GameError::InvalidQuestion)
        );

        game.select_question(HOST, 1).unwrap();
        assert_eq!(game.select_question(HOST, 2), Err(GameError::PhaseMismatch));
    }

    #[test]
    fn test_select_question_needs_connected_player() {
        let mut game = game();
        assert_eq!(
            game.select_question(HOST, 1),
            Err(GameError::NotEnoughPlayers)
        );

        let alice = add_player(&mut game, "alice");
        game.disconnect(&alice);
        assert_eq!(
            game.select_question(HOST, 1),
            Err(GameError::NotEnoughPlayers)
        );
        assert!(game.used_question_ids.is_empty());
    }

    #[test]
    fn test_single_player_is_only_contestant() {
        let mut game = game();
        add_player(&mut game, "solo");
        game.select_question(HOST, 1).unwrap();

        let round = game.round.as_ref().unwrap();
        assert_eq!(round.contestants, vec!["solo".to_string()]);
        assert!(!round.is_contestant(HOST_DISPLAY_NAME));
    }

    #[test]
    fn test_used_question_cannot_be_reselected() {
        let (mut game, a, b, c) = started_game();
        game.submit_answer(&a, AnswerPayload::Text("Paris".into()).into())
            .unwrap();
        game.submit_answer(&b, AnswerPayload::Text("Lyon".into()).into())
            .unwrap();
        game.submit_vote(&c, "A").unwrap();
        game.next_round(HOST).unwrap();

        assert_eq!(game.game_state(), GameState::Lobby);
        assert_eq!(
            game.select_question(HOST, 1),
            Err(GameError::InvalidQuestion)
        );
    }

    #[test]
    fn test_contestants_rotate_between_rounds() {
        let (mut game, _a, _b, _c) = started_game();
        let generation = game.generation;
        game.timer_expired(generation, RoundPhase::Answering);
        game.timer_expired(generation, RoundPhase::Voting);
        game.timer_expired(generation, RoundPhase::Results);
        assert_eq!(game.game_state(), GameState::Lobby);

        game.select_question(HOST, 2).unwrap();
        let round = game.round.as_ref().unwrap();
        // C has never played and goes first
        assert_eq!(round.contestants[0], "C");
        assert_eq!(round.number, 2);
    }

    #[test]
    fn test_stale_timer_is_ignored() {
        let (mut game, _a, _b, _c) = started_game();
        let generation = game.generation;
        game.take_effects();

        game.timer_expired(generation - 1, RoundPhase::Answering);
        game.timer_expired(generation, RoundPhase::Voting);
        game.timer_tick(generation + 1, RoundPhase::Answering, 5);

        assert_eq!(game.game_state(), GameState::Answering);
        assert!(game.take_effects().is_empty());
    }

    #[test]
    fn test_timer_tick_broadcasts_remaining_time() {
        let (mut game, a, _b, _c) = started_game();
        game.take_effects();

        game.timer_tick(game.generation, RoundPhase::Answering, 12);
        let effects = game.take_effects();
        assert_eq!(
            messages_for(&effects, &a),
            vec![ServerMessage::TimerUpdate {
                time: 12,
                phase: RoundPhase::Answering
            }]
        );
    }

    #[test]
    fn test_answer_timeout_opens_voting_with_blank_answers() {
        let (mut game, a, _b, c) = started_game();
        game.submit_answer(&a, Answer::Text("Paris".into())).unwrap();
        game.take_effects();

        game.timer_expired(game.generation, RoundPhase::Answering);
        let effects = game.take_effects();

        assert_eq!(game.game_state(), GameState::Voting);
        let answers = messages_for(&effects, &c)
            .into_iter()
            .find_map(|m| match m {
                ServerMessage::PhaseChange {
                    phase: RoundPhase::Voting,
                    answers,
                    ..
                } => answers,
                _ => None,
            })
            .expect("voting phase change");
        assert_eq!(answers["A"].answer, "Paris");
        assert_eq!(answers["B"].answer, "");
    }

    #[test]
    fn test_voting_without_audience_closes_immediately() {
        let mut game = game();
        let a = add_player(&mut game, "A");
        let b = add_player(&mut game, "B");
        game.select_question(HOST, 1).unwrap();

        game.submit_answer(&a, Answer::Text("Paris".into())).unwrap();
        game.submit_answer(&b, Answer::Text("Lyon".into())).unwrap();

        assert_eq!(game.game_state(), GameState::Results);
    }

    #[test]
    fn test_next_round_only_from_results() {
        let (mut game, a, _b, _c) = started_game();
        assert_eq!(game.next_round(HOST), Err(GameError::PhaseMismatch));
        assert_eq!(
            game.next_round(&a),
            Err(GameError::Forbidden("Only the host can start the next round"))
        );
    }

    #[test]
    fn test_last_question_ends_game() {
        let mut game = game_with(vec![question(1, &["Paris", "Lyon"], 0)], config());
        let a = add_player(&mut game, "A");
        let b = add_player(&mut game, "B");
        let c = add_player(&mut game, "C");
        game.select_question(HOST, 1).unwrap();
        game.submit_answer(&a, Answer::Text("Paris".into())).unwrap();
        game.submit_answer(&b, Answer::Text("Lyon".into())).unwrap();
        game.submit_vote(&c, "B").unwrap();
        game.take_effects();

        game.next_round(HOST).unwrap();
        let effects = game.take_effects();

        assert_eq!(game.game_state(), GameState::GameOver);
        match &messages_for(&effects, &c)[0] {
            ServerMessage::GameOver(info) => {
                assert!(!info.is_tie);
                assert_eq!(info.winner.as_ref().unwrap().username, "B");
            }
            other => panic!("Expected GameOver, got {:?}", other),
        }
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::ScheduleClose { .. })));
    }

    #[test]
    fn test_max_rounds_ends_game() {
        let mut game = game_with(
            vec![
                question(1, &["Paris", "Lyon"], 0),
                question(2, &["Mars", "Venus"], 0),
            ],
            GameConfig {
                max_rounds: Some(1),
                ..config()
            },
        );
        add_player(&mut game, "A");
        game.select_question(HOST, 1).unwrap();
        let generation = game.generation;
        game.timer_expired(generation, RoundPhase::Answering);
        game.timer_expired(generation, RoundPhase::Results);

        assert_eq!(game.game_state(), GameState::GameOver);
    }

    #[test]
    fn test_end_game_abandons_round_unscored() {
        let (mut game, a, b, c) = started_game();
        game.submit_answer(&a, Answer::Text("Paris".into())).unwrap();
        game.submit_answer(&b, Answer::Text("Lyon".into())).unwrap();
        game.take_effects();

        game.end_game(HOST).unwrap();
        let effects = game.take_effects();

        assert_eq!(game.game_state(), GameState::GameOver);
        assert!(game.participants.iter().all(|p| p.score == 0));
        assert!(effects.contains(&Effect::CancelTimer));
        match &messages_for(&effects, &c)[0] {
            ServerMessage::GameOver(info) => {
                assert!(info.is_tie);
                assert_eq!(info.winners.len(), 3);
            }
            other => panic!("Expected GameOver, got {:?}", other),
        }

        assert_eq!(game.end_game(HOST), Err(GameError::PhaseMismatch));
        assert_eq!(
            game.submit_vote(&c, "A"),
            Err(GameError::PhaseMismatch)
        );
    }

    #[test]
    fn test_results_wait_for_host_without_results_timer() {
        let mut game = game_with(
            vec![
                question(1, &["Paris", "Lyon"], 0),
                question(2, &["Mars", "Venus"], 0),
            ],
            GameConfig {
                results_seconds: None,
                ..config()
            },
        );
        let a = add_player(&mut game, "A");
        let b = add_player(&mut game, "B");
        let c = add_player(&mut game, "C");
        game.select_question(HOST, 1).unwrap();
        game.submit_answer(&a, Answer::Text("Paris".into())).unwrap();
        game.submit_answer(&b, Answer::Text("Lyon".into())).unwrap();
        game.take_effects();

        game.submit_vote(&c, "A").unwrap();
        let effects = game.take_effects();
        assert_eq!(game.game_state(), GameState::Results);
        assert!(!effects
            .iter()
            .any(|e| matches!(e, Effect::StartTimer { phase: RoundPhase::Results, .. })));
        assert!(game.round.as_ref().unwrap().deadline.is_none());

        // Other players cannot move it on either
        assert_eq!(
            game.next_round(&c),
            Err(GameError::Forbidden("Only the host can start the next round"))
        );
        assert_eq!(game.game_state(), GameState::Results);

        game.next_round(HOST).unwrap();
        assert_eq!(game.game_state(), GameState::Lobby);
    }

    #[test]
    fn test_results_timer_starts_when_configured() {
        let (mut game, a, b, c) = started_game();
        game.submit_answer(&a, Answer::Text("Paris".into())).unwrap();
        game.submit_answer(&b, Answer::Text("Lyon".into())).unwrap();
        game.take_effects();

        game.submit_vote(&c, "A").unwrap();
        assert!(game.take_effects().contains(&Effect::StartTimer {
            generation: game.generation,
            phase: RoundPhase::Results,
            seconds: 10,
        }));
    }
}
