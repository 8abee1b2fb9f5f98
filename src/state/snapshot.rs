use super::Game;
use crate::protocol::{PlayerInfo, QuestionView, ServerMessage, Snapshot};
use crate::types::*;

impl Game {
    /// Everything `identity` needs to rebuild its view. Used on first
    /// announce and on every reconnect.
    pub fn snapshot(&self, identity: &Identity) -> Snapshot {
        let is_host = *identity == Identity::Host;
        let me = match identity {
            Identity::Player(name) => self.participant(name),
            Identity::Host => None,
        };
        let round = self.round.as_ref();

        let (username, color) = match me {
            Some(p) => (p.username.clone(), p.color.clone()),
            None => (HOST_DISPLAY_NAME.to_string(), HOST_COLOR.to_string()),
        };
        let is_contestant =
            me.is_some_and(|p| round.is_some_and(|r| r.is_contestant(&p.username)));
        let is_audience = me.is_some() && round.is_some() && !is_contestant;

        let current_contestants: Vec<PlayerInfo> = round
            .map(|r| {
                r.contestants
                    .iter()
                    .filter_map(|c| self.participant(c))
                    .map(PlayerInfo::from)
                    .collect()
            })
            .unwrap_or_default();

        let answers = round
            .filter(|r| r.phase != RoundPhase::Answering)
            .map(|_| self.sealed_answers());

        Snapshot {
            game_code: self.code.clone(),
            is_host,
            username,
            color,
            players: self.player_list(),
            current_contestants,
            my_score: me.map(|p| p.score).unwrap_or(0),
            game_state: self.game_state(),
            round_no: round.map(|r| r.number).unwrap_or(self.rounds_played),
            current_question: self.current_question().map(QuestionView::from),
            deadline: round.and_then(|r| r.deadline.clone()),
            is_contestant,
            is_audience,
            has_submitted: me
                .is_some_and(|p| round.is_some_and(|r| r.answers.contains_key(&p.username))),
            has_voted: me
                .is_some_and(|p| round.is_some_and(|r| r.votes.contains_key(&p.username))),
            answers,
            questions: is_host.then(|| self.questions.to_vec()),
            used_question_ids: is_host.then(|| self.used_question_ids.clone()),
        }
    }

    /// Resend the full view to a connection that missed deliveries.
    /// Connections without an identity have nothing to rebuild.
    pub fn resync(&mut self, conn: &str) {
        let Some(identity) = self.identity_of(conn) else {
            return;
        };
        tracing::debug!("Game {}: resyncing {}", self.code, conn);
        let snapshot = self.snapshot(&identity);
        self.send_to(conn, ServerMessage::IdentityConfirmed(Box::new(snapshot)));
    }
}
