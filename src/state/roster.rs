use super::{Effect, Game};
use crate::error::{GameError, GameResult};
use crate::protocol::{PlayerInfo, ServerMessage};
use crate::types::*;
use rand::seq::IndexedRandom;
use std::time::Duration;

const MAX_USERNAME_CHARS: usize = 20;

/// Avatar colors, handed out in join order
const AVATAR_COLORS: &[&str] = &[
    "#E53935", "#1E88E5", "#43A047", "#FDD835", "#8E24AA", "#FB8C00", "#00ACC1", "#D81B60",
    "#6D4C41", "#3949AB", "#7CB342", "#F4511E", "#5E35B1", "#00897B", "#C0CA33", "#546E7A",
    "#FFB300", "#039BE5", "#8D6E63", "#EC407A", "#26A69A", "#AB47BC", "#9CCC65", "#FF7043",
];

impl Game {
    /// Register a new participant by username
    pub fn join(&mut self, conn: &str, username: &str) -> GameResult<()> {
        if self.lifecycle == Lifecycle::GameOver {
            return Err(GameError::RoomClosed);
        }

        let username = username.trim();
        if username.is_empty() {
            return Err(GameError::InvalidUsername("username cannot be empty".to_string()));
        }
        if username.chars().count() > MAX_USERNAME_CHARS {
            return Err(GameError::InvalidUsername(format!(
                "username cannot exceed {} characters",
                MAX_USERNAME_CHARS
            )));
        }
        if username.eq_ignore_ascii_case(HOST_DISPLAY_NAME)
            || self
                .participants
                .iter()
                .any(|p| p.username.to_lowercase() == username.to_lowercase())
        {
            return Err(GameError::UsernameTaken);
        }

        let color = self.next_color();
        let participant = Participant {
            username: username.to_string(),
            color: color.clone(),
            connection: None,
            score: 0,
            join_seq: self.next_join_seq,
            last_played_round: None,
        };
        self.next_join_seq += 1;
        self.participants.push(participant);

        tracing::info!("{} has joined the game {}", username, self.code);

        self.send_to(
            conn,
            ServerMessage::JoinSuccess {
                game_code: self.code.clone(),
                username: username.to_string(),
                color,
            },
        );
        self.broadcast_player_list();
        Ok(())
    }

    /// First unused palette color, a random one once the palette runs out
    fn next_color(&self) -> String {
        AVATAR_COLORS
            .iter()
            .find(|c| !self.participants.iter().any(|p| p.color == **c))
            .or_else(|| AVATAR_COLORS.choose(&mut rand::rng()))
            .map(|c| c.to_string())
            .unwrap_or_default()
    }

    /// Bind a connection to the host or a registered participant and resync it
    pub fn announce(
        &mut self,
        conn: &str,
        host_token: Option<&str>,
        username: Option<&str>,
    ) -> GameResult<()> {
        let identity = if host_token.is_some_and(|t| t == self.host_token) {
            Identity::Host
        } else if let Some(name) = username.map(str::trim) {
            let participant = self
                .participants
                .iter()
                .find(|p| p.username.to_lowercase() == name.to_lowercase())
                .ok_or(GameError::UnknownIdentity)?;
            Identity::Player(participant.username.clone())
        } else {
            return Err(GameError::UnknownIdentity);
        };

        // A connection speaks for one identity at a time
        if let Some(previous) = self.identity_of(conn) {
            if previous != identity {
                self.detach(conn);
            }
        }

        match &identity {
            Identity::Host => {
                self.host_connection = Some(conn.to_string());
                self.host_epoch += 1;
                tracing::info!("Host attached to game {}", self.code);
            }
            Identity::Player(name) => {
                if let Some(p) = self.participant_mut(name) {
                    p.connection = Some(conn.to_string());
                }
                tracing::info!("{} attached to game {}", name, self.code);
            }
        }

        let snapshot = self.snapshot(&identity);
        self.send_to(conn, ServerMessage::IdentityConfirmed(Box::new(snapshot)));
        self.broadcast_player_list();
        Ok(())
    }

    /// Clear whatever identity `conn` was bound to. Returns it.
    fn detach(&mut self, conn: &str) -> Option<Identity> {
        let identity = self.identity_of(conn)?;
        match &identity {
            Identity::Host => {
                self.host_connection = None;
                self.schedule_host_check();
            }
            Identity::Player(name) => {
                if let Some(p) = self.participant_mut(name) {
                    p.connection = None;
                }
            }
        }
        Some(identity)
    }

    /// Connection went away. Identity and score are kept for a later reconnect.
    pub fn disconnect(&mut self, conn: &str) {
        match self.detach(conn) {
            Some(Identity::Host) => {
                tracing::info!("Host of game {} disconnected", self.code);
            }
            Some(Identity::Player(name)) => {
                tracing::info!("{} disconnected from game {}", name, self.code);
                self.broadcast_player_list();
                // Nobody waits for a voter who left
                self.check_voting_complete();
            }
            None => {}
        }
    }

    pub(super) fn schedule_host_check(&mut self) {
        self.host_epoch += 1;
        self.effects.push(Effect::ScheduleHostCheck {
            epoch: self.host_epoch,
            after: Duration::from_secs(self.config.host_grace_seconds),
        });
    }

    /// Close the room if the host is still gone since check `epoch` was scheduled
    pub fn host_check(&mut self, epoch: u64) {
        if epoch != self.host_epoch || self.host_connection.is_some() {
            return;
        }
        self.close_room("The game has closed as the host disconnected");
    }

    pub fn player_list(&self) -> Vec<PlayerInfo> {
        self.participants.iter().map(PlayerInfo::from).collect()
    }

    pub(super) fn broadcast_player_list(&mut self) {
        let players = self.player_list();
        self.broadcast_to_all(ServerMessage::UpdatePlayerList { players });
    }
}
