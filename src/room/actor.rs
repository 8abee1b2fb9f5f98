//! The task that owns one `Game` and applies commands to it in order

use super::timer::{self, Timers};
use super::{GameSummary, Registry};
use crate::broadcast::Dispatcher;
use crate::state::{Effect, Game};
use crate::types::*;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Everything a game task can be asked to do
#[derive(Debug)]
pub enum Command {
    Join {
        conn: ConnId,
        username: String,
    },
    Announce {
        conn: ConnId,
        host_token: Option<String>,
        username: Option<String>,
    },
    SelectQuestion {
        conn: ConnId,
        question_id: QuestionId,
    },
    SubmitAnswer {
        conn: ConnId,
        answer: Answer,
    },
    SubmitVote {
        conn: ConnId,
        contestant: Username,
    },
    NextRound {
        conn: ConnId,
    },
    EndGame {
        conn: ConnId,
    },
    Chat {
        conn: ConnId,
        message: String,
    },
    Disconnect {
        conn: ConnId,
    },
    /// The connection fell behind on deliveries and needs a fresh snapshot
    Resync {
        conn: ConnId,
    },
    TimerTick {
        generation: u64,
        phase: RoundPhase,
        remaining: u32,
    },
    TimerExpired {
        generation: u64,
        phase: RoundPhase,
    },
    HostCheck {
        epoch: u64,
    },
    CloseExpired,
    Inspect {
        reply: oneshot::Sender<GameSummary>,
    },
}

/// Apply one command. Failed requests are answered to their sender only.
fn apply(game: &mut Game, cmd: Command) {
    let (conn, result) = match cmd {
        Command::Join { conn, username } => {
            let result = game.join(&conn, &username);
            (conn, result)
        }
        Command::Announce {
            conn,
            host_token,
            username,
        } => {
            let result = game.announce(&conn, host_token.as_deref(), username.as_deref());
            (conn, result)
        }
        Command::SelectQuestion { conn, question_id } => {
            let result = game.select_question(&conn, question_id);
            (conn, result)
        }
        Command::SubmitAnswer { conn, answer } => {
            let result = game.submit_answer(&conn, answer);
            (conn, result)
        }
        Command::SubmitVote { conn, contestant } => {
            let result = game.submit_vote(&conn, &contestant);
            (conn, result)
        }
        Command::NextRound { conn } => {
            let result = game.next_round(&conn);
            (conn, result)
        }
        Command::EndGame { conn } => {
            let result = game.end_game(&conn);
            (conn, result)
        }
        Command::Chat { conn, message } => {
            let result = game.send_chat(&conn, &message);
            (conn, result)
        }
        Command::Disconnect { conn } => {
            game.disconnect(&conn);
            return;
        }
        Command::Resync { conn } => {
            game.resync(&conn);
            return;
        }
        Command::TimerTick {
            generation,
            phase,
            remaining,
        } => {
            game.timer_tick(generation, phase, remaining);
            return;
        }
        Command::TimerExpired { generation, phase } => {
            game.timer_expired(generation, phase);
            return;
        }
        Command::HostCheck { epoch } => {
            game.host_check(epoch);
            return;
        }
        Command::CloseExpired => {
            game.close_expired();
            return;
        }
        Command::Inspect { reply } => {
            let _ = reply.send(GameSummary::of(game));
            return;
        }
    };

    if let Err(err) = result {
        game.reject(&conn, err);
    }
}

/// Run a game until it closes, then drop it from the registry
pub(super) async fn run(
    mut game: Game,
    mut cmd_rx: mpsc::Receiver<Command>,
    cmd_tx: mpsc::Sender<Command>,
    dispatcher: Arc<dyn Dispatcher>,
    registry: Arc<Registry>,
) {
    let mut timers = Timers::default();

    // Effects queued while the game was being created
    let mut closing = execute(&mut game, &mut timers, &cmd_tx, dispatcher.as_ref());

    while !closing {
        let Some(cmd) = cmd_rx.recv().await else {
            break;
        };
        apply(&mut game, cmd);
        closing = execute(&mut game, &mut timers, &cmd_tx, dispatcher.as_ref());
    }

    timers.abort_all();
    registry.remove(&game.code).await;
    tracing::info!("Game {} task ended", game.code);
}

/// Carry out queued effects. Returns true once the game asked to close.
fn execute(
    game: &mut Game,
    timers: &mut Timers,
    cmd_tx: &mpsc::Sender<Command>,
    dispatcher: &dyn Dispatcher,
) -> bool {
    let mut closing = false;
    for effect in game.take_effects() {
        match effect {
            Effect::Deliver(delivery) => dispatcher.dispatch(delivery),
            Effect::StartTimer {
                generation,
                phase,
                seconds,
            } => {
                timers.set_phase(timer::spawn_phase_timer(
                    cmd_tx.clone(),
                    generation,
                    phase,
                    seconds,
                ));
            }
            Effect::CancelTimer => timers.cancel_phase(),
            Effect::ScheduleHostCheck { epoch, after } => {
                timers.set_host_check(timer::spawn_delayed(
                    cmd_tx.clone(),
                    after,
                    Command::HostCheck { epoch },
                ));
            }
            Effect::ScheduleClose { after } => {
                timers.set_close(timer::spawn_delayed(
                    cmd_tx.clone(),
                    after,
                    Command::CloseExpired,
                ));
            }
            Effect::Close => closing = true,
        }
    }
    closing
}
