//! Timer tasks that feed back into a game's command queue

use super::actor::Command;
use crate::types::RoundPhase;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Count a phase down once per second, then report expiry.
///
/// Every message carries the round generation; the game ignores the ones
/// that belong to a round or phase it already left.
pub fn spawn_phase_timer(
    cmd_tx: mpsc::Sender<Command>,
    generation: u64,
    phase: RoundPhase,
    seconds: u32,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        for remaining in (1..seconds).rev() {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let tick = Command::TimerTick {
                generation,
                phase,
                remaining,
            };
            if cmd_tx.send(tick).await.is_err() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        let _ = cmd_tx
            .send(Command::TimerExpired { generation, phase })
            .await;
    })
}

/// Send `cmd` to the game after `after`
pub fn spawn_delayed(
    cmd_tx: mpsc::Sender<Command>,
    after: Duration,
    cmd: Command,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let _ = cmd_tx.send(cmd).await;
    })
}

/// Handles of the timers one game has running
#[derive(Default)]
pub struct Timers {
    phase: Option<JoinHandle<()>>,
    host_check: Option<JoinHandle<()>>,
    close: Option<JoinHandle<()>>,
}

fn replace(slot: &mut Option<JoinHandle<()>>, handle: Option<JoinHandle<()>>) {
    if let Some(old) = std::mem::replace(slot, handle) {
        old.abort();
    }
}

impl Timers {
    pub fn set_phase(&mut self, handle: JoinHandle<()>) {
        replace(&mut self.phase, Some(handle));
    }

    pub fn cancel_phase(&mut self) {
        replace(&mut self.phase, None);
    }

    pub fn set_host_check(&mut self, handle: JoinHandle<()>) {
        replace(&mut self.host_check, Some(handle));
    }

    pub fn set_close(&mut self, handle: JoinHandle<()>) {
        replace(&mut self.close, Some(handle));
    }

    pub fn abort_all(&mut self) {
        replace(&mut self.phase, None);
        replace(&mut self.host_check, None);
        replace(&mut self.close, None);
    }
}
