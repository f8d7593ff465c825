//! Fixed-rate tick loop, one task per game

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::info;

use crate::ws::protocol::ServerMsg;

use super::registry::{GameEntry, GameRegistry};

/// How long a game may sit without players before it is reaped
pub const EMPTY_GAME_GRACE: Duration = Duration::from_secs(30);

/// Period between ticks. Never zero, which `interval` rejects.
fn tick_period(tick_rate: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(tick_rate.max(1))).max(Duration::from_micros(1))
}

pub fn spawn(
    registry: Arc<GameRegistry>,
    entry: Arc<GameEntry>,
    tick_rate: u32,
    empty_grace: Duration,
) -> JoinHandle<()> {
    tokio::spawn(run(registry, entry, tick_rate, empty_grace))
}

/// Tick the game until it is closed or has been empty for `empty_grace`
pub async fn run(
    registry: Arc<GameRegistry>,
    entry: Arc<GameEntry>,
    tick_rate: u32,
    empty_grace: Duration,
) {
    info!(game_id = %entry.id, tick_rate, "Game loop started");

    let mut tick_interval = interval(tick_period(tick_rate));
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut empty_since: Option<Instant> = None;

    loop {
        tick_interval.tick().await;

        if entry.is_closed() {
            break;
        }

        let (report, state) = {
            let mut game = entry.lock();
            let report = game.update();
            (report, game.get_state())
        };

        for kill in &report.kills {
            info!(
                game_id = %entry.id,
                killer_id = %kill.killer_id,
                victim_id = %kill.victim_id,
                experience = kill.experience_awarded,
                "Player defeated"
            );
        }
        for projectile in report.projectiles_created {
            entry.broadcast(ServerMsg::ProjectileCreated { projectile });
        }

        let empty = state.players.is_empty();
        entry.broadcast(ServerMsg::GameState { state });

        if empty {
            let since = *empty_since.get_or_insert_with(Instant::now);
            if since.elapsed() >= empty_grace && registry.remove_if_empty(&entry.id) {
                break;
            }
        } else {
            empty_since = None;
        }
    }

    info!(game_id = %entry.id, "Game loop stopped");
}
