// The authoritative simulation loop for the single shared game.

use crate::domain::{GameSnapshot, GameState, Grid, TickOutcome};
use crate::use_cases::input::DirectionArbiter;
use crate::use_cases::types::DirectionRequest;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::{debug, info};

/// Fixed timing for the simulation loop. Supplied at startup, never mutated.
#[derive(Debug, Clone, Copy)]
pub struct SimSettings {
    /// Delay between movement ticks.
    pub tick_interval: Duration,
    /// Grace period between the game-over broadcast and the reset.
    pub game_over_cooldown: Duration,
    /// Minimum spacing between accepted direction changes.
    pub direction_debounce: Duration,
}

/// Drives the game forever: drain steering, advance one tick, broadcast.
///
/// This task is the only writer of the game state; steering arrives over the
/// channel and is arbitrated here, in arrival order, at the top of each tick.
/// Snapshots go out on every tick and on both game-over and reset
/// transitions. There is no stop condition; the task lives as long as the
/// process.
pub async fn game_task(
    mut state: GameState,
    grid: Grid,
    settings: SimSettings,
    mut steering_rx: mpsc::Receiver<DirectionRequest>,
    snapshot_tx: broadcast::Sender<GameSnapshot>,
) {
    let mut rng = StdRng::from_entropy();
    let mut arbiter = DirectionArbiter::new(settings.direction_debounce);

    loop {
        drain_steering(&mut steering_rx, &mut arbiter, &mut state);

        let outcome = state.step(&grid, &mut rng);
        let _ = snapshot_tx.send(state.snapshot());

        if outcome == TickOutcome::Collided {
            info!(
                score = state.score,
                length = state.snake.len(),
                "snake collided; game over"
            );
            sleep(settings.game_over_cooldown).await;

            // Steering sent while the board was frozen does not carry into
            // the fresh game.
            while steering_rx.try_recv().is_ok() {}

            state.reset(&grid, &mut rng);
            let _ = snapshot_tx.send(state.snapshot());
            // Straight back into movement; the cooldown was the only pause.
            continue;
        }

        sleep(settings.tick_interval).await;
    }
}

fn drain_steering(
    steering_rx: &mut mpsc::Receiver<DirectionRequest>,
    arbiter: &mut DirectionArbiter,
    state: &mut GameState,
) {
    while let Ok(request) = steering_rx.try_recv() {
        if arbiter.submit(state, request.direction, request.requested_at) {
            debug!(direction = ?state.direction, "direction changed");
        }
    }
}
