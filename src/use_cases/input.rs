// Steering arbitration: debounce plus reversal rejection.

use crate::domain::{Direction, GameState};
use std::time::Duration;
use tokio::time::Instant;

/// Gate in front of the game state's direction field.
///
/// A command is committed only if the debounce window since the last
/// accepted change has fully elapsed and the command is not the geometric
/// opposite of the current travel direction. Rejections are silent; senders
/// are never told their command was dropped.
#[derive(Debug)]
pub struct DirectionArbiter {
    debounce: Duration,
    last_change: Option<Instant>,
}

impl DirectionArbiter {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            last_change: None,
        }
    }

    /// Commits `requested` to `state.direction` if accepted. Returns whether
    /// the command was committed.
    pub fn submit(&mut self, state: &mut GameState, requested: Direction, now: Instant) -> bool {
        if let Some(last) = self.last_change {
            // Strict window: a change landing exactly on the boundary is
            // still rejected.
            if now.duration_since(last) <= self.debounce {
                return false;
            }
        }

        // Compared against the live direction field, not the direction the
        // last tick actually moved in. Two quick accepted changes between
        // ticks can therefore still reverse the snake within one tick.
        if requested == state.direction.opposite() {
            return false;
        }

        state.direction = requested;
        self.last_change = Some(now);
        true
    }
}
