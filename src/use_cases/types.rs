// Use-case level inputs for the simulation loop.

use crate::domain::Direction;
use tokio::time::Instant;

/// A steering command captured at the connection boundary.
///
/// `requested_at` is the arrival time off the socket. The simulation drains
/// queued requests at the top of each tick, and debounce decisions use the
/// arrival time rather than the drain time.
#[derive(Debug, Clone, Copy)]
pub struct DirectionRequest {
    pub direction: Direction,
    pub requested_at: Instant,
}
