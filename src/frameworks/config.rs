use std::{env, time::Duration};

// Runtime/server constants (not gameplay tuning).

pub fn http_port() -> u16 {
    env::var("SNAKE_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000)
}

pub const STEERING_CHANNEL_CAPACITY: usize = 1024;
pub const SNAPSHOT_BROADCAST_CAPACITY: usize = 128;

// Gameplay tuning: board geometry and loop timing.
pub const GRID_SIZE: i32 = 20;
pub const TICK_INTERVAL: Duration = Duration::from_millis(200);
pub const GAME_OVER_COOLDOWN: Duration = Duration::from_secs(2);
pub const DIRECTION_DEBOUNCE: Duration = Duration::from_millis(100);
