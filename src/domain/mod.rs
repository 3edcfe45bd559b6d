// Domain layer: board geometry and game rules.

pub mod grid;
pub mod state;

pub use grid::Grid;
pub use state::{Coordinate, Direction, GameSnapshot, GameState, TickOutcome};
