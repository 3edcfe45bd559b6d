// Toroidal board geometry and spatial queries. Pure; no shared state.

use crate::domain::state::Coordinate;
use rand::Rng;
use rand::seq::SliceRandom;

/// Square board whose edges wrap: every coordinate maps into [0, size) on
/// both axes.
#[derive(Debug, Clone, Copy)]
pub struct Grid {
    size: i32,
}

impl Grid {
    pub fn new(size: i32) -> Self {
        assert!(size > 0, "grid size must be positive");
        Self { size }
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    /// Wraps a coordinate onto the board. Negative and out-of-range values
    /// land on the opposite edge.
    pub fn wrap(&self, coord: Coordinate) -> Coordinate {
        Coordinate {
            x: coord.x.rem_euclid(self.size),
            y: coord.y.rem_euclid(self.size),
        }
    }

    /// Cell the snake spawns on.
    pub fn center(&self) -> Coordinate {
        Coordinate {
            x: self.size / 2,
            y: self.size / 2,
        }
    }

    /// Picks a uniformly random cell for which `is_occupied` is false.
    ///
    /// Free cells are enumerated up front rather than rejection-sampled, so
    /// the call terminates no matter how crowded the board is. Returns `None`
    /// only when every cell is occupied.
    pub fn random_empty_cell<R, F>(&self, rng: &mut R, is_occupied: F) -> Option<Coordinate>
    where
        R: Rng,
        F: Fn(Coordinate) -> bool,
    {
        let mut free = Vec::new();
        for y in 0..self.size {
            for x in 0..self.size {
                let cell = Coordinate { x, y };
                if !is_occupied(cell) {
                    free.push(cell);
                }
            }
        }
        free.choose(rng).copied()
    }
}
