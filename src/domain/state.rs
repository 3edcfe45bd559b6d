// Domain-level game state: the snake, its food, and the per-tick step rule.

use crate::domain::grid::Grid;
use rand::Rng;
use std::collections::VecDeque;

/// Board cell. Always kept inside [0, grid size) on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

/// Travel direction of the snake head, in screen coordinates (up is -y).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    /// Head displacement for one tick.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }
}

/// What a single tick did to the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The snake moved one cell; length unchanged.
    Moved,
    /// The snake moved onto the food and grew by one cell.
    Ate,
    /// The new head landed on the body; the game is over.
    Collided,
}

/// Authoritative state of the single shared game.
///
/// Mutated only by the simulation task: the step rule below plus the
/// direction writes committed by the steering arbiter.
#[derive(Debug, Clone)]
pub struct GameState {
    /// Body cells, head first. Never empty.
    pub snake: VecDeque<Coordinate>,
    pub direction: Direction,
    /// Never equal to any cell of the snake.
    pub food: Coordinate,
    pub score: u32,
    pub game_over: bool,
}

impl GameState {
    /// Fresh game: one-segment snake on the board center, heading right,
    /// food on a random free cell.
    pub fn new<R: Rng>(grid: &Grid, rng: &mut R) -> Self {
        let mut snake = VecDeque::with_capacity(16);
        snake.push_back(grid.center());
        let food = grid
            .random_empty_cell(rng, |cell| snake.contains(&cell))
            .expect("fresh board always has a free cell for food");
        Self {
            snake,
            direction: Direction::Right,
            food,
            score: 0,
            game_over: false,
        }
    }

    /// Advances the game by one tick.
    ///
    /// The new head is checked against the whole pre-move body, tail cell
    /// included, so chasing the own tail is terminal. On collision nothing
    /// but `game_over` changes. Eating grows the snake by keeping the tail
    /// and draws a replacement food off the body.
    pub fn step<R: Rng>(&mut self, grid: &Grid, rng: &mut R) -> TickOutcome {
        let head = self
            .snake
            .front()
            .copied()
            .expect("snake body is never empty");
        let (dx, dy) = self.direction.delta();
        let new_head = grid.wrap(Coordinate {
            x: head.x + dx,
            y: head.y + dy,
        });

        if self.snake.contains(&new_head) {
            self.game_over = true;
            return TickOutcome::Collided;
        }

        self.snake.push_front(new_head);
        if new_head == self.food {
            self.score += 1;
            self.food = grid
                .random_empty_cell(rng, |cell| self.snake.contains(&cell))
                .expect("no free cell left to place food");
            TickOutcome::Ate
        } else {
            self.snake.pop_back();
            TickOutcome::Moved
        }
    }

    /// Puts the game back into its initial shape with a fresh random food.
    pub fn reset<R: Rng>(&mut self, grid: &Grid, rng: &mut R) {
        *self = GameState::new(grid, rng);
    }

    /// Point-in-time copy handed to the broadcast pipeline.
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            snake: self.snake.iter().copied().collect(),
            direction: self.direction,
            food: self.food,
            score: self.score,
            game_over: self.game_over,
        }
    }
}

/// Immutable view of the game as of one tick, head first.
#[derive(Debug, Clone)]
pub struct GameSnapshot {
    pub snake: Vec<Coordinate>,
    pub direction: Direction,
    pub food: Coordinate,
    pub score: u32,
    pub game_over: bool,
}
