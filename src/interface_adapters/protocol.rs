// Wire protocol DTOs and conversions for the public snapshot stream.
// Domain types stay serde-free; everything on the wire goes through here.

use crate::domain::{Direction, GameSnapshot};
use serde::{Deserialize, Serialize};

/// Direction token as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectionDto {
    Left,
    Right,
    Up,
    Down,
}

impl From<Direction> for DirectionDto {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Left => DirectionDto::Left,
            Direction::Right => DirectionDto::Right,
            Direction::Up => DirectionDto::Up,
            Direction::Down => DirectionDto::Down,
        }
    }
}

impl From<DirectionDto> for Direction {
    fn from(dto: DirectionDto) -> Self {
        match dto {
            DirectionDto::Left => Direction::Left,
            DirectionDto::Right => Direction::Right,
            DirectionDto::Up => Direction::Up,
            DirectionDto::Down => Direction::Down,
        }
    }
}

/// Steering command sent by a client. Anything that fails to parse into
/// this shape is ignored at the connection layer.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SteerCommand {
    pub direction: DirectionDto,
}

/// Snapshot of the game sent to every subscriber on each tick, snake cells
/// head first.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotDto {
    pub snake: Vec<[i32; 2]>,
    pub food: [i32; 2],
    pub direction: DirectionDto,
    pub score: u32,
    pub game_over: bool,
}

impl From<&GameSnapshot> for SnapshotDto {
    fn from(snapshot: &GameSnapshot) -> Self {
        Self {
            snake: snapshot.snake.iter().map(|cell| [cell.x, cell.y]).collect(),
            food: [snapshot.food.x, snapshot.food.y],
            direction: snapshot.direction.into(),
            score: snapshot.score,
            game_over: snapshot.game_over,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Coordinate;

    #[test]
    fn snapshot_serializes_to_the_documented_shape() {
        let snapshot = GameSnapshot {
            snake: vec![Coordinate { x: 11, y: 10 }, Coordinate { x: 10, y: 10 }],
            direction: Direction::Left,
            food: Coordinate { x: 3, y: 4 },
            score: 2,
            game_over: false,
        };

        let value = serde_json::to_value(SnapshotDto::from(&snapshot)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "snake": [[11, 10], [10, 10]],
                "food": [3, 4],
                "direction": "left",
                "score": 2,
                "game_over": false,
            })
        );
    }

    #[test]
    fn direction_tokens_are_lowercase_on_the_wire() {
        for (direction, token) in [
            (Direction::Left, "\"left\""),
            (Direction::Right, "\"right\""),
            (Direction::Up, "\"up\""),
            (Direction::Down, "\"down\""),
        ] {
            let dto = DirectionDto::from(direction);
            assert_eq!(serde_json::to_string(&dto).unwrap(), token);
        }
    }

    #[test]
    fn steer_commands_parse_all_four_tokens() {
        for (token, expected) in [
            ("left", Direction::Left),
            ("right", Direction::Right),
            ("up", Direction::Up),
            ("down", Direction::Down),
        ] {
            let raw = format!(r#"{{"direction":"{token}"}}"#);
            let cmd: SteerCommand = serde_json::from_str(&raw).unwrap();
            assert_eq!(Direction::from(cmd.direction), expected);
        }
    }

    #[test]
    fn bad_steering_payloads_fail_to_parse() {
        for raw in [
            "not json",
            "{}",
            r#"{"direction":"diagonal"}"#,
            r#"{"direction":7}"#,
            r#"{"dir":"left"}"#,
        ] {
            assert!(serde_json::from_str::<SteerCommand>(raw).is_err());
        }
    }

    #[test]
    fn unknown_extra_fields_are_tolerated() {
        let cmd: SteerCommand =
            serde_json::from_str(r#"{"direction":"up","ts":123}"#).unwrap();
        assert_eq!(Direction::from(cmd.direction), Direction::Up);
    }
}
