//! Direction of travel along the route sequence.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Direction of travel relative to the global station ordering.
///
/// East means toward lower order indices, West toward higher ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Unknown,
    East,
    West,
}

impl Direction {
    /// Infer a direction from two order indices, `from` then `to`.
    ///
    /// Returns `None` when the indices are equal.
    ///
    /// # Examples
    ///
    /// ```
    /// use station_dispatch::domain::Direction;
    ///
    /// assert_eq!(Direction::between(0, 2), Some(Direction::West));
    /// assert_eq!(Direction::between(4, 1), Some(Direction::East));
    /// assert_eq!(Direction::between(3, 3), None);
    /// ```
    pub fn between(from: usize, to: usize) -> Option<Direction> {
        match from.cmp(&to) {
            std::cmp::Ordering::Less => Some(Direction::West),
            std::cmp::Ordering::Greater => Some(Direction::East),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn is_known(self) -> bool {
        self != Direction::Unknown
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Unknown => f.write_str("unknown"),
            Direction::East => f.write_str("east"),
            Direction::West => f.write_str("west"),
        }
    }
}

/// Which of the two terminus stations a train is at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminusSide {
    /// The terminus with the lower order index.
    East,
    /// The terminus with the higher order index.
    West,
}

impl TerminusSide {
    /// The heading a train takes when it leaves this terminus into the route.
    pub fn departing_direction(self) -> Direction {
        match self {
            TerminusSide::East => Direction::West,
            TerminusSide::West => Direction::East,
        }
    }
}

/// What a train does once it reaches a terminus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    /// Continue forward through a balloon loop or wye; no reversal.
    Loop,
    /// Reverse the locomotive and run back along the line.
    #[default]
    PointToPoint,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn departing_direction_points_back_into_route() {
        assert_eq!(TerminusSide::East.departing_direction(), Direction::West);
        assert_eq!(TerminusSide::West.departing_direction(), Direction::East);
    }

    #[test]
    fn serde_names() {
        assert_eq!(serde_json::to_string(&Direction::West).unwrap(), r#""west""#);
        assert_eq!(
            serde_json::from_str::<TravelMode>(r#""point_to_point""#).unwrap(),
            TravelMode::PointToPoint
        );
    }
}
