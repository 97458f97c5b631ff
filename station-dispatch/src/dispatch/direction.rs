//! Direction-of-travel inference.
//!
//! A heading is inferred from the move between the previous and current
//! station. East is toward lower order indices, West toward higher ones.

use crate::domain::{Direction, StationId, StationSequence};
use crate::route::Topology;

/// What can be concluded from the last move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inference {
    Resolved(Direction),
    /// No previous station, or the train has not moved.
    NoPrevious,
    /// The move crossed a branch junction whose pair is ambiguous.
    Ambiguous { junction: StationId },
    /// One of the stations is not on the line.
    OffRoute,
}

/// Infers a heading from station order and the branch table.
pub struct DirectionResolver<'a> {
    stations: &'a StationSequence,
    topology: &'a Topology,
}

impl<'a> DirectionResolver<'a> {
    pub fn new(stations: &'a StationSequence, topology: &'a Topology) -> Self {
        Self { stations, topology }
    }

    /// Infer the heading of a train that moved from `previous` to `current`.
    ///
    /// The stop-at sequence is ordered by global position, so comparing
    /// global indices gives the same answer as comparing positions within it.
    pub fn infer(&self, previous: Option<&StationId>, current: &StationId) -> Inference {
        let previous = match previous {
            Some(p) if p != current => p,
            _ => return Inference::NoPrevious,
        };

        if let Some(rule) = self.topology.ambiguous_between(previous, current) {
            return Inference::Ambiguous {
                junction: rule.junction.clone(),
            };
        }

        let (Some(from), Some(to)) = (
            self.stations.order_index(previous),
            self.stations.order_index(current),
        ) else {
            return Inference::OffRoute;
        };

        match Direction::between(from, to) {
            Some(direction) => Inference::Resolved(direction),
            None => Inference::NoPrevious,
        }
    }
}
