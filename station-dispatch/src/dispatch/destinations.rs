//! Expected car destinations.
//!
//! A car should accept passengers for every stop the train still has ahead
//! of it before the next terminus. Two adjustments apply on top of the plain
//! range: branch stations the train is leaving behind (or is about to visit)
//! and pickup stations reachable by changing at a transfer station.

use std::collections::BTreeSet;

use tracing::trace;

use crate::domain::{Direction, StationId, StationSequence, TrainId};
use crate::route::{RouteConfig, Termini, Topology};

use super::host::DispatchHost;

/// Which transfer rule extends the destination set.
///
/// Evaluated in declaration order; the first case that applies wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferCase {
    /// The terminus ahead is both a transfer station and a branch junction.
    /// Pickups beyond it, and pickups inside its branch, are carried to it.
    JunctionTerminus { junction: StationId },
    /// Pickups beyond the nearest transfer station ahead are carried to it.
    BeyondTransfer { transfer: StationId },
    /// No transfer station ahead.
    Normal,
}

/// Computes the destination set a train's cars should carry.
pub struct DestinationPlanner<'a> {
    stations: &'a StationSequence,
    topology: &'a Topology,
}

impl<'a> DestinationPlanner<'a> {
    pub fn new(stations: &'a StationSequence, topology: &'a Topology) -> Self {
        Self { stations, topology }
    }

    /// The destinations for a train at `current` that arrived from `previous`.
    ///
    /// Returns `None` while the direction is unknown or the termini cannot
    /// be resolved.
    pub fn expected(
        &self,
        config: &RouteConfig,
        current: &StationId,
        previous: Option<&StationId>,
    ) -> Option<BTreeSet<StationId>> {
        let direction = config.direction();
        let termini = config.termini(self.stations)?;
        let cur = self.stations.order_index(current)?;

        let (lo, hi) = match direction {
            Direction::West => (cur, termini.west_index),
            Direction::East => (termini.east_index, cur),
            Direction::Unknown => return None,
        };

        let mut expected: BTreeSet<StationId> = config
            .stop_at()
            .iter()
            .filter(|s| {
                self.stations
                    .order_index(s)
                    .is_some_and(|i| (lo..=hi).contains(&i))
            })
            .cloned()
            .collect();

        self.adjust_for_branch(&mut expected, config, direction, current, previous);

        let case = self.transfer_case(config, &termini, direction, cur);
        match &case {
            TransferCase::JunctionTerminus { junction } => {
                if let Some(j) = self.stations.order_index(junction) {
                    expected.extend(self.pickups_beyond(config, direction, j));
                }
                expected.extend(
                    self.topology
                        .branch_members_in(junction, config.pickup_for())
                        .cloned(),
                );
            }
            TransferCase::BeyondTransfer { transfer } => {
                if let Some(t) = self.stations.order_index(transfer) {
                    expected.extend(self.pickups_beyond(config, direction, t));
                }
            }
            TransferCase::Normal => {}
        }

        trace!(
            station = %current,
            direction = %direction,
            case = ?case,
            destinations = expected.len(),
            "Computed expected destinations"
        );

        Some(expected)
    }

    /// Pick the transfer rule for a train at order index `cur`.
    pub fn transfer_case(
        &self,
        config: &RouteConfig,
        termini: &Termini,
        direction: Direction,
        cur: usize,
    ) -> TransferCase {
        let Some((terminus, terminus_index)) = termini.ahead(direction) else {
            return TransferCase::Normal;
        };
        let strictly_ahead = |i: usize| match direction {
            Direction::West => i > cur && i <= terminus_index,
            Direction::East => i < cur && i >= terminus_index,
            Direction::Unknown => false,
        };

        if config.is_transfer(terminus)
            && strictly_ahead(terminus_index)
            && self.topology.junction_at(terminus).is_some()
        {
            return TransferCase::JunctionTerminus {
                junction: terminus.clone(),
            };
        }

        let ahead = config
            .transfer()
            .iter()
            .filter_map(|t| self.stations.order_index(t).map(|i| (i, t)))
            .filter(|(i, _)| strictly_ahead(*i));
        let nearest = match direction {
            Direction::West => ahead.min_by_key(|(i, _)| *i),
            _ => ahead.max_by_key(|(i, _)| *i),
        };

        match nearest {
            Some((_, transfer)) => TransferCase::BeyondTransfer {
                transfer: transfer.clone(),
            },
            None => TransferCase::Normal,
        }
    }

    fn pickups_beyond(
        &self,
        config: &RouteConfig,
        direction: Direction,
        from: usize,
    ) -> impl Iterator<Item = StationId> {
        let stations = self.stations;
        config
            .pickup_for()
            .iter()
            .filter(move |s| match (direction, stations.order_index(s)) {
                (Direction::West, Some(i)) => i > from,
                (Direction::East, Some(i)) => i < from,
                _ => false,
            })
            .cloned()
    }

    /// Drop branch stations the train is coming back out of, and add branch
    /// stops it is about to enter while heading east.
    fn adjust_for_branch(
        &self,
        expected: &mut BTreeSet<StationId>,
        config: &RouteConfig,
        direction: Direction,
        current: &StationId,
        previous: Option<&StationId>,
    ) {
        let Some(rule) = self.topology.rule_touching(current) else {
            return;
        };
        let cur_depth = rule.depth(current);
        let prev_depth = previous.and_then(|p| rule.depth(p));
        let leaving_branch = prev_depth > cur_depth;

        match direction {
            Direction::West if leaving_branch => {
                let visited = prev_depth.unwrap_or_default();
                for s in rule.branch.iter().skip(visited) {
                    expected.remove(s);
                }
            }
            Direction::East if !leaving_branch => {
                expected.extend(
                    rule.deeper_than(cur_depth)
                        .filter(|s| config.stop_at().contains(*s))
                        .cloned(),
                );
            }
            _ => {}
        }
    }
}

/// Send the expected destinations to every coupled car that disagrees.
///
/// Returns the number of cars updated.
pub fn push_destinations<H: DispatchHost + ?Sized>(
    host: &mut H,
    train: &TrainId,
    expected: &BTreeSet<StationId>,
) -> usize {
    let mut updated = 0;
    for car in host.passenger_cars(train) {
        if host.car_destinations(&car) != *expected {
            trace!(train = %train, car = %car, "Updating car destinations");
            host.set_car_destinations(&car, expected.clone());
            updated += 1;
        }
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::BranchRule;

    fn id(s: &str) -> StationId {
        StationId::parse(s).unwrap()
    }

    fn ids(names: &[&str]) -> BTreeSet<StationId> {
        names.iter().map(|s| id(s)).collect()
    }

    fn line(names: &[&str]) -> StationSequence {
        StationSequence::new(names.iter().map(|s| id(s)).collect()).unwrap()
    }

    fn route(stops: &[&str], east: &str, west: &str, direction: Direction) -> RouteConfig {
        let mut config = RouteConfig::new()
            .with_stops(&ids(stops))
            .with_termini(&id(east), &id(west));
        config.assign_direction(direction);
        config
    }

    #[test]
    fn west_range_runs_to_west_terminus() {
        let seq = line(&["a", "b", "c", "d", "e"]);
        let topo = Topology::linear();
        let planner = DestinationPlanner::new(&seq, &topo);
        let config = route(&["a", "b", "c", "d", "e"], "a", "e", Direction::West);

        let expected = planner.expected(&config, &id("c"), Some(&id("a"))).unwrap();
        assert_eq!(expected, ids(&["c", "d", "e"]));
    }

    #[test]
    fn east_range_runs_to_east_terminus() {
        let seq = line(&["a", "b", "c", "d", "e"]);
        let topo = Topology::linear();
        let planner = DestinationPlanner::new(&seq, &topo);
        let config = route(&["a", "c", "e"], "a", "e", Direction::East);

        let expected = planner.expected(&config, &id("c"), Some(&id("e"))).unwrap();
        assert_eq!(expected, ids(&["a", "c"]));
    }

    #[test]
    fn non_stops_are_excluded() {
        let seq = line(&["a", "b", "c", "d", "e"]);
        let topo = Topology::linear();
        let planner = DestinationPlanner::new(&seq, &topo);
        let config = route(&["a", "b", "e"], "a", "e", Direction::West);

        let expected = planner.expected(&config, &id("b"), Some(&id("a"))).unwrap();
        assert_eq!(expected, ids(&["b", "e"]));
    }

    #[test]
    fn unknown_direction_has_no_plan() {
        let seq = line(&["a", "b", "c"]);
        let topo = Topology::linear();
        let planner = DestinationPlanner::new(&seq, &topo);
        let config = route(&["a", "b", "c"], "a", "c", Direction::Unknown);
        assert_eq!(planner.expected(&config, &id("b"), None), None);
    }

    fn branch_line() -> (StationSequence, Topology) {
        let seq = line(&["a", "b", "jct", "spur", "stub", "d", "e"]);
        let topo = Topology::new(vec![BranchRule {
            junction: id("jct"),
            branch: vec![id("spur"), id("stub")],
            pivot: Some(id("stub")),
        }]);
        (seq, topo)
    }

    #[test]
    fn west_out_of_branch_drops_visited_branch_stations() {
        let (seq, topo) = branch_line();
        let planner = DestinationPlanner::new(&seq, &topo);
        let config = route(
            &["a", "jct", "spur", "stub", "d", "e"],
            "a",
            "e",
            Direction::West,
        );

        // Entering the branch keeps it.
        let entering = planner.expected(&config, &id("jct"), Some(&id("a"))).unwrap();
        assert_eq!(entering, ids(&["jct", "spur", "stub", "d", "e"]));

        // Back at the spur from the stub: the stub is done.
        let at_spur = planner.expected(&config, &id("spur"), Some(&id("stub"))).unwrap();
        assert_eq!(at_spur, ids(&["spur", "d", "e"]));

        // Back at the junction from the spur: the whole branch is done.
        let leaving = planner.expected(&config, &id("jct"), Some(&id("spur"))).unwrap();
        assert_eq!(leaving, ids(&["jct", "d", "e"]));
    }

    #[test]
    fn east_into_branch_adds_branch_stops() {
        let (seq, topo) = branch_line();
        let planner = DestinationPlanner::new(&seq, &topo);
        let config = route(
            &["a", "jct", "spur", "stub", "d", "e"],
            "a",
            "e",
            Direction::East,
        );

        let at_jct = planner.expected(&config, &id("jct"), Some(&id("d"))).unwrap();
        assert_eq!(at_jct, ids(&["a", "jct", "spur", "stub"]));

        let at_spur = planner.expected(&config, &id("spur"), Some(&id("jct"))).unwrap();
        assert_eq!(at_spur, ids(&["a", "jct", "spur", "stub"]));

        let coming_out = planner.expected(&config, &id("spur"), Some(&id("stub"))).unwrap();
        assert_eq!(coming_out, ids(&["a", "jct", "spur"]));
    }

    #[test]
    fn pickups_beyond_nearest_transfer() {
        let seq = line(&["a", "b", "c", "d", "e", "f", "g"]);
        let topo = Topology::linear();
        let planner = DestinationPlanner::new(&seq, &topo);
        let config = route(&["a", "b", "c", "d"], "a", "d", Direction::West)
            .with_transfers(&ids(&["c", "d"]))
            .with_pickups(&ids(&["a", "f", "g"]));

        let termini = config.termini(&seq).unwrap();
        assert_eq!(
            planner.transfer_case(&config, &termini, Direction::West, 1),
            TransferCase::BeyondTransfer { transfer: id("c") }
        );

        let expected = planner.expected(&config, &id("b"), Some(&id("a"))).unwrap();
        assert_eq!(expected, ids(&["b", "c", "d", "f", "g"]));
    }

    #[test]
    fn transfer_behind_is_normal() {
        let seq = line(&["a", "b", "c", "d", "e"]);
        let topo = Topology::linear();
        let planner = DestinationPlanner::new(&seq, &topo);
        let config = route(&["a", "b", "c", "d"], "a", "d", Direction::West)
            .with_transfers(&ids(&["b"]))
            .with_pickups(&ids(&["e"]));

        let termini = config.termini(&seq).unwrap();
        assert_eq!(
            planner.transfer_case(&config, &termini, Direction::West, 2),
            TransferCase::Normal
        );
        let expected = planner.expected(&config, &id("c"), Some(&id("b"))).unwrap();
        assert_eq!(expected, ids(&["c", "d"]));
    }

    #[test]
    fn junction_terminus_takes_precedence() {
        let (seq, topo) = branch_line();
        let planner = DestinationPlanner::new(&seq, &topo);
        // Route runs between the junction and e; the branch is off-route.
        let config = route(&["jct", "d", "e"], "jct", "e", Direction::East)
            .with_transfers(&ids(&["jct", "d"]))
            .with_pickups(&ids(&["a", "stub"]));

        let termini = config.termini(&seq).unwrap();
        assert_eq!(
            planner.transfer_case(&config, &termini, Direction::East, 6),
            TransferCase::JunctionTerminus { junction: id("jct") }
        );

        let expected = planner.expected(&config, &id("e"), Some(&id("d"))).unwrap();
        assert_eq!(expected, ids(&["jct", "d", "e", "a", "stub"]));
    }

    #[test]
    fn east_transfer_picks_nearest() {
        let seq = line(&["a", "b", "c", "d", "e"]);
        let topo = Topology::linear();
        let planner = DestinationPlanner::new(&seq, &topo);
        let config = route(&["b", "c", "d", "e"], "b", "e", Direction::East)
            .with_transfers(&ids(&["b", "c"]))
            .with_pickups(&ids(&["a"]));

        let termini = config.termini(&seq).unwrap();
        assert_eq!(
            planner.transfer_case(&config, &termini, Direction::East, 4),
            TransferCase::BeyondTransfer { transfer: id("c") }
        );
        let expected = planner.expected(&config, &id("e"), Some(&id("d"))).unwrap();
        assert_eq!(expected, ids(&["a", "b", "c", "d", "e"]));
    }
}
