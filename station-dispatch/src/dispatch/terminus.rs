//! Turnaround at the ends of the route.

use tracing::{debug, info};

use crate::domain::{Direction, StationId, StationSequence, TerminusSide, TrainId, TravelMode};
use crate::route::{RouteConfig, Termini};

use super::host::DispatchHost;

/// What happened when a train newly reached a terminus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminusOutcome {
    /// Direction unknown and nothing to infer it from.
    NeedsDirection,
    /// The train turns back into the route and must reverse.
    Turned { direction: Direction },
    /// The train came in from beyond the route and keeps its heading.
    FromOutside { direction: Direction },
    /// Already heading back into the route.
    Unchanged,
}

/// Decides the heading of a train at one of its termini.
pub struct TerminusHandler<'a> {
    stations: &'a StationSequence,
}

impl<'a> TerminusHandler<'a> {
    pub fn new(stations: &'a StationSequence) -> Self {
        Self { stations }
    }

    /// Handle a train newly at the `side` terminus, having come from
    /// `previous`. Updates the configured direction.
    pub fn arrive(
        &self,
        config: &mut RouteConfig,
        termini: &Termini,
        side: TerminusSide,
        previous: Option<&StationId>,
    ) -> TerminusOutcome {
        let departing = side.departing_direction();
        let current = config.direction();

        if !current.is_known() {
            let Some(previous) = previous else {
                return TerminusOutcome::NeedsDirection;
            };
            config.assign_direction(departing);
            let within = self
                .stations
                .order_index(previous)
                .is_some_and(|i| termini.spans(i));
            return if within {
                TerminusOutcome::Turned {
                    direction: departing,
                }
            } else {
                TerminusOutcome::FromOutside {
                    direction: departing,
                }
            };
        }

        if current != departing {
            config.assign_direction(departing);
            return TerminusOutcome::Turned {
                direction: departing,
            };
        }

        TerminusOutcome::Unchanged
    }
}

/// Reverse the locomotive unless the train turns on a loop.
///
/// Returns whether a reversal was commanded.
pub fn run_reversal<H: DispatchHost + ?Sized>(
    host: &mut H,
    train: &TrainId,
    mode: TravelMode,
) -> bool {
    match mode {
        TravelMode::Loop => {
            debug!(train = %train, "Loop mode, continuing forward");
            false
        }
        TravelMode::PointToPoint => {
            info!(train = %train, "Reversing locomotive");
            host.reverse_locomotive(train);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> StationId {
        StationId::parse(s).unwrap()
    }

    fn setup() -> (StationSequence, RouteConfig) {
        let seq = StationSequence::new(
            ["x", "a", "b", "c", "d", "e"]
                .iter()
                .map(|s| id(s))
                .collect(),
        )
        .unwrap();
        let config = RouteConfig::new()
            .with_stops(&[id("a"), id("c"), id("e")])
            .with_termini(&id("a"), &id("e"));
        (seq, config)
    }

    #[test]
    fn unknown_without_previous_needs_direction() {
        let (seq, mut config) = setup();
        let termini = config.termini(&seq).unwrap();
        let outcome =
            TerminusHandler::new(&seq).arrive(&mut config, &termini, TerminusSide::East, None);
        assert_eq!(outcome, TerminusOutcome::NeedsDirection);
        assert_eq!(config.direction(), Direction::Unknown);
    }

    #[test]
    fn unknown_from_within_turns() {
        let (seq, mut config) = setup();
        let termini = config.termini(&seq).unwrap();
        let outcome = TerminusHandler::new(&seq).arrive(
            &mut config,
            &termini,
            TerminusSide::West,
            Some(&id("c")),
        );
        assert_eq!(
            outcome,
            TerminusOutcome::Turned {
                direction: Direction::East
            }
        );
        assert_eq!(config.direction(), Direction::East);
    }

    #[test]
    fn unknown_from_outside_keeps_heading() {
        let (seq, mut config) = setup();
        let termini = config.termini(&seq).unwrap();
        let outcome = TerminusHandler::new(&seq).arrive(
            &mut config,
            &termini,
            TerminusSide::East,
            Some(&id("x")),
        );
        assert_eq!(
            outcome,
            TerminusOutcome::FromOutside {
                direction: Direction::West
            }
        );
        assert_eq!(config.direction(), Direction::West);
    }

    #[test]
    fn known_direction_flips_once() {
        let (seq, mut config) = setup();
        config.assign_direction(Direction::West);
        let termini = config.termini(&seq).unwrap();
        let handler = TerminusHandler::new(&seq);

        let first = handler.arrive(&mut config, &termini, TerminusSide::West, Some(&id("c")));
        assert_eq!(
            first,
            TerminusOutcome::Turned {
                direction: Direction::East
            }
        );

        let again = handler.arrive(&mut config, &termini, TerminusSide::West, Some(&id("c")));
        assert_eq!(again, TerminusOutcome::Unchanged);
    }
}
