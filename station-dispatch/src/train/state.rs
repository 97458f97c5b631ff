//! Per-train dispatch state.
//!
//! A train is either running or stopped for exactly one active
//! [`StopReason`]. Resource shortages are the exception that may coexist, so
//! they are tracked as a separate latch set and re-validated independently.

use std::collections::BTreeSet;
use std::fmt;

use crate::domain::{Resource, StationId, TerminusSide};
use crate::route::ConfigError;

/// Why a train is being held at a station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The route configuration cannot drive a station procedure.
    Configuration(ConfigError),
    /// No usable previous station; the operator must set a direction.
    UnknownDirection,
    /// The last move was across a branch junction, which does not reveal
    /// the heading.
    AmbiguousBranch { junction: StationId },
    PauseAtNextStation,
    StationPause,
    PauseAtTerminus,
    LowResource(Resource),
    WaitingForFullLoad,
}

impl StopReason {
    /// Pauses requested explicitly by the operator. These are released by a
    /// continue request.
    pub fn is_operator_pause(&self) -> bool {
        matches!(
            self,
            StopReason::PauseAtNextStation | StopReason::StationPause | StopReason::PauseAtTerminus
        )
    }

    /// Stops that wait for the operator to supply a direction.
    pub fn awaits_direction(&self) -> bool {
        matches!(
            self,
            StopReason::UnknownDirection | StopReason::AmbiguousBranch { .. }
        )
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Configuration(e) => write!(f, "Configuration error: {e}"),
            StopReason::UnknownDirection => f.write_str("Unknown Direction of Travel"),
            StopReason::AmbiguousBranch { junction } => {
                write!(f, "Unknown Direction of Travel at {junction} junction")
            }
            StopReason::PauseAtNextStation => f.write_str("Requested pause at next station"),
            StopReason::StationPause => f.write_str("Requested pause at this station"),
            StopReason::PauseAtTerminus => f.write_str("Requested pause at terminus"),
            StopReason::LowResource(r) => write!(f, "Low {r}"),
            StopReason::WaitingForFullLoad => f.write_str("Waiting for full load"),
        }
    }
}

/// Where a train is in its station visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Movement {
    #[default]
    Unobserved,
    Arrived,
    ReadyToDepart,
    Departed,
}

/// Branch points whose one-off actions have already been taken this visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchPoint {
    Junction,
    Pivot,
}

/// A station procedure halted for want of a direction.
///
/// Kept apart from the active stop reason so that an operator pause shown in
/// its place does not release it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionWait {
    pub station: StationId,
    pub reason: StopReason,
}

/// Progress of one transfer operation during a station visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferProgress {
    #[default]
    Idle,
    Running,
    Complete,
}

/// Transfer flags for the current station visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferFlags {
    pub unload: TransferProgress,
    pub load: TransferProgress,
}

/// Resources a train is currently latched as short of.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceLatches(BTreeSet<Resource>);

impl ResourceLatches {
    pub fn set(&mut self, resource: Resource) {
        self.0.insert(resource);
    }

    pub fn clear(&mut self, resource: Resource) {
        self.0.remove(&resource);
    }

    pub fn clear_all(&mut self) {
        self.0.clear();
    }

    pub fn contains(&self, resource: Resource) -> bool {
        self.0.contains(&resource)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The first latched resource in check order.
    pub fn first(&self) -> Option<Resource> {
        Resource::ALL.into_iter().find(|r| self.0.contains(r))
    }

    pub fn iter(&self) -> impl Iterator<Item = Resource> + '_ {
        self.0.iter().copied()
    }
}

/// Mutable dispatch state for one train.
#[derive(Debug, Clone, Default)]
pub struct TrainState {
    pub(crate) current_station: Option<StationId>,
    pub(crate) previous_station: Option<StationId>,
    pub(crate) movement: Movement,
    stop: Option<StopReason>,
    pub(crate) resource_latches: ResourceLatches,
    pub(crate) continue_requested: bool,
    pub(crate) terminus_latch: Option<TerminusSide>,
    pub(crate) branch_latch: Option<BranchPoint>,
    pub(crate) non_terminus_done: bool,
    pub(crate) station_version_seen: Option<u64>,
    pub(crate) settings_version_seen: Option<u64>,
    pub(crate) direction_wait: Option<DirectionWait>,
    pub(crate) config_notice: Option<ConfigError>,
    pub(crate) transfers: TransferFlags,
}

impl TrainState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_station(&self) -> Option<&StationId> {
        self.current_station.as_ref()
    }

    pub fn previous_station(&self) -> Option<&StationId> {
        self.previous_station.as_ref()
    }

    pub fn movement(&self) -> Movement {
        self.movement
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_some()
    }

    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop.as_ref()
    }

    pub fn resource_latches(&self) -> &ResourceLatches {
        &self.resource_latches
    }

    pub fn continue_requested(&self) -> bool {
        self.continue_requested
    }

    pub fn terminus_latch(&self) -> Option<TerminusSide> {
        self.terminus_latch
    }

    pub fn branch_latch(&self) -> Option<BranchPoint> {
        self.branch_latch
    }

    pub fn non_terminus_done(&self) -> bool {
        self.non_terminus_done
    }

    pub fn transfers(&self) -> TransferFlags {
        self.transfers
    }

    /// Record an arrival. Returns `true` when `station` differs from the
    /// station the train was last seen at.
    ///
    /// A new arrival shifts the previous station, clears the stop reason and
    /// resource latches, forgets the evaluated versions so everything is
    /// re-evaluated here, resets the per-visit transfer flags and drops a
    /// continue request that has now been honored.
    pub(crate) fn arrive_at(&mut self, station: &StationId) -> bool {
        if self.current_station.as_ref() == Some(station) {
            return false;
        }
        if let Some(old) = self.current_station.take() {
            self.previous_station = Some(old);
        }
        self.current_station = Some(station.clone());
        self.movement = Movement::Arrived;
        self.stop = None;
        self.resource_latches.clear_all();
        self.station_version_seen = None;
        self.settings_version_seen = None;
        self.non_terminus_done = false;
        self.transfers = TransferFlags::default();
        self.continue_requested = false;
        self.direction_wait = None;
        true
    }

    pub(crate) fn stop(&mut self, reason: StopReason) {
        self.stop = Some(reason);
    }

    /// Release the train. The reason goes with the flag.
    pub(crate) fn clear_stop(&mut self) {
        self.stop = None;
    }

    /// Host notification that the train has left its station.
    pub(crate) fn depart(&mut self) {
        self.movement = Movement::Departed;
        if let Some(current) = &self.current_station {
            self.previous_station = Some(current.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> StationId {
        StationId::parse(s).unwrap()
    }

    #[test]
    fn reason_text() {
        assert_eq!(
            StopReason::UnknownDirection.to_string(),
            "Unknown Direction of Travel"
        );
        assert_eq!(
            StopReason::PauseAtNextStation.to_string(),
            "Requested pause at next station"
        );
        assert_eq!(StopReason::LowResource(Resource::Diesel).to_string(), "Low diesel");
        assert_eq!(
            StopReason::Configuration(ConfigError::TerminusCount { found: 1 }).to_string(),
            "Configuration error: exactly 2 terminus stations must be selected, found 1"
        );
        assert_eq!(
            StopReason::AmbiguousBranch {
                junction: id("alarkajct")
            }
            .to_string(),
            "Unknown Direction of Travel at alarkajct junction"
        );
    }

    #[test]
    fn reason_classes() {
        assert!(StopReason::StationPause.is_operator_pause());
        assert!(!StopReason::WaitingForFullLoad.is_operator_pause());
        assert!(StopReason::UnknownDirection.awaits_direction());
    }

    #[test]
    fn clearing_stop_clears_reason() {
        let mut state = TrainState::new();
        state.stop(StopReason::WaitingForFullLoad);
        assert!(state.is_stopped());
        state.clear_stop();
        assert!(!state.is_stopped());
        assert_eq!(state.stop_reason(), None);
    }

    #[test]
    fn arrival_shifts_previous_and_resets_visit() {
        let mut state = TrainState::new();
        assert!(state.arrive_at(&id("a")));
        assert_eq!(state.previous_station(), None);

        state.stop(StopReason::StationPause);
        state.resource_latches.set(Resource::Water);
        state.station_version_seen = Some(3);
        state.continue_requested = true;
        state.transfers.unload = TransferProgress::Complete;

        assert!(!state.arrive_at(&id("a")));
        assert!(state.is_stopped());

        assert!(state.arrive_at(&id("b")));
        assert_eq!(state.previous_station(), Some(&id("a")));
        assert_eq!(state.current_station(), Some(&id("b")));
        assert_eq!(state.movement(), Movement::Arrived);
        assert!(!state.is_stopped());
        assert!(state.resource_latches().is_empty());
        assert_eq!(state.station_version_seen, None);
        assert!(!state.continue_requested());
        assert_eq!(state.transfers(), TransferFlags::default());
    }

    #[test]
    fn departure_caches_previous_station() {
        let mut state = TrainState::new();
        state.arrive_at(&id("a"));
        state.depart();
        assert_eq!(state.movement(), Movement::Departed);
        assert_eq!(state.previous_station(), Some(&id("a")));
    }

    #[test]
    fn first_latched_resource_follows_check_order() {
        let mut latches = ResourceLatches::default();
        latches.set(Resource::Water);
        latches.set(Resource::Coal);
        assert_eq!(latches.first(), Some(Resource::Coal));
        latches.clear(Resource::Coal);
        assert_eq!(latches.first(), Some(Resource::Water));
    }
}
