//! Per-train route configuration.
//!
//! A `RouteConfig` is edited by the operator and read by the engine on every
//! arrival. Every edit goes through a setter so the section version counters
//! stay accurate: the engine compares them against the versions it last
//! evaluated to decide what must be recomputed.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::{
    Direction, DomainError, Resource, StationId, StationSequence, TerminusSide, TravelMode,
};

/// Minimum number of stations a route must stop at.
pub const MIN_STOPS: usize = 2;

/// Number of terminus stations a route must have.
pub const TERMINUS_COUNT: usize = 2;

/// Configuration problems that prevent the station procedure from running.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("at least 2 stations must be selected to stop at, found {found}")]
    InsufficientStops { found: usize },

    #[error("exactly 2 terminus stations must be selected, found {found}")]
    TerminusCount { found: usize },

    #[error("terminus station {station} is not on the line")]
    TerminusOffLine { station: StationId },
}

/// Explicit per-station operator request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationAction {
    #[default]
    Normal,
    Pause,
}

/// A pause gate for one consumable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuelGate {
    pub enabled: bool,
    /// Fraction of a full tender or tank, 0..=1.
    pub threshold: f32,
}

impl FuelGate {
    /// An enabled gate at the given threshold.
    pub fn enabled(threshold: f32) -> Result<Self, DomainError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(DomainError::FractionOutOfRange(threshold));
        }
        Ok(Self {
            enabled: true,
            threshold,
        })
    }

    /// Whether this gate asks the train to stop at the given level.
    pub fn trips_at(&self, level: f32) -> bool {
        self.enabled && level < self.threshold
    }
}

impl Default for FuelGate {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 0.1,
        }
    }
}

/// Gates for all three consumables.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FuelGates {
    pub diesel: FuelGate,
    pub coal: FuelGate,
    pub water: FuelGate,
}

impl FuelGates {
    pub fn get(&self, resource: Resource) -> FuelGate {
        match resource {
            Resource::Diesel => self.diesel,
            Resource::Coal => self.coal,
            Resource::Water => self.water,
        }
    }

    fn get_mut(&mut self, resource: Resource) -> &mut FuelGate {
        match resource {
            Resource::Diesel => &mut self.diesel,
            Resource::Coal => &mut self.coal,
            Resource::Water => &mut self.water,
        }
    }
}

/// Version counters for the two configuration sections.
///
/// `stations` covers the stop, terminus, pickup, transfer and action fields.
/// `settings` covers everything, so a station edit bumps both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigVersions {
    pub stations: u64,
    pub settings: u64,
}

/// The two terminus stations of a route, ordered by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Termini {
    pub east: StationId,
    pub west: StationId,
    pub east_index: usize,
    pub west_index: usize,
}

impl Termini {
    /// Which side a station is, if it is one of the termini.
    pub fn side_of(&self, station: &StationId) -> Option<TerminusSide> {
        if station == &self.east {
            Some(TerminusSide::East)
        } else if station == &self.west {
            Some(TerminusSide::West)
        } else {
            None
        }
    }

    /// Whether an order index lies between the termini, inclusive.
    pub fn spans(&self, order_index: usize) -> bool {
        (self.east_index..=self.west_index).contains(&order_index)
    }

    /// The terminus a train heading in `direction` will reach next.
    pub fn ahead(&self, direction: Direction) -> Option<(&StationId, usize)> {
        match direction {
            Direction::East => Some((&self.east, self.east_index)),
            Direction::West => Some((&self.west, self.west_index)),
            Direction::Unknown => None,
        }
    }
}

/// Route configuration for one train.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    stop_at: BTreeSet<StationId>,
    terminus: BTreeSet<StationId>,
    pickup_for: BTreeSet<StationId>,
    transfer: BTreeSet<StationId>,
    actions: BTreeMap<StationId, StationAction>,
    direction: Direction,
    direction_locked: bool,
    travel_mode: TravelMode,
    fuel: FuelGates,
    pause_at_next_station: bool,
    pause_at_terminus: bool,
    wait_for_full_load_at_terminus: bool,
    disabled: bool,
    #[serde(skip)]
    versions: ConfigVersions,
}

impl RouteConfig {
    /// An empty, enabled configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the configuration can drive a station procedure on this line.
    pub fn validate(&self, stations: &StationSequence) -> Result<(), ConfigError> {
        self.resolve_termini(stations).map(|_| ())
    }

    /// Validate and resolve the two termini in one step.
    pub fn resolve_termini(&self, stations: &StationSequence) -> Result<Termini, ConfigError> {
        if self.stop_at.len() < MIN_STOPS {
            return Err(ConfigError::InsufficientStops {
                found: self.stop_at.len(),
            });
        }
        if self.terminus.len() != TERMINUS_COUNT {
            return Err(ConfigError::TerminusCount {
                found: self.terminus.len(),
            });
        }
        if let Some(station) = self.terminus.iter().find(|s| !stations.contains(s)) {
            return Err(ConfigError::TerminusOffLine {
                station: station.clone(),
            });
        }
        self.termini(stations).ok_or(ConfigError::TerminusCount {
            found: self.terminus.len(),
        })
    }

    /// Check every referenced station exists in the route sequence.
    pub fn check_against(&self, stations: &StationSequence) -> Result<(), DomainError> {
        self.stop_at
            .iter()
            .chain(&self.terminus)
            .chain(&self.pickup_for)
            .chain(&self.transfer)
            .chain(self.actions.keys())
            .find(|s| !stations.contains(s))
            .map_or(Ok(()), |s| Err(DomainError::UnknownStation(s.clone())))
    }

    /// Resolve the two termini against the route sequence.
    ///
    /// Returns `None` unless exactly two known termini are configured.
    pub fn termini(&self, stations: &StationSequence) -> Option<Termini> {
        let ordered = stations.ordered(&self.terminus);
        match ordered.as_slice() {
            [east, west] if self.terminus.len() == TERMINUS_COUNT => Some(Termini {
                east_index: stations.order_index(east)?,
                west_index: stations.order_index(west)?,
                east: east.clone(),
                west: west.clone(),
            }),
            _ => None,
        }
    }

    // Read access

    pub fn stop_at(&self) -> &BTreeSet<StationId> {
        &self.stop_at
    }

    pub fn terminus(&self) -> &BTreeSet<StationId> {
        &self.terminus
    }

    pub fn pickup_for(&self) -> &BTreeSet<StationId> {
        &self.pickup_for
    }

    pub fn transfer(&self) -> &BTreeSet<StationId> {
        &self.transfer
    }

    pub fn action(&self, station: &StationId) -> StationAction {
        self.actions.get(station).copied().unwrap_or_default()
    }

    pub fn is_terminus(&self, station: &StationId) -> bool {
        self.terminus.contains(station)
    }

    pub fn is_transfer(&self, station: &StationId) -> bool {
        self.transfer.contains(station)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn direction_locked(&self) -> bool {
        self.direction_locked
    }

    pub fn travel_mode(&self) -> TravelMode {
        self.travel_mode
    }

    pub fn fuel_gate(&self, resource: Resource) -> FuelGate {
        self.fuel.get(resource)
    }

    pub fn pause_at_next_station(&self) -> bool {
        self.pause_at_next_station
    }

    pub fn pause_at_terminus(&self) -> bool {
        self.pause_at_terminus
    }

    pub fn wait_for_full_load_at_terminus(&self) -> bool {
        self.wait_for_full_load_at_terminus
    }

    pub fn disabled(&self) -> bool {
        self.disabled
    }

    pub fn versions(&self) -> ConfigVersions {
        self.versions
    }

    // Operator edits

    pub fn set_stop(&mut self, station: StationId, stop: bool) {
        toggle(&mut self.stop_at, station, stop);
        self.direction_locked = false;
        self.bump_stations();
    }

    pub fn set_terminus(&mut self, station: StationId, terminus: bool) {
        toggle(&mut self.terminus, station, terminus);
        self.direction_locked = false;
        self.bump_stations();
    }

    pub fn set_pickup(&mut self, station: StationId, pickup: bool) {
        toggle(&mut self.pickup_for, station, pickup);
        self.bump_stations();
    }

    pub fn set_transfer(&mut self, station: StationId, transfer: bool) {
        toggle(&mut self.transfer, station, transfer);
        self.bump_stations();
    }

    pub fn set_action(&mut self, station: StationId, action: StationAction) {
        match action {
            StationAction::Normal => self.actions.remove(&station),
            StationAction::Pause => self.actions.insert(station, action),
        };
        self.bump_stations();
    }

    /// Manual direction input from the operator.
    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
        self.bump_settings();
    }

    pub fn set_travel_mode(&mut self, mode: TravelMode) {
        self.travel_mode = mode;
        self.bump_settings();
    }

    pub fn set_fuel_gate(&mut self, resource: Resource, gate: FuelGate) {
        *self.fuel.get_mut(resource) = gate;
        self.bump_settings();
    }

    pub fn set_pause_at_next_station(&mut self, pause: bool) {
        self.pause_at_next_station = pause;
        self.bump_settings();
    }

    pub fn set_pause_at_terminus(&mut self, pause: bool) {
        self.pause_at_terminus = pause;
        self.bump_settings();
    }

    pub fn set_wait_for_full_load_at_terminus(&mut self, wait: bool) {
        self.wait_for_full_load_at_terminus = wait;
        self.bump_settings();
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
        self.bump_settings();
    }

    // Builder-style helpers for constructing routes in code

    pub fn with_stops<'a>(mut self, stations: impl IntoIterator<Item = &'a StationId>) -> Self {
        for s in stations {
            self.set_stop(s.clone(), true);
        }
        self
    }

    pub fn with_termini(mut self, a: &StationId, b: &StationId) -> Self {
        self.set_terminus(a.clone(), true);
        self.set_terminus(b.clone(), true);
        self
    }

    pub fn with_pickups<'a>(mut self, stations: impl IntoIterator<Item = &'a StationId>) -> Self {
        for s in stations {
            self.set_pickup(s.clone(), true);
        }
        self
    }

    pub fn with_transfers<'a>(
        mut self,
        stations: impl IntoIterator<Item = &'a StationId>,
    ) -> Self {
        for s in stations {
            self.set_transfer(s.clone(), true);
        }
        self
    }

    pub fn with_travel_mode(mut self, mode: TravelMode) -> Self {
        self.set_travel_mode(mode);
        self
    }

    // Engine updates. These never bump versions: they record what the
    // engine derived, not what the operator asked for.

    pub(crate) fn assign_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    pub(crate) fn lock_direction(&mut self) {
        if self.direction.is_known() {
            self.direction_locked = true;
        }
    }

    fn bump_stations(&mut self) {
        self.versions.stations += 1;
        self.bump_settings();
    }

    fn bump_settings(&mut self) {
        self.versions.settings += 1;
    }
}

fn toggle(set: &mut BTreeSet<StationId>, station: StationId, on: bool) {
    if on {
        set.insert(station);
    } else {
        set.remove(&station);
    }
}
