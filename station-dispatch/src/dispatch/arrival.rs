//! The arrival controller.
//!
//! The host calls [`Dispatcher::handle_arrival`] repeatedly while a train
//! sits at a station. Each call either holds the train or marks it ready to
//! depart. Work done during a visit is remembered against the configuration
//! version counters, so repeated calls issue no repeated commands.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info, trace, warn};

use crate::domain::{Direction, StationId, TerminusSide, TrainId};
use crate::route::{ConfigError, RouteConfig, Termini, Topology};
use crate::train::{BranchPoint, DirectionWait, Movement, StopReason, TrainState};

use super::destinations::{DestinationPlanner, push_destinations};
use super::direction::{DirectionResolver, Inference};
use super::host::{DispatchHost, NoticeCode};
use super::pause;
use super::terminus::{TerminusHandler, TerminusOutcome, run_reversal};

/// Configuration and live state of one train.
#[derive(Debug, Clone, Default)]
pub struct TrainRecord {
    pub config: RouteConfig,
    pub state: TrainState,
}

/// Dispatches every train on one line.
#[derive(Debug, Default)]
pub struct Dispatcher {
    pub(super) topology: Topology,
    pub(super) trains: HashMap<TrainId, TrainRecord>,
}

impl Dispatcher {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            trains: HashMap::new(),
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Install a configuration loaded from storage, keeping any live state.
    pub fn insert_route(&mut self, train: TrainId, config: RouteConfig) {
        self.trains.entry(train).or_default().config = config;
    }

    pub fn route(&self, train: &TrainId) -> Option<&RouteConfig> {
        self.trains.get(train).map(|r| &r.config)
    }

    /// Mutable access to a train's configuration, creating an empty one on
    /// first use. Edits bump the version counters, which is what makes the
    /// next arrival call re-evaluate.
    pub fn route_mut(&mut self, train: &TrainId) -> &mut RouteConfig {
        &mut self.trains.entry(train.clone()).or_default().config
    }

    pub fn state(&self, train: &TrainId) -> Option<&TrainState> {
        self.trains.get(train).map(|r| &r.state)
    }

    pub fn trains(&self) -> impl Iterator<Item = (&TrainId, &TrainRecord)> {
        self.trains.iter()
    }

    /// Operator input: set the direction of travel.
    pub fn set_direction(&mut self, train: &TrainId, direction: Direction) {
        info!(train = %train, direction = %direction, "Direction set by operator");
        self.route_mut(train).set_direction(direction);
    }

    /// Operator input: release pauses and the full-load wait for the rest
    /// of this visit.
    pub fn request_continue(&mut self, train: &TrainId) {
        if let Some(record) = self.trains.get_mut(train) {
            info!(train = %train, "Continue requested");
            record.state.continue_requested = true;
        }
    }

    /// Host notification that a train left its station.
    pub fn on_departure(&mut self, train: &TrainId) {
        if let Some(record) = self.trains.get_mut(train) {
            debug!(
                train = %train,
                station = ?record.state.current_station(),
                "Departed"
            );
            record.state.depart();
        }
    }

    /// Forget all live train state. Configurations are kept.
    pub fn reset_session(&mut self) {
        info!(trains = self.trains.len(), "Resetting dispatch session");
        for record in self.trains.values_mut() {
            record.state = TrainState::new();
        }
    }

    /// Evaluate a train standing at `station`.
    ///
    /// Returns `true` when the train must stay, `false` when it may depart.
    pub fn handle_arrival<H: DispatchHost + ?Sized>(
        &mut self,
        host: &mut H,
        train: &TrainId,
        station: &StationId,
    ) -> bool {
        let record = self.trains.entry(train.clone()).or_default();
        Arrival {
            host,
            topology: &self.topology,
            train,
            config: &mut record.config,
            state: &mut record.state,
        }
        .run(station)
    }

    /// The destinations a train's cars should carry right now.
    pub fn expected_destinations<H: DispatchHost + ?Sized>(
        &self,
        host: &H,
        train: &TrainId,
    ) -> Option<BTreeSet<StationId>> {
        let record = self.trains.get(train)?;
        let current = record.state.current_station()?;
        DestinationPlanner::new(host.stations(), &self.topology).expected(
            &record.config,
            current,
            record.state.previous_station(),
        )
    }
}

/// One evaluation of one train at one station.
struct Arrival<'a, H: ?Sized> {
    host: &'a mut H,
    topology: &'a Topology,
    train: &'a TrainId,
    config: &'a mut RouteConfig,
    state: &'a mut TrainState,
}

impl<H: DispatchHost + ?Sized> Arrival<'_, H> {
    fn run(mut self, station: &StationId) -> bool {
        if self.config.disabled() {
            trace!(train = %self.train, "Dispatch disabled");
            return false;
        }

        if self.state.arrive_at(station) {
            debug!(
                train = %self.train,
                station = %station,
                previous = ?self.state.previous_station(),
                "Arrived"
            );
        }

        let termini = match self.config.resolve_termini(self.host.stations()) {
            Ok(termini) => termini,
            Err(err) => {
                self.report_configuration(err);
                return true;
            }
        };
        self.state.config_notice = None;

        if self.state.is_stopped()
            && pause::stay_stopped(&*self.host, self.train, self.config, self.state)
        {
            return true;
        }

        // A continue request skips the procedure, unless the procedure is
        // still waiting for a direction.
        let versions = self.config.versions();
        let procedure_due = self.state.station_version_seen != Some(versions.stations)
            && (!self.state.continue_requested || self.state.direction_wait.is_some());
        if procedure_due && self.station_procedure(station, &termini) {
            // An operator pause asked for here is shown in place of what the
            // procedure is waiting on.
            let outranked = self
                .state
                .stop_reason()
                .is_some_and(|r| r.awaits_direction() || *r == StopReason::WaitingForFullLoad);
            if outranked
                && !self.state.continue_requested
                && let Some(pause) = pause::explicit_pause(self.config, station)
            {
                self.hold(NoticeCode::Paused, pause);
            }
            return true;
        }

        if self.state.settings_version_seen != Some(versions.settings)
            && !self.state.continue_requested
        {
            let stopped = self.evaluate_pauses(station);
            self.state.settings_version_seen = Some(versions.settings);
            if stopped {
                return true;
            }
        }

        if self.state.is_stopped() {
            return true;
        }
        if self.state.movement != Movement::ReadyToDepart {
            debug!(train = %self.train, station = %station, "Ready to depart");
        }
        self.state.movement = Movement::ReadyToDepart;
        false
    }

    fn report_configuration(&mut self, err: ConfigError) {
        if self.state.config_notice.as_ref() != Some(&err) {
            warn!(train = %self.train, error = %err, "Route configuration invalid");
            let reason = StopReason::Configuration(err.clone());
            self.host
                .post_notice(self.train, NoticeCode::ConfigurationError, &reason.to_string());
            self.state.config_notice = Some(err.clone());
        }
        self.state.stop(StopReason::Configuration(err));
    }

    /// Run the station procedure. Returns `true` when it stopped the train.
    fn station_procedure(&mut self, station: &StationId, termini: &Termini) -> bool {
        match termini.side_of(station) {
            Some(side) => self.terminus_procedure(station, termini, side),
            None => self.through_procedure(station),
        }
    }

    fn through_procedure(&mut self, station: &StationId) -> bool {
        self.state.non_terminus_done = false;

        if !self.config.direction().is_known() {
            let inference = DirectionResolver::new(self.host.stations(), self.topology)
                .infer(self.state.previous_station(), station);
            match inference {
                Inference::Resolved(direction) => {
                    info!(
                        train = %self.train,
                        station = %station,
                        direction = %direction,
                        "Inferred direction of travel"
                    );
                    self.config.assign_direction(direction);
                }
                Inference::NoPrevious | Inference::OffRoute => {
                    return self.await_direction(station, StopReason::UnknownDirection);
                }
                Inference::Ambiguous { junction } => {
                    return self.await_direction(station, StopReason::AmbiguousBranch { junction });
                }
            }
        }

        self.update_destinations(station);
        self.visit_branch_point(station);

        self.config.lock_direction();
        self.state.direction_wait = None;
        self.state.terminus_latch = None;
        self.state.non_terminus_done = true;
        self.state.station_version_seen = Some(self.config.versions().stations);
        false
    }

    fn terminus_procedure(
        &mut self,
        station: &StationId,
        termini: &Termini,
        side: TerminusSide,
    ) -> bool {
        self.state.non_terminus_done = false;

        if self.state.terminus_latch != Some(side) {
            let outcome = TerminusHandler::new(self.host.stations()).arrive(
                self.config,
                termini,
                side,
                self.state.previous_station(),
            );
            match outcome {
                TerminusOutcome::NeedsDirection => {
                    return self.await_direction(station, StopReason::UnknownDirection);
                }
                TerminusOutcome::Turned { direction } => {
                    info!(
                        train = %self.train,
                        station = %station,
                        direction = %direction,
                        "Turning at terminus"
                    );
                    run_reversal(&mut *self.host, self.train, self.config.travel_mode());
                }
                TerminusOutcome::FromOutside { direction } => {
                    info!(
                        train = %self.train,
                        station = %station,
                        direction = %direction,
                        "Entered route at terminus"
                    );
                }
                TerminusOutcome::Unchanged => {}
            }
            self.state.terminus_latch = Some(side);
            self.state.direction_wait = None;
        }
        self.state.branch_latch = None;

        self.update_destinations(station);

        if self.config.wait_for_full_load_at_terminus()
            && !self.state.continue_requested
            && pause::any_car_under_full(&*self.host, self.train)
        {
            self.hold(NoticeCode::WaitingForLoad, StopReason::WaitingForFullLoad);
            return true;
        }

        self.config.lock_direction();
        self.state.station_version_seen = Some(self.config.versions().stations);
        false
    }

    fn update_destinations(&mut self, station: &StationId) {
        let expected = DestinationPlanner::new(self.host.stations(), self.topology).expected(
            self.config,
            station,
            self.state.previous_station(),
        );
        if let Some(expected) = expected {
            let updated = push_destinations(&mut *self.host, self.train, &expected);
            if updated > 0 {
                debug!(
                    train = %self.train,
                    station = %station,
                    cars = updated,
                    destinations = expected.len(),
                    "Updated car destinations"
                );
            }
        }
    }

    /// Latch a junction or pivot; reverse on first reaching a pivot.
    fn visit_branch_point(&mut self, station: &StationId) {
        let point = if self.topology.pivot_at(station).is_some() {
            Some(BranchPoint::Pivot)
        } else if self.topology.junction_at(station).is_some() {
            Some(BranchPoint::Junction)
        } else {
            None
        };
        let first_visit = point.is_some() && self.state.branch_latch != point;
        self.state.branch_latch = point;

        if first_visit && point == Some(BranchPoint::Pivot) {
            info!(train = %self.train, station = %station, "Reversing at branch pivot");
            run_reversal(&mut *self.host, self.train, self.config.travel_mode());
        }
    }

    fn await_direction(&mut self, station: &StationId, reason: StopReason) -> bool {
        let notified = self
            .state
            .direction_wait
            .as_ref()
            .is_some_and(|wait| &wait.station == station);
        if !notified {
            warn!(
                train = %self.train,
                station = %station,
                reason = %reason,
                "Waiting for direction"
            );
            let text = format!("{reason} at {station}. Set the direction of travel to continue.");
            self.host
                .post_notice(self.train, NoticeCode::DirectionRequired, &text);
        }
        self.state.direction_wait = Some(DirectionWait {
            station: station.clone(),
            reason: reason.clone(),
        });
        self.state.stop(reason);
        true
    }

    /// Step through the operator pauses, then the resource gates.
    fn evaluate_pauses(&mut self, station: &StationId) -> bool {
        self.state.clear_stop();
        self.state.resource_latches.clear_all();

        if let Some(reason) = pause::explicit_pause(self.config, station) {
            self.hold(NoticeCode::Paused, reason);
            return true;
        }

        if let Some(resource) = pause::check_resources(
            &*self.host,
            self.train,
            self.config,
            &mut self.state.resource_latches,
        ) {
            self.hold(NoticeCode::LowResource, StopReason::LowResource(resource));
            return true;
        }
        false
    }

    fn hold(&mut self, code: NoticeCode, reason: StopReason) {
        if self.state.stop_reason() != Some(&reason) {
            info!(train = %self.train, reason = %reason, "Holding train");
            self.host
                .post_notice(self.train, code, &reason.to_string());
        }
        self.state.stop(reason);
    }
}
