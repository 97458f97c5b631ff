//! Pause requests, resource gates and the stay-stopped predicate.

use tracing::debug;

use crate::domain::{Resource, StationId, TrainId};
use crate::route::{RouteConfig, StationAction};
use crate::train::{ResourceLatches, StopReason, TrainState};

use super::host::DispatchHost;

/// The operator pause that applies at `station`, first match wins.
pub fn explicit_pause(config: &RouteConfig, station: &StationId) -> Option<StopReason> {
    if config.pause_at_next_station() {
        Some(StopReason::PauseAtNextStation)
    } else if config.action(station) == StationAction::Pause {
        Some(StopReason::StationPause)
    } else if config.pause_at_terminus() && config.is_terminus(station) {
        Some(StopReason::PauseAtTerminus)
    } else {
        None
    }
}

/// Latch every enabled resource gate whose level is below threshold.
///
/// All gates are evaluated. Returns the first resource latched, in check
/// order.
pub fn check_resources<H: DispatchHost + ?Sized>(
    host: &H,
    train: &TrainId,
    config: &RouteConfig,
    latches: &mut ResourceLatches,
) -> Option<Resource> {
    let mut first = None;
    for resource in Resource::ALL {
        let gate = config.fuel_gate(resource);
        if !gate.enabled {
            continue;
        }
        let level = host.resource_level(train, resource);
        if gate.trips_at(level) {
            debug!(
                train = %train,
                resource = %resource,
                level,
                threshold = gate.threshold,
                "Resource below threshold"
            );
            latches.set(resource);
            first.get_or_insert(resource);
        }
    }
    first
}

/// Drop latches whose gate was disabled or whose level has recovered.
pub fn revalidate_resources<H: DispatchHost + ?Sized>(
    host: &H,
    train: &TrainId,
    config: &RouteConfig,
    latches: &mut ResourceLatches,
) {
    let latched: Vec<Resource> = latches.iter().collect();
    for resource in latched {
        let gate = config.fuel_gate(resource);
        if !gate.trips_at(host.resource_level(train, resource)) {
            debug!(train = %train, resource = %resource, "Resource latch cleared");
            latches.clear(resource);
        }
    }
}

/// Whether any coupled passenger car has an empty seat.
pub fn any_car_under_full<H: DispatchHost + ?Sized>(host: &H, train: &TrainId) -> bool {
    host.passenger_cars(train)
        .iter()
        .any(|car| !host.passenger_load(car).is_full())
}

/// Re-check why a stopped train is stopped.
///
/// Returns `true` while some condition still holds. When the active reason
/// lapses, a direction wait at this station takes its place, then the first
/// remaining resource latch. When nothing remains, the stop is cleared.
pub fn stay_stopped<H: DispatchHost + ?Sized>(
    host: &H,
    train: &TrainId,
    config: &RouteConfig,
    state: &mut TrainState,
) -> bool {
    revalidate_resources(host, train, config, &mut state.resource_latches);

    let holds = state
        .stop_reason()
        .cloned()
        .is_some_and(|reason| reason_holds(host, train, config, state, &reason));
    if holds {
        return true;
    }

    if let Some(wait) = &state.direction_wait
        && state.current_station() == Some(&wait.station)
        && !config.direction().is_known()
    {
        let reason = wait.reason.clone();
        debug!(train = %train, reason = %reason, "Still waiting for direction");
        state.stop(reason);
        return true;
    }

    match state.resource_latches.first() {
        Some(resource) => {
            state.stop(StopReason::LowResource(resource));
            true
        }
        None => {
            if let Some(reason) = state.stop_reason() {
                debug!(train = %train, reason = %reason, "Stop condition cleared");
            }
            state.clear_stop();
            false
        }
    }
}

fn reason_holds<H: DispatchHost + ?Sized>(
    host: &H,
    train: &TrainId,
    config: &RouteConfig,
    state: &TrainState,
    reason: &StopReason,
) -> bool {
    let released = state.continue_requested;
    if released && reason.is_operator_pause() {
        return false;
    }
    let station = state.current_station();
    match reason {
        StopReason::Configuration(_) => config.validate(host.stations()).is_err(),
        StopReason::UnknownDirection | StopReason::AmbiguousBranch { .. } => {
            !config.direction().is_known()
        }
        StopReason::PauseAtNextStation => config.pause_at_next_station(),
        StopReason::StationPause => {
            station.is_some_and(|s| config.action(s) == StationAction::Pause)
        }
        StopReason::PauseAtTerminus => {
            config.pause_at_terminus() && station.is_some_and(|s| config.is_terminus(s))
        }
        StopReason::LowResource(resource) => state.resource_latches.contains(*resource),
        StopReason::WaitingForFullLoad => {
            !released
                && config.wait_for_full_load_at_terminus()
                && any_car_under_full(host, train)
        }
    }
}
