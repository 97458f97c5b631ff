//! An in-memory host for replays and integration tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::dispatch::{DispatchHost, NoticeCode};
use crate::domain::{CarId, PassengerLoad, Resource, StationId, StationSequence, TrainId};
use crate::transfer::{
    InMemoryManifests, ManifestStore, SharedYard, TransferPools, TransferYard, lock_yard,
};

/// A command the engine issued to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Destinations {
        car: CarId,
        destinations: BTreeSet<StationId>,
    },
    Reversed(TrainId),
    Notice {
        train: TrainId,
        code: NoticeCode,
        text: String,
    },
    Broadcast(String),
}

/// Simulated trains, cars and station pools.
///
/// Passenger counts come from the shared transfer yard, so transfers that
/// run in the background are reflected in load checks.
#[derive(Debug)]
pub struct SimHost {
    stations: StationSequence,
    levels: HashMap<(TrainId, Resource), f32>,
    consists: HashMap<TrainId, Vec<CarId>>,
    destinations: HashMap<CarId, BTreeSet<StationId>>,
    yard: SharedYard<InMemoryManifests>,
    events: Vec<HostEvent>,
}

impl SimHost {
    pub fn new(stations: StationSequence, pools: TransferPools) -> Self {
        Self {
            stations,
            levels: HashMap::new(),
            consists: HashMap::new(),
            destinations: HashMap::new(),
            yard: Arc::new(Mutex::new(TransferYard::new(pools, InMemoryManifests::new()))),
            events: Vec::new(),
        }
    }

    pub fn yard(&self) -> &SharedYard<InMemoryManifests> {
        &self.yard
    }

    /// Couple a car to the end of a train.
    pub fn couple(&mut self, train: &TrainId, car: CarId, capacity: u32) {
        lock_yard(&self.yard)
            .manifests
            .couple(train, car.clone(), capacity);
        self.consists.entry(train.clone()).or_default().push(car);
    }

    pub fn decouple(&mut self, car: &CarId) {
        lock_yard(&self.yard).manifests.decouple(car);
        for cars in self.consists.values_mut() {
            cars.retain(|c| c != car);
        }
    }

    pub fn set_level(&mut self, train: &TrainId, resource: Resource, level: f32) {
        self.levels
            .insert((train.clone(), resource), level.clamp(0.0, 1.0));
    }

    /// Board `count` passengers from `origin` bound for `destination`.
    pub fn board(
        &mut self,
        car: &CarId,
        origin: &StationId,
        destination: &StationId,
        count: u32,
    ) {
        let now = chrono::Utc::now();
        let mut yard = lock_yard(&self.yard);
        for _ in 0..count {
            yard.manifests.add_unit(car, origin, destination, now);
        }
    }

    /// Board passengers for the car's first destination until it is full.
    pub fn fill(&mut self, car: &CarId, origin: &StationId) {
        let Some(destination) = self.car_destinations(car).into_iter().next() else {
            return;
        };
        let load = self.passenger_load(car);
        let free = load.capacity.saturating_sub(load.count);
        self.board(car, origin, &destination, free);
    }

    pub fn events(&self) -> &[HostEvent] {
        &self.events
    }
}

impl DispatchHost for SimHost {
    fn stations(&self) -> &StationSequence {
        &self.stations
    }

    fn resource_level(&self, train: &TrainId, resource: Resource) -> f32 {
        self.levels
            .get(&(train.clone(), resource))
            .copied()
            .unwrap_or(1.0)
    }

    fn passenger_cars(&self, train: &TrainId) -> Vec<CarId> {
        self.consists.get(train).cloned().unwrap_or_default()
    }

    fn car_destinations(&self, car: &CarId) -> BTreeSet<StationId> {
        self.destinations.get(car).cloned().unwrap_or_default()
    }

    fn set_car_destinations(&mut self, car: &CarId, destinations: BTreeSet<StationId>) {
        self.destinations.insert(car.clone(), destinations.clone());
        self.events.push(HostEvent::Destinations {
            car: car.clone(),
            destinations,
        });
    }

    fn passenger_load(&self, car: &CarId) -> PassengerLoad {
        lock_yard(&self.yard).manifests.load(car)
    }

    fn reverse_locomotive(&mut self, train: &TrainId) {
        self.events.push(HostEvent::Reversed(train.clone()));
    }

    fn post_notice(&mut self, train: &TrainId, code: NoticeCode, text: &str) {
        info!(train = %train, code = %code, "{text}");
        self.events.push(HostEvent::Notice {
            train: train.clone(),
            code,
            text: text.to_string(),
        });
    }

    fn broadcast(&mut self, text: &str) {
        info!("{text}");
        self.events.push(HostEvent::Broadcast(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> StationId {
        StationId::parse(s).unwrap()
    }

    fn host() -> SimHost {
        let stations = StationSequence::new(vec![id("a"), id("b")]).unwrap();
        SimHost::new(stations, TransferPools::new())
    }

    #[test]
    fn load_reflects_yard_manifests() {
        let mut host = host();
        let train = TrainId::new("t1");
        let car = CarId::new("c1");
        host.couple(&train, car.clone(), 5);
        host.board(&car, &id("a"), &id("b"), 3);

        assert_eq!(host.passenger_cars(&train), vec![car.clone()]);
        assert_eq!(host.passenger_load(&car), PassengerLoad::new(3, 5));

        host.decouple(&car);
        assert!(host.passenger_cars(&train).is_empty());
    }

    #[test]
    fn fill_tops_up_to_capacity() {
        let mut host = host();
        let train = TrainId::new("t1");
        let car = CarId::new("c1");
        host.couple(&train, car.clone(), 4);
        host.set_car_destinations(&car, [id("b")].into_iter().collect());
        host.board(&car, &id("a"), &id("b"), 1);

        host.fill(&car, &id("a"));
        assert!(host.passenger_load(&car).is_full());
        assert_eq!(host.passenger_load(&car).count, 4);
    }

    #[test]
    fn commands_are_recorded() {
        let mut host = host();
        let train = TrainId::new("t1");
        host.reverse_locomotive(&train);
        host.post_notice(&train, NoticeCode::Paused, "Requested pause at this station");

        assert_eq!(host.events().len(), 2);
        assert_eq!(host.events()[0], HostEvent::Reversed(train));
    }

    #[test]
    fn missing_levels_read_full() {
        let mut host = host();
        let train = TrainId::new("t1");
        assert_eq!(host.resource_level(&train, Resource::Water), 1.0);
        host.set_level(&train, Resource::Water, 1.5);
        assert_eq!(host.resource_level(&train, Resource::Water), 1.0);
    }
}
