//! Passenger manifests of individual cars.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::domain::{CarId, PassengerLoad, StationId, TrainId};

use super::pool::PassengerGroup;

/// Read and update the passengers aboard cars.
///
/// Implemented by the host's car storage. The transfer tasks only ever move
/// one passenger at a time through this interface.
pub trait ManifestStore {
    /// Whether `car` is still coupled to `train`.
    fn is_coupled(&self, train: &TrainId, car: &CarId) -> bool;

    fn groups(&self, car: &CarId) -> Vec<PassengerGroup>;

    fn capacity(&self, car: &CarId) -> u32;

    /// Current passenger count against capacity.
    fn load(&self, car: &CarId) -> PassengerLoad {
        let count = self.groups(car).iter().map(|g| g.count).sum();
        PassengerLoad::new(count, self.capacity(car))
    }

    fn add_unit(
        &mut self,
        car: &CarId,
        origin: &StationId,
        destination: &StationId,
        boarded_at: DateTime<Utc>,
    );

    /// Remove one passenger. Returns when they boarded, or `None` if the
    /// car carries no such passenger.
    fn remove_unit(
        &mut self,
        car: &CarId,
        origin: &StationId,
        destination: &StationId,
    ) -> Option<DateTime<Utc>>;
}

/// One car's manifest.
#[derive(Debug, Clone, Default)]
pub struct CarManifest {
    pub train: Option<TrainId>,
    pub capacity: u32,
    pub groups: Vec<PassengerGroup>,
}

/// Manifests held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryManifests {
    cars: HashMap<CarId, CarManifest>,
}

impl InMemoryManifests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a car coupled to `train`.
    pub fn couple(&mut self, train: &TrainId, car: CarId, capacity: u32) {
        let manifest = self.cars.entry(car).or_default();
        manifest.train = Some(train.clone());
        manifest.capacity = capacity;
    }

    pub fn decouple(&mut self, car: &CarId) {
        if let Some(manifest) = self.cars.get_mut(car) {
            manifest.train = None;
        }
    }

    pub fn get(&self, car: &CarId) -> Option<&CarManifest> {
        self.cars.get(car)
    }

    /// Passengers aboard every car.
    pub fn total(&self) -> u32 {
        self.cars
            .values()
            .flat_map(|m| &m.groups)
            .map(|g| g.count)
            .sum()
    }
}

impl ManifestStore for InMemoryManifests {
    fn is_coupled(&self, train: &TrainId, car: &CarId) -> bool {
        self.cars
            .get(car)
            .is_some_and(|m| m.train.as_ref() == Some(train))
    }

    fn groups(&self, car: &CarId) -> Vec<PassengerGroup> {
        self.cars
            .get(car)
            .map(|m| m.groups.clone())
            .unwrap_or_default()
    }

    fn capacity(&self, car: &CarId) -> u32 {
        self.cars.get(car).map_or(0, |m| m.capacity)
    }

    fn add_unit(
        &mut self,
        car: &CarId,
        origin: &StationId,
        destination: &StationId,
        boarded_at: DateTime<Utc>,
    ) {
        let manifest = self.cars.entry(car.clone()).or_default();
        match manifest
            .groups
            .iter_mut()
            .find(|g| g.matches(origin, destination))
        {
            Some(group) => {
                group.count += 1;
                group.boarded_at = group.boarded_at.min(boarded_at);
            }
            None => manifest.groups.push(PassengerGroup {
                origin: origin.clone(),
                destination: destination.clone(),
                count: 1,
                boarded_at,
            }),
        }
    }

    fn remove_unit(
        &mut self,
        car: &CarId,
        origin: &StationId,
        destination: &StationId,
    ) -> Option<DateTime<Utc>> {
        let manifest = self.cars.get_mut(car)?;
        let pos = manifest
            .groups
            .iter()
            .position(|g| g.matches(origin, destination) && g.count > 0)?;
        let group = &mut manifest.groups[pos];
        group.count -= 1;
        let boarded_at = group.boarded_at;
        if group.count == 0 {
            manifest.groups.remove(pos);
        }
        Some(boarded_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> StationId {
        StationId::parse(s).unwrap()
    }

    #[test]
    fn coupling_is_per_train() {
        let mut manifests = InMemoryManifests::new();
        let car = CarId::new("c1");
        manifests.couple(&TrainId::new("t1"), car.clone(), 10);

        assert!(manifests.is_coupled(&TrainId::new("t1"), &car));
        assert!(!manifests.is_coupled(&TrainId::new("t2"), &car));

        manifests.decouple(&car);
        assert!(!manifests.is_coupled(&TrainId::new("t1"), &car));
    }

    #[test]
    fn load_counts_all_groups() {
        let mut manifests = InMemoryManifests::new();
        let car = CarId::new("c1");
        manifests.couple(&TrainId::new("t1"), car.clone(), 3);
        let now = Utc::now();
        manifests.add_unit(&car, &id("a"), &id("b"), now);
        manifests.add_unit(&car, &id("a"), &id("c"), now);
        manifests.add_unit(&car, &id("a"), &id("b"), now);

        assert_eq!(manifests.groups(&car).len(), 2);
        assert_eq!(manifests.load(&car), PassengerLoad::new(3, 3));
        assert!(manifests.load(&car).is_full());

        assert!(manifests.remove_unit(&car, &id("a"), &id("c")).is_some());
        assert!(manifests.remove_unit(&car, &id("a"), &id("c")).is_none());
        assert_eq!(manifests.total(), 2);
    }
}
