//! Passengers waiting at a transfer station.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::StationId;

/// Passengers sharing an origin and destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassengerGroup {
    pub origin: StationId,
    pub destination: StationId,
    pub count: u32,
    /// When the earliest passenger in the group boarded.
    pub boarded_at: DateTime<Utc>,
}

impl PassengerGroup {
    pub fn matches(&self, origin: &StationId, destination: &StationId) -> bool {
        &self.origin == origin && &self.destination == destination
    }
}

/// The pool at one station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPool {
    station: StationId,
    #[serde(default)]
    groups: Vec<PassengerGroup>,
}

impl TransferPool {
    pub fn new(station: StationId) -> Self {
        Self {
            station,
            groups: Vec::new(),
        }
    }

    pub fn station(&self) -> &StationId {
        &self.station
    }

    pub fn groups(&self) -> &[PassengerGroup] {
        &self.groups
    }

    pub fn total(&self) -> u32 {
        self.groups.iter().map(|g| g.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Add one passenger, merging into an existing group when possible.
    pub fn push_unit(
        &mut self,
        origin: &StationId,
        destination: &StationId,
        boarded_at: DateTime<Utc>,
    ) {
        match self
            .groups
            .iter_mut()
            .find(|g| g.matches(origin, destination))
        {
            Some(group) => {
                group.count += 1;
                group.boarded_at = group.boarded_at.min(boarded_at);
            }
            None => self.groups.push(PassengerGroup {
                origin: origin.clone(),
                destination: destination.clone(),
                count: 1,
                boarded_at,
            }),
        }
    }

    /// Take one passenger out of the matching group. An emptied group is
    /// removed.
    pub fn take_unit(
        &mut self,
        origin: &StationId,
        destination: &StationId,
    ) -> Option<DateTime<Utc>> {
        let pos = self
            .groups
            .iter()
            .position(|g| g.matches(origin, destination) && g.count > 0)?;
        let group = &mut self.groups[pos];
        group.count -= 1;
        let boarded_at = group.boarded_at;
        if group.count == 0 {
            self.groups.remove(pos);
        }
        Some(boarded_at)
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }
}

/// Every station pool, keyed by station.
#[derive(Debug, Clone, Default)]
pub struct TransferPools {
    pools: HashMap<StationId, TransferPool>,
}

impl TransferPools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, station: &StationId) -> Option<&TransferPool> {
        self.pools.get(station)
    }

    pub fn get_mut(&mut self, station: &StationId) -> Option<&mut TransferPool> {
        self.pools.get_mut(station)
    }

    pub fn get_or_create(&mut self, station: &StationId) -> &mut TransferPool {
        self.pools
            .entry(station.clone())
            .or_insert_with(|| TransferPool::new(station.clone()))
    }

    /// Replace a station's pool, typically with one loaded from disk.
    pub fn insert(&mut self, pool: TransferPool) {
        self.pools.insert(pool.station().clone(), pool);
    }

    pub fn remove(&mut self, station: &StationId) -> Option<TransferPool> {
        self.pools.remove(station)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransferPool> {
        self.pools.values()
    }

    /// Passengers waiting across all stations.
    pub fn total(&self) -> u32 {
        self.pools.values().map(TransferPool::total).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn id(s: &str) -> StationId {
        StationId::parse(s).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn push_merges_matching_group() {
        let mut pool = TransferPool::new(id("hub"));
        pool.push_unit(&id("a"), &id("z"), at(200));
        pool.push_unit(&id("a"), &id("z"), at(100));
        pool.push_unit(&id("b"), &id("z"), at(300));

        assert_eq!(pool.groups().len(), 2);
        assert_eq!(pool.groups()[0].count, 2);
        assert_eq!(pool.groups()[0].boarded_at, at(100));
        assert_eq!(pool.total(), 3);
    }

    #[test]
    fn take_removes_exhausted_group() {
        let mut pool = TransferPool::new(id("hub"));
        pool.push_unit(&id("a"), &id("z"), at(100));
        pool.push_unit(&id("a"), &id("z"), at(100));

        assert_eq!(pool.take_unit(&id("a"), &id("z")), Some(at(100)));
        assert_eq!(pool.groups().len(), 1);
        assert_eq!(pool.take_unit(&id("a"), &id("z")), Some(at(100)));
        assert!(pool.is_empty());
        assert_eq!(pool.take_unit(&id("a"), &id("z")), None);
    }

    #[test]
    fn pools_are_created_on_demand() {
        let mut pools = TransferPools::new();
        assert!(pools.get(&id("hub")).is_none());
        pools.get_or_create(&id("hub")).push_unit(&id("a"), &id("z"), at(0));
        assert_eq!(pools.total(), 1);
        assert_eq!(pools.get(&id("hub")).map(TransferPool::total), Some(1));
    }

    #[test]
    fn pool_json_shape() {
        let mut pool = TransferPool::new(id("hub"));
        pool.push_unit(&id("a"), &id("z"), at(0));
        let json = serde_json::to_value(&pool).unwrap();
        assert_eq!(json["station"], "hub");
        assert_eq!(json["groups"][0]["destination"], "z");
        assert_eq!(json["groups"][0]["count"], 1);

        let back: TransferPool = serde_json::from_value(json).unwrap();
        assert_eq!(back, pool);
    }
}
