//! Scripted replays against the simulated host.
//!
//! A scenario file describes the line, the trains on it and a list of events
//! (arrivals, operator commands, boarding, transfers). [`Replay`] feeds the
//! events to a [`Dispatcher`] backed by a [`SimHost`] and records the
//! decision made at every arrival.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::DispatchConfig;
use crate::dispatch::{DispatchHost, Dispatcher};
use crate::domain::{CarId, Direction, DomainError, Resource, StationId, StationSequence, TrainId};
use crate::route::{RouteConfig, Topology};
use crate::sim::SimHost;
use crate::store::{JsonStore, StoreError};
use crate::transfer::{
    Pacer, TransferKind, TransferOutcome, TransferPool, TransferPools, TransferTask,
    join_transfers, lock_yard, spawn_transfers,
};

/// Errors loading or replaying a scenario.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scenario: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("event refers to unknown train {0}")]
    UnknownTrain(TrainId),
}

/// A passenger car coupled to a train at the start of the replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarSetup {
    pub id: CarId,
    pub capacity: u32,
}

/// A train's starting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainSetup {
    pub id: TrainId,
    #[serde(default)]
    pub route: RouteConfig,
    #[serde(default)]
    pub cars: Vec<CarSetup>,
    /// Resource levels as fractions; missing resources start full.
    #[serde(default)]
    pub levels: BTreeMap<Resource, f32>,
}

/// Something that happens during a replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    Arrive {
        train: TrainId,
        station: StationId,
    },
    Depart {
        train: TrainId,
    },
    Continue {
        train: TrainId,
    },
    SetDirection {
        train: TrainId,
        direction: Direction,
    },
    SetLevel {
        train: TrainId,
        resource: Resource,
        level: f32,
    },
    Board {
        car: CarId,
        origin: StationId,
        destination: StationId,
        count: u32,
    },
    /// Board passengers for the car's first destination until it is full.
    FillCar {
        car: CarId,
        origin: StationId,
    },
    /// Unload and then load transfer passengers at the train's station.
    Transfer {
        train: TrainId,
    },
}

/// A scripted session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub stations: StationSequence,
    #[serde(default)]
    pub topology: Topology,
    #[serde(default)]
    pub trains: Vec<TrainSetup>,
    /// Passengers already waiting at transfer stations.
    #[serde(default)]
    pub pools: Vec<TransferPool>,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = serde_json::from_str(json)?;
        scenario.check()?;
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let json = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Reject scenarios that name stations off the line.
    pub fn check(&self) -> Result<(), DomainError> {
        self.topology.check_against(&self.stations)?;
        for train in &self.trains {
            train.route.check_against(&self.stations)?;
        }
        for pool in &self.pools {
            if !self.stations.contains(pool.station()) {
                return Err(DomainError::UnknownStation(pool.station().clone()));
            }
        }
        Ok(())
    }
}

/// What the engine decided at one arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub train: TrainId,
    pub station: StationId,
    pub hold: bool,
    /// Why the train is held, as shown to the operator.
    pub reason: Option<String>,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}: ", self.train, self.station)?;
        match (&self.reason, self.hold) {
            (Some(reason), true) => write!(f, "hold ({reason})"),
            (None, true) => f.write_str("hold"),
            (_, false) => f.write_str("depart"),
        }
    }
}

/// A dispatcher and simulated host driven by scenario events.
#[derive(Debug)]
pub struct Replay {
    dispatcher: Dispatcher,
    host: SimHost,
    config: DispatchConfig,
    store: Option<JsonStore>,
}

impl Replay {
    /// Set up the line and trains. With a store, previously saved routes and
    /// pools take the place of the scenario's.
    pub fn new(
        scenario: &Scenario,
        config: DispatchConfig,
        store: Option<JsonStore>,
    ) -> Result<Self, ScenarioError> {
        let mut pools = TransferPools::new();
        for pool in &scenario.pools {
            pools.insert(pool.clone());
        }
        let mut dispatcher = Dispatcher::new(scenario.topology.clone());
        for train in &scenario.trains {
            dispatcher.insert_route(train.id.clone(), train.route.clone());
        }

        if let Some(store) = &store {
            for pool in store.load_pools()?.iter() {
                pools.insert(pool.clone());
            }
            for (train, route) in store.load_routes()? {
                if let Err(e) = route.check_against(&scenario.stations) {
                    warn!(train = %train, error = %e, "Ignoring saved route");
                    continue;
                }
                debug!(train = %train, "Restored saved route");
                dispatcher.insert_route(train, route);
            }
        }

        let mut host = SimHost::new(scenario.stations.clone(), pools);
        for train in &scenario.trains {
            for car in &train.cars {
                host.couple(&train.id, car.id.clone(), car.capacity);
            }
            for (&resource, &level) in &train.levels {
                host.set_level(&train.id, resource, level);
            }
        }

        Ok(Self {
            dispatcher,
            host,
            config,
            store,
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn host(&self) -> &SimHost {
        &self.host
    }

    /// Apply every event in order, returning the arrival decisions.
    pub async fn run(&mut self, events: &[Event]) -> Result<Vec<Decision>, ScenarioError> {
        let mut decisions = Vec::new();
        for event in events {
            if let Some(decision) = self.apply(event).await? {
                decisions.push(decision);
            }
        }
        Ok(decisions)
    }

    pub async fn apply(&mut self, event: &Event) -> Result<Option<Decision>, ScenarioError> {
        debug!(event = ?event, "Applying event");
        match event {
            Event::Arrive { train, station } => {
                self.require(train)?;
                let hold = self.dispatcher.handle_arrival(&mut self.host, train, station);
                let reason = self
                    .dispatcher
                    .state(train)
                    .and_then(|s| s.stop_reason())
                    .map(ToString::to_string);
                info!(train = %train, station = %station, hold, reason = ?reason, "Arrival");
                self.save_route(train)?;
                return Ok(Some(Decision {
                    train: train.clone(),
                    station: station.clone(),
                    hold,
                    reason,
                }));
            }
            Event::Depart { train } => {
                self.require(train)?;
                self.dispatcher.on_departure(train);
            }
            Event::Continue { train } => {
                self.require(train)?;
                self.dispatcher.request_continue(train);
            }
            Event::SetDirection { train, direction } => {
                self.require(train)?;
                self.dispatcher.set_direction(train, *direction);
                self.save_route(train)?;
            }
            Event::SetLevel {
                train,
                resource,
                level,
            } => self.host.set_level(train, *resource, *level),
            Event::Board {
                car,
                origin,
                destination,
                count,
            } => self.host.board(car, origin, destination, *count),
            Event::FillCar { car, origin } => self.host.fill(car, origin),
            Event::Transfer { train } => {
                self.require(train)?;
                self.transfer(train).await?;
            }
        }
        Ok(None)
    }

    /// Unload passengers this train will not carry home, then pick up
    /// passengers for its expected destinations.
    pub async fn transfer(&mut self, train: &TrainId) -> Result<(), ScenarioError> {
        let unload = {
            let yard = lock_yard(self.host.yard());
            self.dispatcher.plan_unload(&self.host, &yard.manifests, train)
        };
        self.run_tasks(train, TransferKind::Unload, unload).await?;

        let load = {
            let yard = lock_yard(self.host.yard());
            self.dispatcher.plan_load(&self.host, &yard.pools, train)
        };
        self.run_tasks(train, TransferKind::Load, load).await
    }

    async fn run_tasks(
        &mut self,
        train: &TrainId,
        kind: TransferKind,
        tasks: Vec<TransferTask>,
    ) -> Result<(), ScenarioError> {
        let config = &self.config;
        let handles = spawn_transfers(self.host.yard(), tasks, || Pacer::from_config(config));
        let reports = join_transfers(handles).await;

        let mut outcome = Some(TransferOutcome::Drained);
        let mut moved = 0;
        for report in &reports {
            match report {
                None => outcome = None,
                Some(report) => {
                    moved += report.checkpoint.moved;
                    if report.outcome == TransferOutcome::Decoupled && outcome.is_some() {
                        outcome = Some(TransferOutcome::Decoupled);
                    }
                }
            }
        }
        info!(train = %train, kind = ?kind, cars = reports.len(), moved, "Transfer done");
        if moved > 0 {
            let verb = match kind {
                TransferKind::Unload => "left",
                TransferKind::Load => "picked up",
            };
            self.host.broadcast(&format!("{train} {verb} {moved} transfer passengers"));
        }
        self.dispatcher.finish_transfer(train, kind, outcome);
        self.persist_pools()?;
        Ok(())
    }

    /// Write every pool changed since the last call.
    fn persist_pools(&self) -> Result<(), StoreError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let changed: Vec<(StationId, Option<TransferPool>)> = {
            let mut yard = lock_yard(self.host.yard());
            let dirty = yard.take_dirty();
            dirty
                .into_iter()
                .map(|station| {
                    let pool = yard.pools.get(&station).filter(|p| !p.is_empty()).cloned();
                    (station, pool)
                })
                .collect()
        };
        for (station, pool) in changed {
            match pool {
                Some(pool) => store.save_pool(&pool)?,
                None => store.delete_pool(&station)?,
            }
        }
        Ok(())
    }

    fn save_route(&self, train: &TrainId) -> Result<(), StoreError> {
        if let (Some(store), Some(route)) = (&self.store, self.dispatcher.route(train)) {
            store.save_route(train, route)?;
        }
        Ok(())
    }

    fn require(&self, train: &TrainId) -> Result<(), ScenarioError> {
        if self.dispatcher.route(train).is_some() {
            Ok(())
        } else {
            Err(ScenarioError::UnknownTrain(train.clone()))
        }
    }
}

/// Load the manifests of every car as `(car, passengers aboard)`.
pub fn car_loads(host: &SimHost, train: &TrainId) -> Vec<(CarId, u32)> {
    host.passenger_cars(train)
        .into_iter()
        .map(|car| {
            let count = host.passenger_load(&car).count;
            (car, count)
        })
        .collect()
}

/// Replay a whole scenario.
pub async fn replay(
    scenario: &Scenario,
    config: DispatchConfig,
    store: Option<JsonStore>,
) -> Result<Vec<Decision>, ScenarioError> {
    let mut replay = Replay::new(scenario, config, store)?;
    replay.run(&scenario.events).await
}
