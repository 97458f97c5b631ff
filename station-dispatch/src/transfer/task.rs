//! Resumable unload and load tasks.
//!
//! A task is planned once from a snapshot of the car's manifest (unload) or
//! the station pool (load). It then moves one passenger per [`step`], always
//! re-checking the live source, so anything that shrank the source after
//! planning is simply skipped. The whole task state is a
//! [`TransferCheckpoint`] that can be serialized and resumed.
//!
//! [`step`]: TransferTask::step

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::domain::{CarId, StationId, TrainId};

use super::manifest::ManifestStore;
use super::pool::{PassengerGroup, TransferPool, TransferPools};

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    /// Car to station pool.
    Unload,
    /// Station pool to car.
    Load,
}

/// Passengers of one origin and destination still to move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedMove {
    pub origin: StationId,
    pub destination: StationId,
    pub remaining: u32,
}

impl From<&PassengerGroup> for PlannedMove {
    fn from(group: &PassengerGroup) -> Self {
        Self {
            origin: group.origin.clone(),
            destination: group.destination.clone(),
            remaining: group.count,
        }
    }
}

/// Everything needed to resume a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCheckpoint {
    pub kind: TransferKind,
    pub train: TrainId,
    pub car: CarId,
    pub station: StationId,
    pub moves: Vec<PlannedMove>,
    /// Index into `moves` of the move in progress.
    pub cursor: usize,
    /// Passengers moved so far.
    pub moved: u32,
    /// Time spent pacing so far.
    pub elapsed: Duration,
}

/// Why a task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOutcome {
    /// Every planned passenger was moved or had already gone.
    Drained,
    /// The car reached capacity. Remaining pool passengers wait for the
    /// next compatible train.
    CarFull,
    /// The car is no longer coupled to the train.
    Decoupled,
    /// The station pool no longer exists.
    PoolCleared,
}

/// Result of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Moved,
    Finished(TransferOutcome),
}

/// One car's unload or load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    checkpoint: TransferCheckpoint,
}

impl TransferTask {
    /// Plan moving every passenger whose destination the train does not
    /// stop at off `car`.
    pub fn unload(
        train: TrainId,
        car: CarId,
        station: StationId,
        manifest: &[PassengerGroup],
        stop_at: &BTreeSet<StationId>,
    ) -> Self {
        let moves = manifest
            .iter()
            .filter(|g| g.count > 0 && !stop_at.contains(&g.destination))
            .map(PlannedMove::from)
            .collect();
        Self::planned(TransferKind::Unload, train, car, station, moves)
    }

    /// Plan moving pool passengers bound for any of `destinations` onto
    /// `car`.
    pub fn load(
        train: TrainId,
        car: CarId,
        pool: &TransferPool,
        destinations: &BTreeSet<StationId>,
    ) -> Self {
        let moves = pool
            .groups()
            .iter()
            .filter(|g| g.count > 0 && destinations.contains(&g.destination))
            .map(PlannedMove::from)
            .collect();
        Self::planned(
            TransferKind::Load,
            train,
            car,
            pool.station().clone(),
            moves,
        )
    }

    fn planned(
        kind: TransferKind,
        train: TrainId,
        car: CarId,
        station: StationId,
        moves: Vec<PlannedMove>,
    ) -> Self {
        Self {
            checkpoint: TransferCheckpoint {
                kind,
                train,
                car,
                station,
                moves,
                cursor: 0,
                moved: 0,
                elapsed: Duration::ZERO,
            },
        }
    }

    pub fn resume(checkpoint: TransferCheckpoint) -> Self {
        Self { checkpoint }
    }

    pub fn checkpoint(&self) -> &TransferCheckpoint {
        &self.checkpoint
    }

    pub fn into_checkpoint(self) -> TransferCheckpoint {
        self.checkpoint
    }

    pub fn kind(&self) -> TransferKind {
        self.checkpoint.kind
    }

    pub fn car(&self) -> &CarId {
        &self.checkpoint.car
    }

    /// Passengers the plan still expects to move.
    pub fn remaining(&self) -> u32 {
        self.checkpoint.moves[self.checkpoint.cursor.min(self.checkpoint.moves.len())..]
            .iter()
            .map(|m| m.remaining)
            .sum()
    }

    pub fn record_elapsed(&mut self, pacing: Duration) {
        self.checkpoint.elapsed += pacing;
    }

    /// Move one passenger.
    ///
    /// Source removal and target insertion happen together, so a caller
    /// holding both stores exclusively never exposes a half-moved passenger.
    pub fn step<M: ManifestStore + ?Sized>(
        &mut self,
        pools: &mut TransferPools,
        manifests: &mut M,
    ) -> Step {
        let cp = &mut self.checkpoint;
        if !manifests.is_coupled(&cp.train, &cp.car) {
            return Step::Finished(TransferOutcome::Decoupled);
        }
        if cp.kind == TransferKind::Load && pools.get(&cp.station).is_none() {
            return Step::Finished(TransferOutcome::PoolCleared);
        }

        while let Some(mv) = cp.moves.get_mut(cp.cursor) {
            if mv.remaining == 0 {
                cp.cursor += 1;
                continue;
            }

            let moved = match cp.kind {
                TransferKind::Unload => manifests
                    .remove_unit(&cp.car, &mv.origin, &mv.destination)
                    .map(|boarded_at| {
                        pools.get_or_create(&cp.station).push_unit(
                            &mv.origin,
                            &mv.destination,
                            boarded_at,
                        )
                    })
                    .is_some(),
                TransferKind::Load => {
                    if manifests.load(&cp.car).is_full() {
                        return Step::Finished(TransferOutcome::CarFull);
                    }
                    take_into_car(pools, manifests, &cp.station, &cp.car, mv)
                }
            };

            if !moved {
                // The source group shrank since planning.
                mv.remaining = 0;
                cp.cursor += 1;
                continue;
            }

            mv.remaining -= 1;
            cp.moved += 1;
            trace!(
                car = %cp.car,
                station = %cp.station,
                destination = %mv.destination,
                kind = ?cp.kind,
                "Moved passenger"
            );
            return Step::Moved;
        }

        Step::Finished(TransferOutcome::Drained)
    }
}

fn take_into_car<M: ManifestStore + ?Sized>(
    pools: &mut TransferPools,
    manifests: &mut M,
    station: &StationId,
    car: &CarId,
    mv: &PlannedMove,
) -> bool {
    let Some(boarded_at) = pools
        .get_mut(station)
        .and_then(|pool| pool.take_unit(&mv.origin, &mv.destination))
    else {
        return false;
    };
    manifests.add_unit(car, &mv.origin, &mv.destination, boarded_at);
    true
}
