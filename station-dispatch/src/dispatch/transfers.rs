//! Transfer entry points on the dispatcher.
//!
//! The dispatcher only plans and books transfers. Running them is left to
//! [`crate::transfer::spawn_transfers`].

use tracing::{debug, info};

use crate::domain::TrainId;
use crate::train::TransferProgress;
use crate::transfer::{ManifestStore, TransferKind, TransferOutcome, TransferPools, TransferTask};

use super::arrival::Dispatcher;
use super::host::DispatchHost;

impl Dispatcher {
    /// Plan unloading every car of `train` at its current station.
    ///
    /// Returns no tasks unless the station is a transfer station and this
    /// visit's unload has not already run.
    pub fn plan_unload<H, M>(
        &mut self,
        host: &H,
        manifests: &M,
        train: &TrainId,
    ) -> Vec<TransferTask>
    where
        H: DispatchHost + ?Sized,
        M: ManifestStore + ?Sized,
    {
        let Some(record) = self.trains.get_mut(train) else {
            return Vec::new();
        };
        let Some(station) = record.state.current_station().cloned() else {
            return Vec::new();
        };
        if !record.config.is_transfer(&station)
            || record.state.transfers.unload != TransferProgress::Idle
        {
            return Vec::new();
        }

        let tasks: Vec<TransferTask> = host
            .passenger_cars(train)
            .into_iter()
            .filter(|car| manifests.is_coupled(train, car))
            .map(|car| {
                let groups = manifests.groups(&car);
                TransferTask::unload(
                    train.clone(),
                    car,
                    station.clone(),
                    &groups,
                    record.config.stop_at(),
                )
            })
            .filter(|task| task.remaining() > 0)
            .collect();

        record.state.transfers.unload = TransferProgress::Running;
        info!(
            train = %train,
            station = %station,
            cars = tasks.len(),
            "Unloading transfer passengers"
        );
        tasks
    }

    /// Plan loading waiting passengers onto every car of `train`.
    ///
    /// Passengers are taken when their destination is among the train's
    /// expected destinations, which already include pickups reachable by
    /// changing further along.
    pub fn plan_load<H>(
        &mut self,
        host: &H,
        pools: &TransferPools,
        train: &TrainId,
    ) -> Vec<TransferTask>
    where
        H: DispatchHost + ?Sized,
    {
        let destinations = self.expected_destinations(host, train);
        let Some(record) = self.trains.get_mut(train) else {
            return Vec::new();
        };
        let Some(station) = record.state.current_station().cloned() else {
            return Vec::new();
        };
        if !record.config.is_transfer(&station)
            || record.state.transfers.load != TransferProgress::Idle
        {
            return Vec::new();
        }
        let Some(destinations) = destinations else {
            debug!(train = %train, "No destinations to load for");
            return Vec::new();
        };
        let Some(pool) = pools.get(&station) else {
            record.state.transfers.load = TransferProgress::Complete;
            return Vec::new();
        };

        let tasks: Vec<TransferTask> = host
            .passenger_cars(train)
            .into_iter()
            .map(|car| TransferTask::load(train.clone(), car, pool, &destinations))
            .filter(|task| task.remaining() > 0)
            .collect();

        record.state.transfers.load = TransferProgress::Running;
        info!(
            train = %train,
            station = %station,
            cars = tasks.len(),
            "Loading transfer passengers"
        );
        tasks
    }

    /// Book the end of a transfer. A cancelled run, or one cut short by a
    /// decoupled car, goes back to idle so it can be planned again.
    pub fn finish_transfer(
        &mut self,
        train: &TrainId,
        kind: TransferKind,
        outcome: Option<TransferOutcome>,
    ) {
        let Some(record) = self.trains.get_mut(train) else {
            return;
        };
        let progress = match outcome {
            None | Some(TransferOutcome::Decoupled) => TransferProgress::Idle,
            Some(_) => TransferProgress::Complete,
        };
        debug!(train = %train, kind = ?kind, outcome = ?outcome, "Transfer finished");
        match kind {
            TransferKind::Unload => record.state.transfers.unload = progress,
            TransferKind::Load => record.state.transfers.load = progress,
        }
    }
}
