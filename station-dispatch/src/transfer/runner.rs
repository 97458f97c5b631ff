//! Drives transfer tasks on the tokio runtime.
//!
//! Each car's task runs in its own tokio task. Between passengers the task
//! sleeps for a paced delay; each passenger is moved while holding the yard
//! lock, so readers never see a passenger in neither place.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::StationId;

use super::manifest::ManifestStore;
use super::pacing::Pacer;
use super::pool::TransferPools;
use super::task::{Step, TransferCheckpoint, TransferKind, TransferOutcome, TransferTask};

/// Station pools and car manifests, shared between transfer tasks and
/// readers.
#[derive(Debug, Default)]
pub struct TransferYard<M> {
    pub pools: TransferPools,
    pub manifests: M,
    /// Stations whose pool changed since the last save.
    pub dirty: BTreeSet<StationId>,
}

impl<M> TransferYard<M> {
    pub fn new(pools: TransferPools, manifests: M) -> Self {
        Self {
            pools,
            manifests,
            dirty: BTreeSet::new(),
        }
    }

    /// Take the set of changed stations, leaving it empty.
    pub fn take_dirty(&mut self) -> BTreeSet<StationId> {
        std::mem::take(&mut self.dirty)
    }
}

pub type SharedYard<M> = Arc<Mutex<TransferYard<M>>>;

/// Lock the yard. A panic while holding the lock cannot leave a passenger
/// half-moved, so a poisoned lock is still usable.
pub fn lock_yard<M>(yard: &Mutex<TransferYard<M>>) -> MutexGuard<'_, TransferYard<M>> {
    yard.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub outcome: TransferOutcome,
    pub checkpoint: TransferCheckpoint,
}

/// A running transfer. Dropping the handle cancels the task.
#[derive(Debug)]
pub struct TransferHandle {
    kind: TransferKind,
    handle: Option<JoinHandle<TaskReport>>,
}

impl TransferHandle {
    pub fn kind(&self) -> TransferKind {
        self.kind
    }

    /// Stop the task at its next pacing pause.
    pub fn cancel(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }

    /// Wait for the task. Returns `None` if it was cancelled.
    pub async fn join(mut self) -> Option<TaskReport> {
        let handle = self.handle.take()?;
        match handle.await {
            Ok(report) => Some(report),
            Err(err) => {
                if !err.is_cancelled() {
                    warn!(error = %err, "Transfer task failed");
                }
                None
            }
        }
    }
}

impl Drop for TransferHandle {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

/// Spawn one task.
pub fn spawn_transfer<M>(
    yard: SharedYard<M>,
    mut task: TransferTask,
    mut pacer: Pacer,
) -> TransferHandle
where
    M: ManifestStore + Send + 'static,
{
    let kind = task.kind();
    let handle = tokio::spawn(async move {
        loop {
            let delay = pacer.next_delay();
            tokio::time::sleep(delay).await;
            task.record_elapsed(delay);

            let step = {
                let mut guard = lock_yard(&yard);
                let TransferYard {
                    pools,
                    manifests,
                    dirty,
                } = &mut *guard;
                let step = task.step(pools, manifests);
                if step == Step::Moved {
                    dirty.insert(task.checkpoint().station.clone());
                }
                step
            };

            if let Step::Finished(outcome) = step {
                let checkpoint = task.into_checkpoint();
                debug!(
                    car = %checkpoint.car,
                    station = %checkpoint.station,
                    kind = ?checkpoint.kind,
                    moved = checkpoint.moved,
                    outcome = ?outcome,
                    "Transfer finished"
                );
                return TaskReport {
                    outcome,
                    checkpoint,
                };
            }
        }
    });
    TransferHandle {
        kind,
        handle: Some(handle),
    }
}

/// Spawn one task per car, each with its own pacer.
pub fn spawn_transfers<M>(
    yard: &SharedYard<M>,
    tasks: Vec<TransferTask>,
    mut pacer: impl FnMut() -> Pacer,
) -> Vec<TransferHandle>
where
    M: ManifestStore + Send + 'static,
{
    tasks
        .into_iter()
        .map(|task| spawn_transfer(Arc::clone(yard), task, pacer()))
        .collect()
}

/// Wait for every handle. Cancelled tasks report `None`.
pub async fn join_transfers(handles: Vec<TransferHandle>) -> Vec<Option<TaskReport>> {
    join_all(handles.into_iter().map(TransferHandle::join)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CarId, TrainId};
    use crate::transfer::manifest::InMemoryManifests;
    use chrono::Utc;
    use std::time::Duration;

    fn id(s: &str) -> StationId {
        StationId::parse(s).unwrap()
    }

    fn pacer() -> Pacer {
        Pacer::seeded(Duration::from_secs(1), 1.0, 2.0, 42)
    }

    fn yard_with_car(aboard: u32) -> (SharedYard<InMemoryManifests>, TrainId, CarId) {
        let train = TrainId::new("t1");
        let car = CarId::new("c1");
        let mut manifests = InMemoryManifests::new();
        manifests.couple(&train, car.clone(), 10);
        for _ in 0..aboard {
            manifests.add_unit(&car, &id("a"), &id("x"), Utc::now());
        }
        let yard = Arc::new(Mutex::new(TransferYard::new(TransferPools::new(), manifests)));
        (yard, train, car)
    }

    fn unload_task(
        yard: &SharedYard<InMemoryManifests>,
        train: &TrainId,
        car: &CarId,
    ) -> TransferTask {
        let groups = lock_yard(yard).manifests.groups(car);
        let stop_at = [id("a")].into_iter().collect();
        TransferTask::unload(train.clone(), car.clone(), id("hub"), &groups, &stop_at)
    }

    #[tokio::test(start_paused = true)]
    async fn unload_runs_to_completion() {
        let (yard, train, car) = yard_with_car(3);
        let task = unload_task(&yard, &train, &car);

        let handles = spawn_transfers(&yard, vec![task], pacer);
        let reports = join_transfers(handles).await;

        let report = reports[0].as_ref().unwrap();
        assert_eq!(report.outcome, TransferOutcome::Drained);
        assert_eq!(report.checkpoint.moved, 3);
        assert!(report.checkpoint.elapsed >= Duration::from_secs(3));

        let mut guard = lock_yard(&yard);
        assert_eq!(guard.pools.total(), 3);
        assert_eq!(guard.manifests.total(), 0);
        assert_eq!(guard.take_dirty(), [id("hub")].into_iter().collect());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_cancels_between_moves() {
        let (yard, train, car) = yard_with_car(5);
        let task = unload_task(&yard, &train, &car);

        let handle = spawn_transfer(Arc::clone(&yard), task, pacer());
        // Each move waits between one and two seconds.
        tokio::time::sleep(Duration::from_millis(2500)).await;
        drop(handle);
        tokio::time::sleep(Duration::from_secs(30)).await;

        let guard = lock_yard(&yard);
        let moved = guard.pools.total();
        assert!((1..5).contains(&moved), "moved {moved}");
        assert_eq!(moved + guard.manifests.total(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_join_reports_none() {
        let (yard, train, car) = yard_with_car(2);
        let task = unload_task(&yard, &train, &car);

        let handle = spawn_transfer(Arc::clone(&yard), task, pacer());
        handle.cancel();
        assert_eq!(handle.join().await, None);
        assert_eq!(lock_yard(&yard).manifests.total(), 2);
    }
}
