//! Passenger transfers between cars and station pools.
//!
//! At a transfer station, passengers a train will not carry to their
//! destination are unloaded into the station pool. A later train whose
//! destinations include theirs picks them up again. Both directions move
//! one passenger at a time, paced, and can be cancelled and resumed.

mod manifest;
mod pacing;
mod pool;
mod runner;
mod task;

pub use manifest::{CarManifest, InMemoryManifests, ManifestStore};
pub use pacing::Pacer;
pub use pool::{PassengerGroup, TransferPool, TransferPools};
pub use runner::{
    SharedYard, TaskReport, TransferHandle, TransferYard, join_transfers, lock_yard,
    spawn_transfer, spawn_transfers,
};
pub use task::{PlannedMove, Step, TransferCheckpoint, TransferKind, TransferOutcome, TransferTask};
