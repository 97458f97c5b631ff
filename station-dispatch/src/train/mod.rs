//! Per-train dispatch state.

mod state;

pub use state::{
    BranchPoint, DirectionWait, Movement, ResourceLatches, StopReason, TrainState, TransferFlags,
    TransferProgress,
};
