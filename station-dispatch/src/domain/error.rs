//! Domain error types.
//!
//! These errors represent validation failures in reference data handed to
//! the engine by its environment.

use super::StationId;

/// Domain-level errors for validation and data consistency.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// The same station identifier appears twice in the route sequence
    #[error("station {0} appears more than once in the route sequence")]
    DuplicateStation(StationId),

    /// A station referenced by configuration is not part of the route
    #[error("station {0} is not part of the route sequence")]
    UnknownStation(StationId),

    /// A branch station is not numbered directly after its junction
    #[error("branch station {0} does not directly follow its junction")]
    BranchOutOfOrder(StationId),

    /// A fractional level was outside 0..=1
    #[error("fraction out of range: {0}")]
    FractionOutOfRange(f32),
}
