//! Domain types for the dispatch engine.
//!
//! This module contains the reference data the engine consumes from its
//! environment. Types enforce their invariants at construction time, so code
//! that receives them can trust their validity.

mod direction;
mod error;
mod rolling_stock;
mod station;

pub use direction::{Direction, TerminusSide, TravelMode};
pub use error::DomainError;
pub use rolling_stock::{CarId, PassengerLoad, Resource, TrainId};
pub use station::{InvalidStationId, Station, StationId, StationSequence};
