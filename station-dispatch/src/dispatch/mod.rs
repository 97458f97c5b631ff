//! The per-arrival decision engine.
//!
//! [`Dispatcher`] owns every train's route configuration and live state and
//! talks to the outside world only through [`DispatchHost`].

mod arrival;
mod destinations;
mod direction;
mod host;
mod pause;
mod terminus;
mod transfers;


pub use arrival::{Dispatcher, TrainRecord};
pub use destinations::{DestinationPlanner, TransferCase, push_destinations};
pub use direction::{DirectionResolver, Inference};
pub use host::{DispatchHost, NoticeCode};
pub use pause::{any_car_under_full, explicit_pause, stay_stopped};
pub use terminus::{TerminusHandler, TerminusOutcome, run_reversal};
