//! The environment the dispatcher runs inside.

use std::collections::BTreeSet;
use std::fmt;

use crate::domain::{CarId, PassengerLoad, Resource, StationId, StationSequence, TrainId};

/// Category of a player-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeCode {
    ConfigurationError,
    DirectionRequired,
    Paused,
    LowResource,
    WaitingForLoad,
}

impl fmt::Display for NoticeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            NoticeCode::ConfigurationError => "config",
            NoticeCode::DirectionRequired => "direction",
            NoticeCode::Paused => "paused",
            NoticeCode::LowResource => "resource",
            NoticeCode::WaitingForLoad => "load",
        };
        f.write_str(code)
    }
}

/// Trait for the host simulation the dispatcher reads from and commands.
///
/// This abstraction allows the engine to be driven by a game, a replay or a
/// test double. Commands are fire-and-forget; the host applies them
/// transactionally.
pub trait DispatchHost {
    /// The fixed global station ordering.
    fn stations(&self) -> &StationSequence;

    /// Fractional level, 0..=1, of a consumable on the train's locomotive.
    fn resource_level(&self, train: &TrainId, resource: Resource) -> f32;

    /// Passenger cars currently coupled to the train.
    fn passenger_cars(&self, train: &TrainId) -> Vec<CarId>;

    /// Destinations a car currently accepts passengers for.
    fn car_destinations(&self, car: &CarId) -> BTreeSet<StationId>;

    fn set_car_destinations(&mut self, car: &CarId, destinations: BTreeSet<StationId>);

    fn passenger_load(&self, car: &CarId) -> PassengerLoad;

    fn reverse_locomotive(&mut self, train: &TrainId);

    /// Message shown to the player controlling `train`.
    fn post_notice(&mut self, train: &TrainId, code: NoticeCode, text: &str);

    /// Message shown to every player.
    fn broadcast(&mut self, text: &str);
}
