//! Train and car identifiers, consumable resources and passenger loads.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Host identifier of a train (its lead locomotive).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainId(String);

impl TrainId {
    pub fn new(s: impl Into<String>) -> Self {
        TrainId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TrainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrainId({})", self.0)
    }
}

impl fmt::Display for TrainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Host identifier of a single passenger car.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CarId(String);

impl CarId {
    pub fn new(s: impl Into<String>) -> Self {
        CarId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CarId({})", self.0)
    }
}

impl fmt::Display for CarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A consumable a locomotive can run low on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Diesel,
    Coal,
    Water,
}

impl Resource {
    /// All resources, in the order they are checked.
    pub const ALL: [Resource; 3] = [Resource::Diesel, Resource::Coal, Resource::Water];
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Diesel => f.write_str("diesel"),
            Resource::Coal => f.write_str("coal"),
            Resource::Water => f.write_str("water"),
        }
    }
}

/// Passenger count and seating capacity of one car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PassengerLoad {
    pub count: u32,
    pub capacity: u32,
}

impl PassengerLoad {
    pub fn new(count: u32, capacity: u32) -> Self {
        Self { count, capacity }
    }

    /// Whether every seat is taken.
    ///
    /// ```
    /// use station_dispatch::domain::PassengerLoad;
    ///
    /// assert!(PassengerLoad::new(40, 40).is_full());
    /// assert!(!PassengerLoad::new(39, 40).is_full());
    /// ```
    pub fn is_full(&self) -> bool {
        self.count >= self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display() {
        assert_eq!(TrainId::new("BA 25").to_string(), "BA 25");
        assert_eq!(format!("{:?}", CarId::new("c1")), "CarId(c1)");
    }

    #[test]
    fn resources_in_check_order() {
        assert_eq!(
            Resource::ALL,
            [Resource::Diesel, Resource::Coal, Resource::Water]
        );
        assert_eq!(Resource::Coal.to_string(), "coal");
    }

    #[test]
    fn empty_car_with_no_seats_counts_as_full() {
        assert!(PassengerLoad::new(0, 0).is_full());
    }
}
