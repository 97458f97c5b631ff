//! Station identifiers and the fixed global station ordering.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Error returned when parsing an invalid station identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid station identifier: {reason}")]
pub struct InvalidStationId {
    reason: &'static str,
}

/// A station identifier, unique within a [`StationSequence`].
///
/// Identifiers are opaque to the engine. The only validation is that they are
/// non-empty and carry no surrounding whitespace, so they can double as file
/// names for persisted pools.
///
/// # Examples
///
/// ```
/// use station_dispatch::domain::StationId;
///
/// let id = StationId::parse("bryson").unwrap();
/// assert_eq!(id.as_str(), "bryson");
///
/// assert!(StationId::parse("").is_err());
/// assert!(StationId::parse(" bryson").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StationId(String);

impl StationId {
    /// Parse a station identifier.
    pub fn parse(s: &str) -> Result<Self, InvalidStationId> {
        if s.is_empty() {
            return Err(InvalidStationId {
                reason: "must not be empty",
            });
        }
        if s.trim() != s {
            return Err(InvalidStationId {
                reason: "must not have leading or trailing whitespace",
            });
        }
        if s.contains(['/', '\\']) {
            return Err(InvalidStationId {
                reason: "must not contain path separators",
            });
        }
        Ok(StationId(s.to_string()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StationId {
    type Error = InvalidStationId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        StationId::parse(&value)
    }
}

impl From<StationId> for String {
    fn from(value: StationId) -> Self {
        value.0
    }
}

impl fmt::Debug for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StationId({})", self.0)
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A station together with its position in the route sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    pub id: StationId,
    pub order_index: usize,
}

/// The fixed, linearly ordered sequence of stations served by the line.
///
/// Owned by the environment. Lower indices lie to the east, higher indices to
/// the west.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<StationId>", into = "Vec<StationId>")]
pub struct StationSequence {
    stations: Vec<StationId>,
    index: HashMap<StationId, usize>,
}

impl StationSequence {
    /// Build a sequence from stations listed east to west.
    ///
    /// Rejects duplicate identifiers.
    pub fn new(stations: Vec<StationId>) -> Result<Self, DomainError> {
        let mut index = HashMap::with_capacity(stations.len());
        for (i, station) in stations.iter().enumerate() {
            if index.insert(station.clone(), i).is_some() {
                return Err(DomainError::DuplicateStation(station.clone()));
            }
        }
        Ok(Self { stations, index })
    }

    /// Position of a station in the sequence.
    pub fn order_index(&self, station: &StationId) -> Option<usize> {
        self.index.get(station).copied()
    }

    pub fn contains(&self, station: &StationId) -> bool {
        self.index.contains_key(station)
    }

    /// Look up a station by position.
    pub fn get(&self, order_index: usize) -> Option<Station> {
        self.stations.get(order_index).map(|id| Station {
            id: id.clone(),
            order_index,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &StationId> {
        self.stations.iter()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Sort a subset of stations into route order.
    ///
    /// Stations not in the sequence are dropped.
    pub fn ordered<'a>(&self, subset: impl IntoIterator<Item = &'a StationId>) -> Vec<StationId> {
        let mut known: Vec<(usize, &StationId)> = subset
            .into_iter()
            .filter_map(|s| self.order_index(s).map(|i| (i, s)))
            .collect();
        known.sort_by_key(|(i, _)| *i);
        known.dedup_by_key(|(i, _)| *i);
        known.into_iter().map(|(_, s)| s.clone()).collect()
    }
}

impl TryFrom<Vec<StationId>> for StationSequence {
    type Error = DomainError;

    fn try_from(value: Vec<StationId>) -> Result<Self, Self::Error> {
        StationSequence::new(value)
    }
}

impl From<StationSequence> for Vec<StationId> {
    fn from(value: StationSequence) -> Self {
        value.stations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> StationId {
        StationId::parse(s).unwrap()
    }

    fn sequence(names: &[&str]) -> StationSequence {
        StationSequence::new(names.iter().map(|n| id(n)).collect()).unwrap()
    }

    #[test]
    fn reject_invalid_ids() {
        assert!(StationId::parse("").is_err());
        assert!(StationId::parse("a ").is_err());
        assert!(StationId::parse("a/b").is_err());
        assert!(StationId::parse("alarka jct").is_ok());
    }

    #[test]
    fn display_and_debug() {
        let s = id("sylva");
        assert_eq!(format!("{}", s), "sylva");
        assert_eq!(format!("{:?}", s), "StationId(sylva)");
    }

    #[test]
    fn order_index_lookup() {
        let seq = sequence(&["a", "b", "c"]);
        assert_eq!(seq.order_index(&id("a")), Some(0));
        assert_eq!(seq.order_index(&id("c")), Some(2));
        assert_eq!(seq.order_index(&id("z")), None);
        assert_eq!(seq.get(1).map(|s| s.id), Some(id("b")));
        assert_eq!(seq.len(), 3);
    }

    #[test]
    fn duplicates_rejected() {
        let err = StationSequence::new(vec![id("a"), id("b"), id("a")]).unwrap_err();
        assert_eq!(err, DomainError::DuplicateStation(id("a")));
    }

    #[test]
    fn ordered_sorts_and_drops_unknown() {
        let seq = sequence(&["a", "b", "c", "d"]);
        let subset = [id("d"), id("zz"), id("b"), id("a")];
        assert_eq!(seq.ordered(subset.iter()), vec![id("a"), id("b"), id("d")]);
    }

    #[test]
    fn serde_uses_plain_list() {
        let seq = sequence(&["a", "b"]);
        let json = serde_json::to_string(&seq).unwrap();
        assert_eq!(json, r#"["a","b"]"#);

        let back: StationSequence = serde_json::from_str(&json).unwrap();
        assert_eq!(back, seq);

        assert!(serde_json::from_str::<StationSequence>(r#"["a","a"]"#).is_err());
        assert!(serde_json::from_str::<StationSequence>(r#"[""]"#).is_err());
    }
}
