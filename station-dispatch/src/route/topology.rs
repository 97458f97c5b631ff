//! Branch junctions on the line.
//!
//! The route sequence is linear, but a branch hangs off the main line at a
//! junction and its stations are numbered inline, just after the junction.
//! A train heading west may therefore visit the branch and come back out, or
//! skip it entirely. These rules are data: adding a branch is a table entry,
//! not new logic in the resolver or the planner.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, StationId, StationSequence};

/// One branch hanging off the main line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRule {
    /// Main-line station where the branch diverges.
    pub junction: StationId,
    /// Branch stations ordered outward from the junction. The first one is
    /// adjacent to the junction.
    pub branch: Vec<StationId>,
    /// Branch station where trains reverse to head back out, if any.
    #[serde(default)]
    pub pivot: Option<StationId>,
}

impl BranchRule {
    /// Whether travel between these two stations reveals nothing about the
    /// direction of travel.
    pub fn is_ambiguous_pair(&self, a: &StationId, b: &StationId) -> bool {
        match self.branch.first() {
            Some(first) => {
                (a == &self.junction && b == first) || (a == first && b == &self.junction)
            }
            None => false,
        }
    }

    pub fn contains(&self, station: &StationId) -> bool {
        self.branch.contains(station)
    }

    /// Depth of a station inside the branch; the first branch station is 0.
    pub fn depth(&self, station: &StationId) -> Option<usize> {
        self.branch.iter().position(|s| s == station)
    }

    /// Branch stations strictly deeper than `depth`.
    pub fn deeper_than(&self, depth: Option<usize>) -> impl Iterator<Item = &StationId> {
        let skip = depth.map_or(0, |d| d + 1);
        self.branch.iter().skip(skip)
    }
}

/// The set of branch rules for the line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topology {
    rules: Vec<BranchRule>,
}

impl Topology {
    /// A plain linear line with no branches.
    pub fn linear() -> Self {
        Self::default()
    }

    pub fn new(rules: Vec<BranchRule>) -> Self {
        Self { rules }
    }

    /// Check every rule refers to known stations and that the branch stations
    /// directly follow their junction in the route sequence.
    pub fn check_against(&self, stations: &StationSequence) -> Result<(), DomainError> {
        for rule in &self.rules {
            let junction = stations
                .order_index(&rule.junction)
                .ok_or_else(|| DomainError::UnknownStation(rule.junction.clone()))?;
            for (depth, station) in rule.branch.iter().enumerate() {
                let index = stations
                    .order_index(station)
                    .ok_or_else(|| DomainError::UnknownStation(station.clone()))?;
                if index != junction + depth + 1 {
                    return Err(DomainError::BranchOutOfOrder(station.clone()));
                }
            }
            if let Some(pivot) = &rule.pivot
                && !rule.contains(pivot)
            {
                return Err(DomainError::UnknownStation(pivot.clone()));
            }
        }
        Ok(())
    }

    /// The rule whose ambiguous pair matches a move from `a` to `b`.
    pub fn ambiguous_between(&self, a: &StationId, b: &StationId) -> Option<&BranchRule> {
        self.rules.iter().find(|r| r.is_ambiguous_pair(a, b))
    }

    /// The rule for which `station` is the junction.
    pub fn junction_at(&self, station: &StationId) -> Option<&BranchRule> {
        self.rules.iter().find(|r| &r.junction == station)
    }

    /// The rule for which `station` is the junction or a branch station.
    pub fn rule_touching(&self, station: &StationId) -> Option<&BranchRule> {
        self.rules
            .iter()
            .find(|r| &r.junction == station || r.contains(station))
    }

    /// The rule whose pivot is `station`.
    pub fn pivot_at(&self, station: &StationId) -> Option<&BranchRule> {
        self.rules
            .iter()
            .find(|r| r.pivot.as_ref() == Some(station))
    }

    /// All branch stations of the junction at `station` that are also in `set`.
    pub fn branch_members_in<'a>(
        &'a self,
        station: &StationId,
        set: &'a BTreeSet<StationId>,
    ) -> impl Iterator<Item = &'a StationId> {
        self.junction_at(station)
            .into_iter()
            .flat_map(|r| r.branch.iter())
            .filter(move |s| set.contains(*s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> StationId {
        StationId::parse(s).unwrap()
    }

    fn rule() -> BranchRule {
        BranchRule {
            junction: id("junction"),
            branch: vec![id("spur"), id("stub")],
            pivot: Some(id("stub")),
        }
    }

    #[test]
    fn ambiguous_pair_is_symmetric() {
        let r = rule();
        assert!(r.is_ambiguous_pair(&id("junction"), &id("spur")));
        assert!(r.is_ambiguous_pair(&id("spur"), &id("junction")));
        assert!(!r.is_ambiguous_pair(&id("spur"), &id("stub")));
    }

    #[test]
    fn depth_and_deeper() {
        let r = rule();
        assert_eq!(r.depth(&id("spur")), Some(0));
        assert_eq!(r.depth(&id("junction")), None);
        let deeper: Vec<_> = r.deeper_than(Some(0)).cloned().collect();
        assert_eq!(deeper, vec![id("stub")]);
        let all: Vec<_> = r.deeper_than(None).cloned().collect();
        assert_eq!(all, vec![id("spur"), id("stub")]);
    }

    #[test]
    fn lookups() {
        let topo = Topology::new(vec![rule()]);
        assert!(topo.junction_at(&id("junction")).is_some());
        assert!(topo.junction_at(&id("spur")).is_none());
        assert!(topo.rule_touching(&id("stub")).is_some());
        assert!(topo.pivot_at(&id("stub")).is_some());
        assert!(topo.ambiguous_between(&id("spur"), &id("junction")).is_some());
        assert!(Topology::linear().junction_at(&id("junction")).is_none());
    }

    #[test]
    fn check_against_requires_inline_branch() {
        let topo = Topology::new(vec![rule()]);
        let good = StationSequence::new(
            ["east", "junction", "spur", "stub", "west"]
                .iter()
                .map(|s| id(s))
                .collect(),
        )
        .unwrap();
        assert_eq!(topo.check_against(&good), Ok(()));

        let bad = StationSequence::new(
            ["junction", "east", "spur", "stub"]
                .iter()
                .map(|s| id(s))
                .collect(),
        )
        .unwrap();
        assert_eq!(
            topo.check_against(&bad),
            Err(DomainError::BranchOutOfOrder(id("spur")))
        );
    }

    #[test]
    fn deserialize_from_list() {
        let json = r#"[{"junction":"junction","branch":["spur","stub"],"pivot":"stub"}]"#;
        let topo: Topology = serde_json::from_str(json).unwrap();
        assert_eq!(topo, Topology::new(vec![rule()]));
    }
}
