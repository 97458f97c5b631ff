//! Route configuration and line topology.
//!
//! `RouteConfig` is owned by each train and edited by the operator;
//! `Topology` describes the branch junctions of the line and is shared.

mod config;
mod topology;

pub use config::{
    ConfigError, ConfigVersions, FuelGate, FuelGates, MIN_STOPS, RouteConfig, StationAction,
    TERMINUS_COUNT, Termini,
};
pub use topology::{BranchRule, Topology};
