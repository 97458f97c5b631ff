//! Station dispatch engine for a single scenic railway line.
//!
//! On every station arrival the engine decides whether a train holds or
//! departs, keeps each passenger car's destinations in step with the route,
//! turns trains at their termini and moves passengers through transfer
//! stations.

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod route;
pub mod scenario;
pub mod sim;
pub mod store;
pub mod train;
pub mod transfer;
