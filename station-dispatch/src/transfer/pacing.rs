//! Randomized delay between passenger moves.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::DispatchConfig;

/// Draws a delay of between `min_units` and `max_units` pacing units.
#[derive(Debug, Clone)]
pub struct Pacer {
    unit: Duration,
    min_units: f64,
    max_units: f64,
    rng: StdRng,
}

impl Pacer {
    pub fn new(unit: Duration, min_units: f64, max_units: f64) -> Self {
        Self::with_rng(unit, min_units, max_units, StdRng::from_entropy())
    }

    /// A pacer with a fixed seed, for reproducible replays.
    pub fn seeded(unit: Duration, min_units: f64, max_units: f64, seed: u64) -> Self {
        Self::with_rng(unit, min_units, max_units, StdRng::seed_from_u64(seed))
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(
            config.pacing_unit,
            config.min_pacing_units,
            config.max_pacing_units,
        )
    }

    fn with_rng(unit: Duration, min_units: f64, max_units: f64, rng: StdRng) -> Self {
        let min_units = min_units.max(0.0);
        Self {
            unit,
            min_units,
            max_units: max_units.max(min_units),
            rng,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let units = if self.max_units > self.min_units {
            self.rng.gen_range(self.min_units..=self.max_units)
        } else {
            self.min_units
        };
        self.unit.mul_f64(units)
    }
}
