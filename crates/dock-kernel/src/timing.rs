//! Randomized delays shared by every actor.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::config::DelayRange;

/// Uniform integer range generator backed by a seeded ChaCha8 stream.
///
/// Clones share one stream, so a whole run draws from a single seed.
#[derive(Clone)]
pub struct DelaySampler {
    rng: Arc<Mutex<ChaCha8Rng>>,
    seed: u64,
    time_unit: Duration,
}

impl std::fmt::Debug for DelaySampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelaySampler")
            .field("seed", &self.seed)
            .field("time_unit", &self.time_unit)
            .finish()
    }
}

impl DelaySampler {
    pub fn new(seed: u64, time_unit: Duration) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            seed,
            time_unit,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Draw a whole number of time units from `range`, both ends inclusive.
    pub fn random_range(&self, range: DelayRange) -> u64 {
        if range.min >= range.max {
            return range.min;
        }
        // A poisoned lock still holds a usable generator.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.random_range(range.min..=range.max)
    }

    /// Draw a delay from `range` and convert it to a duration.
    pub fn sample(&self, range: DelayRange) -> Duration {
        self.units(self.random_range(range))
    }

    pub fn units(&self, units: u64) -> Duration {
        self.time_unit
            .saturating_mul(units.min(u64::from(u32::MAX)) as u32)
    }
}
