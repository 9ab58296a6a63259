//! Configuration types for the dock.
//!
//! All durations are expressed in integer time units; `time_unit_ms` maps a
//! unit to wall-clock (or virtual) time.

use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

/// Fewest trailers a run accepts.
pub const MIN_TRAILERS: u32 = 3;

/// Most trailers a run accepts.
pub const MAX_TRAILERS: u32 = 10;

/// Inclusive range of time units a randomized delay is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min: u64,
    pub max: u64,
}

impl DelayRange {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }
}

/// Top-level dock configuration.
///
/// Defines the timing of every actor and the size of each resource pool.
/// Loaded from JSON at runtime, or taken from `Default`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockConfig {
    /// Length of one time unit in milliseconds
    pub time_unit_ms: u64,

    /// Spacing between consecutive trailer arrivals
    pub arrival: DelayRange,

    /// Duration of one security inspection
    pub security_check: DelayRange,

    /// Time a trailer holds its bay while unloading
    pub unload: DelayRange,

    /// Time a forklift spends moving one container
    pub forklift_move_units: u64,

    /// Inactivity after which a forklift exits
    pub forklift_idle_timeout_units: u64,

    /// Bounded wait for a single backlog claim
    pub forklift_claim_wait_units: u64,

    /// Number of loading bay slots
    pub loading_bays: usize,

    /// Number of forklift workers
    pub forklifts: usize,

    /// Containers unloaded from each trailer
    pub containers_per_trailer: u32,
}

impl Default for DockConfig {
    fn default() -> Self {
        Self {
            time_unit_ms: 1_000,
            arrival: DelayRange::new(3, 4),
            security_check: DelayRange::new(2, 3),
            unload: DelayRange::new(2, 4),
            forklift_move_units: 3,
            forklift_idle_timeout_units: 10,
            forklift_claim_wait_units: 1,
            loading_bays: 2,
            forklifts: 2,
            containers_per_trailer: 2,
        }
    }
}

impl DockConfig {
    /// Length of one time unit.
    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }

    /// Convert a count of time units into a duration.
    pub fn units(&self, units: u64) -> Duration {
        self.time_unit().saturating_mul(units.min(u64::from(u32::MAX)) as u32)
    }

    pub fn forklift_idle_timeout(&self) -> Duration {
        self.units(self.forklift_idle_timeout_units)
    }

    pub fn forklift_claim_wait(&self) -> Duration {
        self.units(self.forklift_claim_wait_units)
    }

    pub fn forklift_move(&self) -> Duration {
        self.units(self.forklift_move_units)
    }

    /// Check that every pool and delay can actually be built.
    pub fn validate(&self) -> Result<()> {
        if self.time_unit_ms == 0 {
            bail!("time unit must be at least 1 ms");
        }
        if self.loading_bays == 0 {
            bail!("at least one loading bay is required");
        }
        if self.loading_bays > Semaphore::MAX_PERMITS {
            bail!(
                "loading_bays {} exceeds the maximum of {}",
                self.loading_bays,
                Semaphore::MAX_PERMITS
            );
        }
        if self.forklifts == 0 {
            bail!("at least one forklift is required");
        }
        if self.containers_per_trailer == 0 {
            bail!("each trailer must carry at least one container");
        }
        if self.forklift_claim_wait_units == 0 {
            bail!("forklift claim wait must be at least one time unit");
        }
        for (name, range) in [
            ("arrival", self.arrival),
            ("security_check", self.security_check),
            ("unload", self.unload),
        ] {
            if range.min > range.max {
                bail!(
                    "{} delay range is inverted: min {} > max {}",
                    name,
                    range.min,
                    range.max
                );
            }
        }
        Ok(())
    }
}

/// Validate a requested trailer count against `[MIN_TRAILERS, MAX_TRAILERS]`.
pub fn validate_trailer_count(requested: i64) -> Result<u32> {
    match u32::try_from(requested) {
        Ok(count) if (MIN_TRAILERS..=MAX_TRAILERS).contains(&count) => Ok(count),
        _ => bail!(
            "Number of trailers must be between {} and {}",
            MIN_TRAILERS,
            MAX_TRAILERS
        ),
    }
}
