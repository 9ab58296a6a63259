//! Run report for a dock simulation.
//!
//! Captures the aggregates that must hold for every run:
//! - Claim tokens published (exactly containers_per_trailer × trailers)
//! - Peak bay occupancy and peak concurrent inspections
//! - Remaining backlog at the end
//! - How each forklift stopped

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dock_kernel::{DockConfig, ForkliftExit, ForkliftSummary};

/// Number of actors of each kind the orchestrator started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorCounts {
    pub security: usize,
    pub forklifts: usize,
    pub trailers: usize,
}

/// Results from a single simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Seed the delay sampler was built from
    pub seed: u64,
    pub trailers: u32,
    pub config: DockConfig,
    pub actors: ActorCounts,
    /// Containers added to the remaining counter by trailers
    pub containers_reported: u64,
    /// Claim tokens made available to forklifts
    pub containers_published: u64,
    /// Claim tokens taken by forklifts
    pub containers_claimed: u64,
    /// Remaining counter when the run ended
    pub containers_remaining: u32,
    pub peak_bay_occupancy: usize,
    pub peak_concurrent_checks: usize,
    pub checks_completed: u32,
    pub forklifts: Vec<ForkliftSummary>,
}

impl RunReport {
    /// Tokens a complete run must publish.
    pub fn expected_containers(&self) -> u64 {
        u64::from(self.trailers) * u64::from(self.config.containers_per_trailer)
    }

    /// Containers moved by all forklifts together.
    pub fn containers_moved(&self) -> u64 {
        self.forklifts.iter().map(|f| u64::from(f.moved)).sum()
    }

    /// List every aggregate invariant this run violated.
    pub fn violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let expected = self.expected_containers();

        if self.containers_published != expected {
            violations.push(format!(
                "published {} claim tokens, expected {}",
                self.containers_published, expected
            ));
        }
        if self.containers_reported != self.containers_published {
            violations.push(format!(
                "reported {} containers but published {}",
                self.containers_reported, self.containers_published
            ));
        }
        if self.peak_bay_occupancy > self.config.loading_bays {
            violations.push(format!(
                "{} bays occupied at once, capacity is {}",
                self.peak_bay_occupancy, self.config.loading_bays
            ));
        }
        if self.peak_concurrent_checks > 1 {
            violations.push(format!(
                "{} trailers inspected at once",
                self.peak_concurrent_checks
            ));
        }
        if self.containers_claimed + u64::from(self.containers_remaining) != self.containers_reported {
            violations.push(format!(
                "claimed {} + remaining {} does not match reported {}",
                self.containers_claimed, self.containers_remaining, self.containers_reported
            ));
        }
        if self.actors.trailers != self.trailers as usize
            || self.actors.forklifts != self.config.forklifts
            || self.actors.security != 1
        {
            violations.push(format!(
                "started {} security, {} forklifts, {} trailers",
                self.actors.security, self.actors.forklifts, self.actors.trailers
            ));
        }
        if self.checks_completed != self.trailers {
            violations.push(format!(
                "{} inspections for {} trailers",
                self.checks_completed, self.trailers
            ));
        }
        violations
    }

    pub fn invariants_hold(&self) -> bool {
        self.violations().is_empty()
    }

    /// Print a human-readable summary.
    pub fn print_summary(&self) {
        println!("\n=== Dock Run Summary ===");
        println!("Run: {}", self.run_id);
        println!("Seed: {}", self.seed);
        println!(
            "Actors: {} security, {} forklifts, {} trailers",
            self.actors.security, self.actors.forklifts, self.actors.trailers
        );
        println!(
            "Containers: {} published, {} moved, {} remaining",
            self.containers_published,
            self.containers_moved(),
            self.containers_remaining
        );
        println!(
            "Peaks: {} bays occupied, {} concurrent inspections",
            self.peak_bay_occupancy, self.peak_concurrent_checks
        );
        for forklift in &self.forklifts {
            let exit = match forklift.exit {
                ForkliftExit::IdleTimeout => "idle timeout",
                ForkliftExit::Fault => "fault",
            };
            println!(
                "  Forklift-{}: moved {} ({})",
                forklift.forklift, forklift.moved, exit
            );
        }
        let violations = self.violations();
        if !violations.is_empty() {
            println!("Invariant violations:");
            for v in &violations {
                println!("  {}", v);
            }
        }
    }
}
