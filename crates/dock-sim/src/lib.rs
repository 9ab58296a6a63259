//! Dock Simulation: runs the warehouse loading dock end to end.
//!
//! This crate drives the `dock-kernel` actors:
//! - Starts the security gate and the forklift pool
//! - Spawns trailers at randomized intervals
//! - Joins every actor and reports the run's aggregates

pub mod results;
pub mod simulation;

pub use results::{ActorCounts, RunReport};
pub use simulation::SimulationRunner;
