//! Dock Kernel: actors and shared resources for a warehouse loading dock.
//!
//! Trailers pass a single-capacity security gate, compete for a bounded pool
//! of loading bays, and publish their containers to a backlog that a small
//! pool of forklifts drains until they go idle.

pub mod actors;
pub mod backlog;
pub mod bays;
pub mod config;
pub mod events;
pub mod state;
pub mod timing;

pub use actors::{
    Forklift, ForkliftExit, ForkliftSummary, SecurityGate, SecurityGateHandle, TrailerUnit,
};
pub use backlog::ContainerBacklog;
pub use bays::{BaySlot, LoadingBayPool};
pub use config::{validate_trailer_count, DelayRange, DockConfig, MAX_TRAILERS, MIN_TRAILERS};
pub use events::{Category, DockEvent, EventSink, ForkliftId, TrailerId};
pub use state::DockState;
pub use timing::DelaySampler;
