//! Dock actors.
//!
//! The security gate is an acton-reactive actor; forklifts and trailers are
//! tokio tasks that work the shared semaphores directly.
//!
//! ```text
//! Orchestrator
//!   ├─ SecurityGate (1 acton actor, stopped by the ShutdownGate message)
//!   ├─ Forklift (N, stop themselves after the idle timeout)
//!   └─ TrailerUnit (T, one per arrival)
//!        ├─ ClearanceTicket → liaison → CheckRequest → SecurityGate → Clearance
//!        ├─ ContainerBacklog::report
//!        ├─ LoadingBayPool::acquire ... unload ... ContainerBacklog::publish
//!        └─ BaySlot::release
//! ```
//!
//! Actors share nothing but `Arc<DockState>` and the gate's actor handle.

mod forklift;
mod security_gate;
mod trailer;

pub use forklift::{Forklift, ForkliftExit, ForkliftSummary};
pub use security_gate::{
    CheckRefused, CheckRequest, Clearance, ClearanceTicket, GateExit, GateState, GateSummary,
    SecurityGate, SecurityGateHandle, SecurityGateState, ShutdownGate,
};
pub use trailer::{TrailerOutcome, TrailerPhase, TrailerUnit};
