//! Forklift: long-lived worker draining the container backlog.
//!
//! A forklift has no stop signal. It keeps claiming containers with a
//! bounded wait and exits on its own once `forklift_idle_timeout_units`
//! pass without a successful claim. Leftover backlog is therefore always
//! drained before the forklifts go home.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::events::{DockEvent, ForkliftId};
use crate::state::DockState;

/// Why a forklift stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForkliftExit {
    /// Idle for the full timeout
    IdleTimeout,
    /// The claim signal failed; this worker stops, the rest carry on
    Fault,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkliftSummary {
    pub forklift: ForkliftId,
    pub moved: u32,
    pub exit: ForkliftExit,
}

pub struct Forklift {
    id: ForkliftId,
    state: Arc<DockState>,
}

impl Forklift {
    pub fn new(id: ForkliftId, state: Arc<DockState>) -> Self {
        Self { id, state }
    }

    /// Run until the idle timeout elapses or the claim signal fails.
    pub async fn run(self) -> ForkliftSummary {
        let id = self.id;
        let state = self.state;
        let idle_timeout = state.config().forklift_idle_timeout();
        let claim_wait = state.config().forklift_claim_wait();
        let move_time = state.config().forklift_move();

        let mut moved = 0;
        let mut last_activity = Instant::now();
        state.emit(DockEvent::ForkliftWaiting { forklift: id });

        let exit = loop {
            if last_activity.elapsed() >= idle_timeout {
                state.emit(DockEvent::ForkliftIdleExit { forklift: id });
                break ForkliftExit::IdleTimeout;
            }

            let remaining = match state.backlog().claim_within(claim_wait).await {
                Ok(Some(remaining)) => remaining,
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!(target: "forklift", forklift = id, error = %e, "Claim failed");
                    break ForkliftExit::Fault;
                }
            };

            state.emit(DockEvent::ForkliftMoving { forklift: id });
            state.emit(DockEvent::ForkliftRemaining {
                forklift: id,
                remaining,
            });
            tokio::time::sleep(move_time).await;
            moved += 1;
            last_activity = Instant::now();
        };

        ForkliftSummary {
            forklift: id,
            moved,
            exit,
        }
    }
}
