//! TrailerUnit: one short-lived actor per arriving trailer.
//!
//! Drives a single trailer through
//! arrival → security clearance → bay acquisition → unload →
//! backlog publication → bay release.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::actors::security_gate::ClearanceTicket;
use crate::events::{DockEvent, TrailerId};
use crate::state::DockState;

/// Lifecycle phase of a trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrailerPhase {
    Arrived,
    AwaitingSecurity,
    Cleared,
    AwaitingBay,
    Unloading,
    Departed,
}

/// What a trailer did, returned when its actor finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailerOutcome {
    pub trailer: TrailerId,
    pub containers_published: u32,
    pub unload_time: Duration,
    pub phase: TrailerPhase,
}

pub struct TrailerUnit {
    id: TrailerId,
    state: Arc<DockState>,
    ticket: ClearanceTicket,
    phase: TrailerPhase,
}

impl TrailerUnit {
    /// `ticket` must have been issued for `id`.
    pub fn new(id: TrailerId, state: Arc<DockState>, ticket: ClearanceTicket) -> Self {
        debug_assert_eq!(ticket.trailer(), id);
        Self {
            id,
            state,
            ticket,
            phase: TrailerPhase::Arrived,
        }
    }

    pub fn id(&self) -> TrailerId {
        self.id
    }

    fn enter(&mut self, phase: TrailerPhase) {
        tracing::debug!(target: "trailer", trailer = self.id, from = ?self.phase, to = ?phase, "Phase change");
        self.phase = phase;
    }

    /// Run the trailer to departure.
    pub async fn run(mut self) -> Result<TrailerOutcome> {
        let id = self.id;
        let state = self.state.clone();
        let containers = state.config().containers_per_trailer;

        state.emit(DockEvent::TrailerArrived { trailer: id });

        self.enter(TrailerPhase::AwaitingSecurity);
        state.emit(DockEvent::TrailerUnderCheck { trailer: id });
        let clearance = self.ticket.request_check().await?;
        debug_assert_eq!(clearance.trailer, id);
        self.enter(TrailerPhase::Cleared);

        // Reported now, claimable only after unloading.
        let remaining = state.backlog().report(containers);
        state.emit(DockEvent::ContainersReported {
            trailer: id,
            remaining,
        });

        self.enter(TrailerPhase::AwaitingBay);
        state.emit(DockEvent::TrailerAwaitingBay { trailer: id });
        let slot = state.bays().acquire().await?;

        self.enter(TrailerPhase::Unloading);
        state.emit(DockEvent::BayAcquired {
            trailer: id,
            occupied: slot.occupied_at_entry(),
            remaining: state.backlog().remaining(),
        });
        let unload_time = state.sampler().sample(state.config().unload);
        tokio::time::sleep(unload_time).await;

        state.backlog().publish(containers);
        state.emit(DockEvent::TrailerUnloaded {
            trailer: id,
            published: containers,
        });
        slot.release();

        self.enter(TrailerPhase::Departed);
        state.emit(DockEvent::TrailerDeparted { trailer: id });

        Ok(TrailerOutcome {
            trailer: id,
            containers_published: containers,
            unload_time,
            phase: self.phase,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::security_gate::SecurityGate;
    use crate::config::DockConfig;
    use crate::events::EventSink;
    use acton_reactive::prelude::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_trailer_walks_every_phase_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let state = DockState::new(DockConfig::default(), 3, EventSink::with_observer(tx)).unwrap();
        let mut runtime = ActonApp::launch_async().await;
        let (gate, exit) = SecurityGate::spawn(&mut runtime, state.clone()).await;

        let ticket = gate.issue_ticket(&mut runtime, 1).await;
        let outcome = TrailerUnit::new(1, state.clone(), ticket)
            .run()
            .await
            .unwrap();
        assert_eq!(outcome.phase, TrailerPhase::Departed);
        assert_eq!(outcome.containers_published, 2);
        assert!(outcome.unload_time >= Duration::from_secs(2));
        assert!(outcome.unload_time <= Duration::from_secs(4));

        gate.shutdown().await;
        exit.wait().await.unwrap();
        runtime.shutdown_all().await.unwrap();

        let trailer_events: Vec<DockEvent> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| e.trailer() == Some(1))
            .collect();
        assert_eq!(
            trailer_events,
            vec![
                DockEvent::TrailerArrived { trailer: 1 },
                DockEvent::TrailerUnderCheck { trailer: 1 },
                DockEvent::SecurityChecking { trailer: 1 },
                DockEvent::SecurityReleased { trailer: 1 },
                DockEvent::ContainersReported {
                    trailer: 1,
                    remaining: 2
                },
                DockEvent::TrailerAwaitingBay { trailer: 1 },
                DockEvent::BayAcquired {
                    trailer: 1,
                    occupied: 1,
                    remaining: 2
                },
                DockEvent::TrailerUnloaded {
                    trailer: 1,
                    published: 2
                },
                DockEvent::TrailerDeparted { trailer: 1 },
            ]
        );

        assert_eq!(state.backlog().published(), 2);
        assert_eq!(state.backlog().available(), 2);
        assert_eq!(state.bays().occupied(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bays_bound_many_trailers() {
        let state = DockState::new(DockConfig::default(), 8, EventSink::log_only()).unwrap();
        let mut runtime = ActonApp::launch_async().await;
        let (gate, exit) = SecurityGate::spawn(&mut runtime, state.clone()).await;

        let mut trailers = tokio::task::JoinSet::new();
        for id in 1..=6 {
            let ticket = gate.issue_ticket(&mut runtime, id).await;
            trailers.spawn(TrailerUnit::new(id, state.clone(), ticket).run());
        }
        while let Some(result) = trailers.join_next().await {
            result.unwrap().unwrap();
        }
        gate.shutdown().await;
        let summary = exit.wait().await.unwrap();
        runtime.shutdown_all().await.unwrap();

        assert_eq!(summary.checks_completed, 6);
        assert_eq!(summary.peak_concurrent_checks, 1);
        assert!(state.bays().peak() <= 2);
        assert_eq!(state.backlog().published(), 12);
        assert_eq!(state.backlog().remaining(), 12);
    }

    #[tokio::test]
    async fn test_trailer_fails_when_gate_is_gone() {
        let state = DockState::new(DockConfig::default(), 1, EventSink::log_only()).unwrap();
        let mut runtime = ActonApp::launch_async().await;
        let (gate, exit) = SecurityGate::spawn(&mut runtime, state.clone()).await;
        gate.shutdown().await;
        exit.wait().await.unwrap();

        let ticket = gate.issue_ticket(&mut runtime, 7).await;
        let result = TrailerUnit::new(7, state.clone(), ticket).run().await;
        assert!(result.is_err());
        assert_eq!(state.backlog().reported(), 0);

        runtime.shutdown_all().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_trailer_fails_when_bays_are_closed() {
        let state = DockState::new(DockConfig::default(), 2, EventSink::log_only()).unwrap();
        let mut runtime = ActonApp::launch_async().await;
        let (gate, exit) = SecurityGate::spawn(&mut runtime, state.clone()).await;
        state.bays().close();

        let ticket = gate.issue_ticket(&mut runtime, 1).await;
        let err = TrailerUnit::new(1, state.clone(), ticket)
            .run()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("loading bay pool closed"));
        // Cleared and reported, but never published.
        assert_eq!(state.backlog().reported(), 2);
        assert_eq!(state.backlog().published(), 0);

        gate.shutdown().await;
        exit.wait().await.unwrap();
        runtime.shutdown_all().await.unwrap();
    }
}
