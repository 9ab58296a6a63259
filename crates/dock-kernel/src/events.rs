//! Event vocabulary for the dock.
//!
//! Every state change an actor goes through is a [`DockEvent`]. Events are
//! logged through `tracing` with their [`Category`] as the target, and can be
//! forwarded to an observer channel for inspection after a run.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Sequence number of a trailer, 1-based.
pub type TrailerId = u32;

/// Sequence number of a forklift, 1-based.
pub type ForkliftId = u32;

/// Which actor family an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Trailer,
    Security,
    Forklift,
    Join,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DockEvent {
    TrailerArrived { trailer: TrailerId },
    TrailerUnderCheck { trailer: TrailerId },
    TrailerAwaitingBay { trailer: TrailerId },
    ContainersReported { trailer: TrailerId, remaining: u32 },
    BayAcquired { trailer: TrailerId, occupied: usize, remaining: u32 },
    TrailerUnloaded { trailer: TrailerId, published: u32 },
    TrailerDeparted { trailer: TrailerId },

    SecurityStandby,
    SecurityChecking { trailer: TrailerId },
    SecurityReleased { trailer: TrailerId },
    SecurityExit,

    ForkliftWaiting { forklift: ForkliftId },
    ForkliftMoving { forklift: ForkliftId },
    ForkliftRemaining { forklift: ForkliftId, remaining: u32 },
    ForkliftIdleExit { forklift: ForkliftId },

    TotalTrailers { count: u32 },
    AllTrailersJoined,
    SecurityJoined,
    AllForkliftsJoined,
    ProgramTerminates,
}

impl DockEvent {
    pub fn category(&self) -> Category {
        use DockEvent::*;
        match self {
            TrailerArrived { .. }
            | TrailerUnderCheck { .. }
            | TrailerAwaitingBay { .. }
            | ContainersReported { .. }
            | BayAcquired { .. }
            | TrailerUnloaded { .. }
            | TrailerDeparted { .. } => Category::Trailer,
            SecurityStandby
            | SecurityChecking { .. }
            | SecurityReleased { .. }
            | SecurityExit => Category::Security,
            ForkliftWaiting { .. }
            | ForkliftMoving { .. }
            | ForkliftRemaining { .. }
            | ForkliftIdleExit { .. } => Category::Forklift,
            TotalTrailers { .. }
            | AllTrailersJoined
            | SecurityJoined
            | AllForkliftsJoined
            | ProgramTerminates => Category::Join,
        }
    }

    /// The trailer this event concerns, if any.
    pub fn trailer(&self) -> Option<TrailerId> {
        use DockEvent::*;
        match self {
            TrailerArrived { trailer }
            | TrailerUnderCheck { trailer }
            | TrailerAwaitingBay { trailer }
            | ContainersReported { trailer, .. }
            | BayAcquired { trailer, .. }
            | TrailerUnloaded { trailer, .. }
            | TrailerDeparted { trailer }
            | SecurityChecking { trailer }
            | SecurityReleased { trailer } => Some(*trailer),
            _ => None,
        }
    }
}

impl fmt::Display for DockEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use DockEvent::*;
        match self {
            TrailerArrived { trailer } => write!(f, "Trailer-{}: Arrived.", trailer),
            TrailerUnderCheck { trailer } => write!(f, "Trailer-{}: Under checking...", trailer),
            TrailerAwaitingBay { trailer } => {
                write!(f, "Trailer-{}: Waiting for loading bay...", trailer)
            }
            ContainersReported { trailer, remaining } => {
                write!(f, "Trailer-{}: Reported containers, backlog = {}", trailer, remaining)
            }
            BayAcquired {
                trailer,
                occupied,
                remaining,
            } => write!(
                f,
                "Trailer-{}: Total containers = {} (bays occupied: {})",
                trailer, remaining, occupied
            ),
            TrailerUnloaded { trailer, published } => write!(
                f,
                "Trailer-{}: Unloaded {} containers. Leaving...",
                trailer, published
            ),
            TrailerDeparted { trailer } => write!(f, "Trailer-{}: Departed.", trailer),

            SecurityStandby => write!(f, "Security: Standby"),
            SecurityChecking { trailer } => write!(f, "Security: Checking trailer-{}", trailer),
            SecurityReleased { trailer } => {
                write!(f, "Security: Checked & Released trailer-{}", trailer)
            }
            SecurityExit => write!(f, "Security: Exit"),

            ForkliftWaiting { forklift } => {
                write!(f, "Forklift-{}: Waiting for containers", forklift)
            }
            ForkliftMoving { forklift } => write!(f, "Forklift-{}: Moving a container", forklift),
            ForkliftRemaining {
                forklift,
                remaining,
            } => write!(f, "Forklift-{}: Remaining = {}", forklift, remaining),
            ForkliftIdleExit { forklift } => write!(f, "Forklift-{}: Time out. Exit", forklift),

            TotalTrailers { count } => write!(f, "Total number of trailers: {}", count),
            AllTrailersJoined => write!(f, "All trailers joined"),
            SecurityJoined => write!(f, "Security joined"),
            AllForkliftsJoined => write!(f, "All forklifts joined"),
            ProgramTerminates => write!(f, "Program terminates."),
        }
    }
}

/// Destination for dock events: the log, plus an optional observer channel.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    observer: Option<mpsc::UnboundedSender<DockEvent>>,
}

impl EventSink {
    /// A sink that only logs.
    pub fn log_only() -> Self {
        Self::default()
    }

    /// A sink that logs and forwards each event to `observer`.
    pub fn with_observer(observer: mpsc::UnboundedSender<DockEvent>) -> Self {
        Self {
            observer: Some(observer),
        }
    }

    pub fn emit(&self, event: DockEvent) {
        match event.category() {
            Category::Trailer => tracing::info!(target: "trailer", "{}", event),
            Category::Security => tracing::info!(target: "security", "{}", event),
            Category::Forklift => tracing::info!(target: "forklift", "{}", event),
            Category::Join => tracing::info!(target: "join", "{}", event),
        }
        if let Some(tx) = &self.observer {
            // Ignore send errors - observer may have been dropped
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_follow_dock_log_wording() {
        assert_eq!(
            DockEvent::TrailerArrived { trailer: 3 }.to_string(),
            "Trailer-3: Arrived."
        );
        assert_eq!(
            DockEvent::ForkliftRemaining {
                forklift: 1,
                remaining: 4
            }
            .to_string(),
            "Forklift-1: Remaining = 4"
        );
        assert_eq!(DockEvent::AllTrailersJoined.to_string(), "All trailers joined");
    }

    #[test]
    fn test_categories() {
        assert_eq!(DockEvent::SecurityStandby.category(), Category::Security);
        assert_eq!(
            DockEvent::ForkliftIdleExit { forklift: 2 }.category(),
            Category::Forklift
        );
        assert_eq!(
            DockEvent::SecurityChecking { trailer: 5 }.trailer(),
            Some(5)
        );
        assert_eq!(DockEvent::ProgramTerminates.category(), Category::Join);
    }

    #[test]
    fn test_observer_receives_events_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::with_observer(tx);
        sink.emit(DockEvent::SecurityStandby);
        sink.emit(DockEvent::SecurityExit);
        assert_eq!(rx.try_recv().ok(), Some(DockEvent::SecurityStandby));
        assert_eq!(rx.try_recv().ok(), Some(DockEvent::SecurityExit));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_observer_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        EventSink::with_observer(tx).emit(DockEvent::AllForkliftsJoined);
    }
}
