//! End-to-end tests for the dock simulation.
//!
//! Runs on tokio's paused clock so every timed property is exact, plus one
//! real-clock multi-thread run with a short time unit.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;

use dock_kernel::{DockConfig, DockEvent, ForkliftExit, TrailerId};
use dock_sim::{RunReport, SimulationRunner};

/// Run a simulation and return its report plus every event it emitted.
async fn run_collecting(
    config: DockConfig,
    trailers: i64,
    seed: u64,
) -> (RunReport, Vec<DockEvent>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let report = SimulationRunner::new(config)
        .with_observer(tx)
        .run(trailers, Some(seed))
        .await
        .unwrap();
    let events = std::iter::from_fn(|| rx.try_recv().ok()).collect();
    (report, events)
}

#[tokio::test(start_paused = true)]
async fn test_three_trailers_end_to_end() {
    let (report, events) = run_collecting(DockConfig::default(), 3, 17).await;

    assert!(report.invariants_hold(), "{:?}", report.violations());
    assert_eq!(report.actors.security, 1);
    assert_eq!(report.actors.forklifts, 2);
    assert_eq!(report.actors.trailers, 3);
    assert_eq!(report.containers_published, 6);
    assert_eq!(report.containers_claimed, 6);
    assert_eq!(report.containers_remaining, 0);
    assert_eq!(report.containers_moved(), 6);
    assert!(report
        .forklifts
        .iter()
        .all(|f| f.exit == ForkliftExit::IdleTimeout));

    let arrivals = events
        .iter()
        .filter(|e| matches!(e, DockEvent::TrailerArrived { .. }))
        .count();
    assert_eq!(arrivals, 3);
    let idle_exits = events
        .iter()
        .filter(|e| matches!(e, DockEvent::ForkliftIdleExit { .. }))
        .count();
    assert_eq!(idle_exits, 2);
}

#[tokio::test(start_paused = true)]
async fn test_every_valid_count_publishes_two_per_trailer() {
    for trailers in 3..=10 {
        let (report, _) = run_collecting(DockConfig::default(), trailers, trailers as u64).await;
        assert!(
            report.invariants_hold(),
            "T={}: {:?}",
            trailers,
            report.violations()
        );
        assert_eq!(report.containers_published, 2 * trailers as u64);
        assert!(report.peak_bay_occupancy <= 2);
        assert_eq!(report.peak_concurrent_checks, 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_boundary_counts_rejected() {
    for trailers in [2, 11] {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = SimulationRunner::new(DockConfig::default())
            .with_observer(tx)
            .run(trailers, Some(1))
            .await;
        assert!(result.is_err(), "T={} must be rejected", trailers);
        assert!(rx.try_recv().is_err(), "T={} started actors", trailers);
    }
}

#[tokio::test(start_paused = true)]
async fn test_different_seeds_same_aggregates() {
    let (a, _) = run_collecting(DockConfig::default(), 6, 1).await;
    let (b, _) = run_collecting(DockConfig::default(), 6, 2).await;

    for report in [&a, &b] {
        assert!(report.invariants_hold(), "{:?}", report.violations());
        assert_eq!(report.containers_published, 12);
        assert_eq!(report.containers_remaining, 0);
        assert_eq!(report.checks_completed, 6);
    }
    assert_ne!(a.seed, b.seed);
}

#[tokio::test(start_paused = true)]
async fn test_trailer_lifecycle_order() {
    let (_, events) = run_collecting(DockConfig::default(), 5, 23).await;

    let mut per_trailer: HashMap<TrailerId, Vec<&DockEvent>> = HashMap::new();
    for event in &events {
        if let Some(trailer) = event.trailer() {
            per_trailer.entry(trailer).or_default().push(event);
        }
    }
    assert_eq!(per_trailer.len(), 5);

    for (trailer, history) in per_trailer {
        let position = |pred: fn(&DockEvent) -> bool| {
            history
                .iter()
                .position(|e| pred(e))
                .unwrap_or_else(|| panic!("trailer-{} is missing an event", trailer))
        };
        let arrived = position(|e| matches!(e, DockEvent::TrailerArrived { .. }));
        let released = position(|e| matches!(e, DockEvent::SecurityReleased { .. }));
        let reported = position(|e| matches!(e, DockEvent::ContainersReported { .. }));
        let bay = position(|e| matches!(e, DockEvent::BayAcquired { .. }));
        let unloaded = position(|e| matches!(e, DockEvent::TrailerUnloaded { .. }));
        let departed = position(|e| matches!(e, DockEvent::TrailerDeparted { .. }));
        assert!(arrived < released);
        assert!(released < reported);
        assert!(reported < bay);
        assert!(bay < unloaded);
        assert!(unloaded < departed);
    }
}

#[tokio::test(start_paused = true)]
async fn test_security_never_overlaps_and_exits_last() {
    let (_, events) = run_collecting(DockConfig::default(), 8, 99).await;

    let mut inside: Option<TrailerId> = None;
    for event in &events {
        match event {
            DockEvent::SecurityChecking { trailer } => {
                assert_eq!(inside, None, "trailer-{} entered an occupied gate", trailer);
                inside = Some(*trailer);
            }
            DockEvent::SecurityReleased { trailer } => {
                assert_eq!(inside, Some(*trailer));
                inside = None;
            }
            _ => {}
        }
    }

    let joined = events
        .iter()
        .position(|e| *e == DockEvent::AllTrailersJoined)
        .unwrap();
    let exit = events
        .iter()
        .position(|e| *e == DockEvent::SecurityExit)
        .unwrap();
    let security_joined = events
        .iter()
        .position(|e| *e == DockEvent::SecurityJoined)
        .unwrap();
    let forklifts_joined = events
        .iter()
        .position(|e| *e == DockEvent::AllForkliftsJoined)
        .unwrap();
    assert!(joined < exit);
    assert!(exit < security_joined);
    assert!(security_joined < forklifts_joined);
}

#[tokio::test(start_paused = true)]
async fn test_remaining_counter_never_negative() {
    let (_, events) = run_collecting(DockConfig::default(), 10, 5).await;

    // Forklift-reported values count down from what trailers reported; the
    // final value reported by any forklift is zero.
    let last = events
        .iter()
        .filter_map(|e| match e {
            DockEvent::ForkliftRemaining { remaining, .. } => Some(*remaining),
            _ => None,
        })
        .last();
    assert_eq!(last, Some(0));

    let claims = events
        .iter()
        .filter(|e| matches!(e, DockEvent::ForkliftMoving { .. }))
        .count();
    assert_eq!(claims, 20);
}

#[tokio::test(start_paused = true)]
async fn test_short_idle_timeout_leaves_backlog_unclaimed() {
    // Forklifts are never woken by the orchestrator. With a one-unit idle
    // timeout they leave before the first trailer can finish unloading, and
    // the run still completes with its containers reported but unmoved.
    let config = DockConfig {
        forklift_idle_timeout_units: 1,
        ..Default::default()
    };
    let (report, events) = run_collecting(config, 3, 8).await;

    assert!(report.invariants_hold(), "{:?}", report.violations());
    assert_eq!(report.containers_published, 6);
    assert_eq!(report.containers_claimed, 0);
    assert_eq!(report.containers_remaining, 6);
    assert!(report
        .forklifts
        .iter()
        .all(|f| f.exit == ForkliftExit::IdleTimeout && f.moved == 0));

    let first_exit = events
        .iter()
        .position(|e| matches!(e, DockEvent::ForkliftIdleExit { .. }))
        .unwrap();
    let first_publish = events
        .iter()
        .position(|e| matches!(e, DockEvent::TrailerUnloaded { .. }))
        .unwrap();
    assert!(first_exit < first_publish);
}

#[tokio::test(start_paused = true)]
async fn test_failed_trailer_cancels_started_actors() {
    // Closing the bay pool makes the first trailer fail right after it
    // clears security, while the later trailers are still arriving.
    let (tx, mut rx) = mpsc::unbounded_channel();
    let err = SimulationRunner::new(DockConfig::default())
        .with_observer(tx)
        .with_startup_hook(|state| state.bays().close())
        .run(5, Some(4))
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("loading bay pool closed"));

    let events: Vec<DockEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
    assert!(!events.contains(&DockEvent::AllTrailersJoined));
    assert!(!events.contains(&DockEvent::SecurityJoined));
    assert!(!events.contains(&DockEvent::AllForkliftsJoined));
    assert!(!events
        .iter()
        .any(|e| matches!(e, DockEvent::TrailerDeparted { .. })));

    // The gate got its shutdown message; the forklifts were aborted long
    // before their idle timeout.
    assert_eq!(events.last(), Some(&DockEvent::SecurityExit));
    assert!(!events
        .iter()
        .any(|e| matches!(e, DockEvent::ForkliftIdleExit { .. })));
    let arrivals = events
        .iter()
        .filter(|e| matches!(e, DockEvent::TrailerArrived { .. }))
        .count();
    assert!(arrivals < 5, "later trailers must not keep arriving");

    // Nothing started by the run is still going.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_real_clock_parallel_run() {
    let config = DockConfig {
        time_unit_ms: 5,
        ..Default::default()
    };
    let (report, _) = run_collecting(config, 10, 31).await;
    assert!(report.invariants_hold(), "{:?}", report.violations());
    assert!(report.peak_bay_occupancy <= 2);
    assert_eq!(report.containers_published, 20);
}
