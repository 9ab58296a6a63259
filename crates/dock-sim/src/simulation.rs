//! Simulation runner: the orchestrator for one dock run.
//!
//! Orchestrates the run lifecycle:
//! 1. Validate the trailer count and configuration
//! 2. Launch the actor runtime, start the security gate and the forklifts (both idle)
//! 3. Spawn trailers with a random spacing between arrivals
//! 4. Join trailers, shut the gate down, join forklifts
//! 5. Shut the actor runtime down and collect the run report
//!
//! If anything fails after step 2, every actor already started is stopped
//! before the error is returned.

use std::sync::Arc;

use acton_reactive::prelude::*;
use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, warn};
use uuid::Uuid;

use dock_kernel::actors::{GateExit, GateSummary, TrailerOutcome};
use dock_kernel::{
    validate_trailer_count, DockConfig, DockEvent, DockState, EventSink, Forklift,
    ForkliftSummary, SecurityGate, SecurityGateHandle, TrailerId, TrailerUnit,
};

use crate::results::{ActorCounts, RunReport};

type StartupHook = Arc<dyn Fn(&Arc<DockState>) + Send + Sync>;

/// The simulation runner.
pub struct SimulationRunner {
    config: DockConfig,
    observer: Option<mpsc::UnboundedSender<DockEvent>>,
    startup_hook: Option<StartupHook>,
}

/// What the started actors handed back.
struct Crew {
    gate: GateSummary,
    forklifts: Vec<ForkliftSummary>,
    actors: ActorCounts,
}

impl SimulationRunner {
    pub fn new(config: DockConfig) -> Self {
        Self {
            config,
            observer: None,
            startup_hook: None,
        }
    }

    /// Forward every event of the run to `observer` as well as the log.
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<DockEvent>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Call `hook` with the shared state once the gate and forklifts are
    /// running, before the first trailer arrives.
    pub fn with_startup_hook(
        mut self,
        hook: impl Fn(&Arc<DockState>) + Send + Sync + 'static,
    ) -> Self {
        self.startup_hook = Some(Arc::new(hook));
        self
    }

    pub fn config(&self) -> &DockConfig {
        &self.config
    }

    /// Run a full simulation with `trailers` arrivals.
    ///
    /// Fails without starting any actor if the count is outside
    /// `[MIN_TRAILERS, MAX_TRAILERS]` or the configuration is unusable.
    pub async fn run(&self, trailers: i64, seed: Option<u64>) -> Result<RunReport> {
        let trailers = validate_trailer_count(trailers)?;
        let seed = seed.unwrap_or_else(rand::random);
        let events = match &self.observer {
            Some(tx) => EventSink::with_observer(tx.clone()),
            None => EventSink::log_only(),
        };
        let state = DockState::new(self.config.clone(), seed, events)
            .context("failed to initialize dock resources")?;

        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        debug!(%run_id, seed, trailers, "Starting dock run");
        state.emit(DockEvent::TotalTrailers { count: trailers });

        let mut runtime = ActonApp::launch_async().await;
        let crew = self.run_crew(&mut runtime, &state, trailers).await;
        if let Err(e) = runtime.shutdown_all().await {
            warn!(error = ?e, "Actor runtime did not shut down cleanly");
        }
        let crew = crew?;

        let backlog = state.backlog();
        Ok(RunReport {
            run_id,
            started_at,
            ended_at: Utc::now(),
            seed,
            trailers,
            config: self.config.clone(),
            actors: crew.actors,
            containers_reported: backlog.reported(),
            containers_published: backlog.published(),
            containers_claimed: backlog.claimed(),
            containers_remaining: backlog.remaining(),
            peak_bay_occupancy: state.bays().peak(),
            peak_concurrent_checks: crew.gate.peak_concurrent_checks,
            checks_completed: crew.gate.checks_completed,
            forklifts: crew.forklifts,
        })
    }

    /// Start the gate and forklifts, run every trailer, then join them all.
    async fn run_crew(
        &self,
        runtime: &mut ActorRuntime,
        state: &Arc<DockState>,
        trailers: u32,
    ) -> Result<Crew> {
        let mut actors = ActorCounts::default();

        let (gate, gate_exit) = SecurityGate::spawn(runtime, state.clone()).await;
        actors.security += 1;

        let mut forklift_tasks: Vec<JoinHandle<ForkliftSummary>> =
            Vec::with_capacity(self.config.forklifts);
        for id in 1..=self.config.forklifts {
            forklift_tasks.push(tokio::spawn(Forklift::new(id as u32, state.clone()).run()));
            actors.forklifts += 1;
        }

        if let Some(hook) = &self.startup_hook {
            hook(state);
        }

        match spawn_and_join_trailers(runtime, state, &gate, trailers, &mut actors).await {
            Ok(departed) => debug!(?departed, "Trailer departure order"),
            Err(e) => {
                // Cancel everything already started before giving up.
                abort_forklifts(forklift_tasks).await;
                gate.shutdown().await;
                if let Err(gate_err) = gate_exit.wait().await {
                    warn!(error = %gate_err, "Security gate did not report on cancellation");
                }
                return Err(e);
            }
        }
        state.emit(DockEvent::AllTrailersJoined);

        let gate_summary = match shut_down_gate(&gate, gate_exit).await {
            Ok(summary) => summary,
            Err(e) => {
                abort_forklifts(forklift_tasks).await;
                return Err(e);
            }
        };
        state.emit(DockEvent::SecurityJoined);

        let mut forklifts = Vec::with_capacity(forklift_tasks.len());
        let mut pending = forklift_tasks.into_iter();
        while let Some(task) = pending.next() {
            match task.await {
                Ok(summary) => forklifts.push(summary),
                Err(e) => {
                    abort_forklifts(pending.collect()).await;
                    return Err(anyhow::Error::new(e).context("forklift panicked"));
                }
            }
        }
        state.emit(DockEvent::AllForkliftsJoined);

        Ok(Crew {
            gate: gate_summary,
            forklifts,
            actors,
        })
    }
}

/// Deliver the shutdown message and wait for the gate to exit.
async fn shut_down_gate(gate: &SecurityGateHandle, exit: GateExit) -> Result<GateSummary> {
    gate.shutdown().await;
    exit.wait().await
}

/// Abort forklift tasks and wait until every one of them has stopped.
async fn abort_forklifts(tasks: Vec<JoinHandle<ForkliftSummary>>) {
    for task in &tasks {
        task.abort();
    }
    join_all(tasks).await;
}

/// Spawn trailers 1..=count with random arrival spacing, then join them all.
///
/// Trailers that finish during the spacing are joined right away, so the
/// first failure cancels the remaining trailers without waiting for the
/// later arrivals. Returns the departure order.
async fn spawn_and_join_trailers(
    runtime: &mut ActorRuntime,
    state: &Arc<DockState>,
    gate: &SecurityGateHandle,
    count: u32,
    actors: &mut ActorCounts,
) -> Result<Vec<TrailerId>> {
    let mut trailers = JoinSet::new();
    let mut departed: Vec<TrailerId> = Vec::with_capacity(count as usize);

    for id in 1..=count {
        let ticket = gate.issue_ticket(runtime, id).await;
        trailers.spawn(TrailerUnit::new(id, state.clone(), ticket).run());
        actors.trailers += 1;

        if id < count {
            let spacing = state.sampler().sample(state.config().arrival);
            let next_arrival = tokio::time::sleep(spacing);
            tokio::pin!(next_arrival);
            loop {
                tokio::select! {
                    _ = &mut next_arrival => break,
                    Some(joined) = trailers.join_next() => {
                        let outcome = settle_trailer(joined, &mut trailers).await?;
                        departed.push(outcome.trailer);
                    }
                }
            }
        }
    }

    while let Some(joined) = trailers.join_next().await {
        let outcome = settle_trailer(joined, &mut trailers).await?;
        departed.push(outcome.trailer);
    }
    Ok(departed)
}

/// Unwrap one joined trailer; on failure cancel the rest of the set.
async fn settle_trailer(
    joined: Result<Result<TrailerOutcome>, JoinError>,
    trailers: &mut JoinSet<Result<TrailerOutcome>>,
) -> Result<TrailerOutcome> {
    match joined {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(e)) => {
            warn!(error = %e, "Trailer failed, cancelling remaining trailers");
            trailers.shutdown().await;
            Err(e.context("trailer failed"))
        }
        Err(e) => {
            warn!(error = %e, "Trailer task panicked, cancelling remaining trailers");
            trailers.shutdown().await;
            Err(anyhow::Error::new(e).context("trailer task panicked"))
        }
    }
}
