//! SecurityGate: the single serialized inspection checkpoint.
//!
//! The gate is an acton actor. `CheckRequest` is handled with `mutate_on`, so
//! the mailbox hands the gate one request at a time and inspections never
//! overlap. Requests are served in mailbox order, but nothing outside this
//! module may rely on that: the contract is exclusivity, not FIFO.
//!
//! ## Acton-Reactive Pattern
//!
//! Trailers are plain tokio tasks, so each one talks to the gate through its
//! own liaison actor:
//! - The liaison sends `CheckRequest` via `context.new_envelope(&gate.reply_address())`
//! - The gate answers via `context.reply_envelope().send(Clearance)`
//! - The liaison forwards the clearance to the trailer's `ClearanceTicket`
//!
//! Envelope routing delivers every answer to the liaison that asked, so the
//! clearance always reaches the trailer it names.
//!
//! ## Message Flow
//!
//! ```text
//! Trailer        Liaison                      Gate
//!   |               |                           |  Standby
//!   +-- Request --->|                           |
//!   |               +-- CheckRequest { id } --->|
//!   |               |                           |  Checking(id), sleep 2..=3 units
//!   |               |<------- Clearance --------+
//!   |<- Clearance --+                           |  Standby
//!   ...
//! Orchestrator                                  |
//!   +------------- ShutdownGate --------------->|  flag set, Exit, summary
//! ```
//!
//! `ShutdownGate` queues behind every check already in the mailbox, so those
//! are still answered. A check that arrives after it gets `CheckRefused`.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use acton_reactive::prelude::*;
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::events::{DockEvent, TrailerId};
use crate::state::DockState;

/// One trailer asking to be inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    pub trailer: TrailerId,
}

/// Answer to a check request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clearance {
    pub trailer: TrailerId,
    pub inspected_for: Duration,
}

/// Answer to a check request that reached the gate after shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRefused {
    pub trailer: TrailerId,
}

/// No more arrivals. Sent once by the orchestrator.
#[derive(Debug, Clone)]
pub struct ShutdownGate;

/// Trigger for a liaison: ask `gate` to inspect this liaison's trailer.
#[derive(Debug, Clone)]
struct RequestClearance {
    trailer: TrailerId,
    gate: ActorHandle,
}

/// What the gate is doing right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GateState {
    #[default]
    Idle,
    Checking(TrailerId),
}

/// Gate statistics reported when the gate exits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSummary {
    pub checks_completed: u32,
    pub peak_concurrent_checks: usize,
}

#[derive(Debug, Default)]
struct GateShared {
    shutdown: AtomicBool,
    in_check: AtomicUsize,
    peak_in_check: AtomicUsize,
    checks_completed: AtomicU32,
    current: Mutex<GateState>,
}

impl GateShared {
    fn begin_check(&self, trailer: TrailerId) {
        let in_check = self.in_check.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_check.fetch_max(in_check, Ordering::SeqCst);
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = GateState::Checking(trailer);
    }

    fn end_check(&self) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = GateState::Idle;
        self.in_check.fetch_sub(1, Ordering::SeqCst);
        self.checks_completed.fetch_add(1, Ordering::SeqCst);
    }

    fn summary(&self) -> GateSummary {
        GateSummary {
            checks_completed: self.checks_completed.load(Ordering::SeqCst),
            peak_concurrent_checks: self.peak_in_check.load(Ordering::SeqCst),
        }
    }
}

/// Actor state for the SecurityGate.
#[derive(Default, Clone)]
pub struct SecurityGateState {
    dock: Option<Arc<DockState>>,
    shared: Arc<GateShared>,
    /// Summary handoff to the orchestrator (wrapped for Clone)
    exit: Arc<Mutex<Option<oneshot::Sender<GateSummary>>>>,
}

impl std::fmt::Debug for SecurityGateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityGateState")
            .field("shutdown", &self.shared.shutdown.load(Ordering::SeqCst))
            .field("checks_completed", &self.shared.checks_completed.load(Ordering::SeqCst))
            .finish()
    }
}

/// Cloneable handle used by the orchestrator and to issue trailer tickets.
#[derive(Clone)]
pub struct SecurityGateHandle {
    actor: ActorHandle,
    shared: Arc<GateShared>,
}

impl std::fmt::Debug for SecurityGateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityGateHandle")
            .field("state", &self.state())
            .finish()
    }
}

impl SecurityGateHandle {
    /// The gate actor itself.
    pub fn actor(&self) -> &ActorHandle {
        &self.actor
    }

    /// Start a liaison for `trailer` and return the ticket it answers on.
    pub async fn issue_ticket(
        &self,
        runtime: &mut ActorRuntime,
        trailer: TrailerId,
    ) -> ClearanceTicket {
        let (tx, rx) = oneshot::channel();
        let liaison = GateLiaison::spawn(runtime, trailer, tx).await;
        ClearanceTicket {
            trailer,
            liaison,
            gate: self.actor.clone(),
            rx: Some(rx),
        }
    }

    /// Tell the gate there will be no more arrivals.
    pub async fn shutdown(&self) {
        self.actor.send(ShutdownGate).await;
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shared.shutdown.load(Ordering::SeqCst)
    }

    /// Inspections in progress right now (0 or 1).
    pub fn checks_in_progress(&self) -> usize {
        self.shared.in_check.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> GateState {
        *self.shared.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Resolves once the gate has handled `ShutdownGate`.
#[derive(Debug)]
pub struct GateExit {
    rx: oneshot::Receiver<GateSummary>,
}

impl GateExit {
    /// Wait for the gate to exit and return its summary.
    pub async fn wait(self) -> Result<GateSummary> {
        self.rx
            .await
            .context("security gate stopped without reporting")
    }
}

/// The security gate actor.
pub struct SecurityGate;

impl SecurityGate {
    /// Spawn the gate in the given runtime. It starts idle.
    pub async fn spawn(
        runtime: &mut ActorRuntime,
        state: Arc<DockState>,
    ) -> (SecurityGateHandle, GateExit) {
        let mut actor = runtime.new_actor_with_name::<SecurityGateState>("SecurityGate".to_string());

        let shared = Arc::new(GateShared::default());
        let (exit_tx, exit_rx) = oneshot::channel();
        actor.model.dock = Some(state);
        actor.model.shared = shared.clone();
        actor.model.exit = Arc::new(Mutex::new(Some(exit_tx)));

        actor.after_start(|actor| {
            if let Some(dock) = &actor.model.dock {
                dock.emit(DockEvent::SecurityStandby);
            }
            Reply::ready()
        });

        // mutate_on = sequential, one inspection at a time
        actor.mutate_on::<CheckRequest>(|actor, context| {
            let trailer = context.message().trailer;
            let reply_envelope = context.reply_envelope();
            let shared = actor.model.shared.clone();
            let Some(dock) = actor.model.dock.clone() else {
                return Reply::ready();
            };

            if shared.shutdown.load(Ordering::SeqCst) {
                tracing::warn!(target: "security", trailer, "Check requested after shutdown");
                return Reply::pending(async move {
                    reply_envelope.send(CheckRefused { trailer }).await;
                });
            }

            shared.begin_check(trailer);
            dock.emit(DockEvent::SecurityChecking { trailer });
            let inspected_for = dock.sampler().sample(dock.config().security_check);

            Reply::pending(async move {
                tokio::time::sleep(inspected_for).await;
                dock.emit(DockEvent::SecurityReleased { trailer });
                shared.end_check();

                reply_envelope
                    .send(Clearance {
                        trailer,
                        inspected_for,
                    })
                    .await;
                if !shared.shutdown.load(Ordering::SeqCst) {
                    dock.emit(DockEvent::SecurityStandby);
                }
            })
        });

        actor.mutate_on::<ShutdownGate>(|actor, _context| {
            let shared = actor.model.shared.clone();
            if shared.shutdown.swap(true, Ordering::SeqCst) {
                tracing::debug!(target: "security", "Repeated shutdown ignored");
                return Reply::ready();
            }

            if let Some(dock) = &actor.model.dock {
                dock.emit(DockEvent::SecurityExit);
            }
            // Take the sender out (can only send once)
            if let Ok(mut guard) = actor.model.exit.lock() {
                if let Some(tx) = guard.take() {
                    let _ = tx.send(shared.summary());
                }
            }
            Reply::ready()
        });

        let handle = actor.start().await;
        (
            SecurityGateHandle {
                actor: handle,
                shared,
            },
            GateExit { rx: exit_rx },
        )
    }
}

#[derive(Debug)]
enum GateReply {
    Cleared(Clearance),
    Refused,
}

/// State for a liaison actor.
#[derive(Default, Clone)]
struct GateLiaisonState {
    trailer: TrailerId,
    /// Oneshot sender for the gate's answer (wrapped for Clone)
    tx: Arc<Mutex<Option<oneshot::Sender<GateReply>>>>,
}

impl std::fmt::Debug for GateLiaisonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateLiaisonState")
            .field("trailer", &self.trailer)
            .finish()
    }
}

impl GateLiaisonState {
    fn forward(&self, reply: GateReply) {
        if let Ok(mut guard) = self.tx.lock() {
            if let Some(tx) = guard.take() {
                if tx.send(reply).is_err() {
                    tracing::warn!(target: "security", trailer = self.trailer, "Trailer stopped waiting for its clearance");
                }
            }
        }
    }
}

/// Bridges one trailer task to the gate actor.
struct GateLiaison;

impl GateLiaison {
    async fn spawn(
        runtime: &mut ActorRuntime,
        trailer: TrailerId,
        tx: oneshot::Sender<GateReply>,
    ) -> ActorHandle {
        let mut actor =
            runtime.new_actor_with_name::<GateLiaisonState>(format!("GateLiaison{}", trailer));
        actor.model.trailer = trailer;
        actor.model.tx = Arc::new(Mutex::new(Some(tx)));

        actor.act_on::<RequestClearance>(|_actor, context| {
            let msg = context.message().clone();
            let request_envelope = context.new_envelope(&msg.gate.reply_address());

            Reply::pending(async move {
                request_envelope
                    .send(CheckRequest {
                        trailer: msg.trailer,
                    })
                    .await;
            })
        });

        actor.mutate_on::<Clearance>(|actor, context| {
            let clearance = context.message().clone();
            if clearance.trailer != actor.model.trailer {
                tracing::warn!(
                    target: "security",
                    expected = actor.model.trailer,
                    got = clearance.trailer,
                    "Clearance for the wrong trailer"
                );
                return Reply::ready();
            }
            actor.model.forward(GateReply::Cleared(clearance));
            Reply::ready()
        });

        actor.mutate_on::<CheckRefused>(|actor, _context| {
            actor.model.forward(GateReply::Refused);
            Reply::ready()
        });

        actor.start().await
    }
}

/// A trailer's single pending request to the gate.
pub struct ClearanceTicket {
    trailer: TrailerId,
    liaison: ActorHandle,
    gate: ActorHandle,
    rx: Option<oneshot::Receiver<GateReply>>,
}

impl std::fmt::Debug for ClearanceTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClearanceTicket")
            .field("trailer", &self.trailer)
            .field("used", &self.rx.is_none())
            .finish()
    }
}

impl ClearanceTicket {
    pub fn trailer(&self) -> TrailerId {
        self.trailer
    }

    /// Ask for an inspection and wait until the gate clears this trailer.
    pub async fn request_check(&mut self) -> Result<Clearance> {
        let trailer = self.trailer;
        let rx = self
            .rx
            .take()
            .with_context(|| format!("trailer-{} already asked for clearance", trailer))?;

        self.liaison
            .send(RequestClearance {
                trailer,
                gate: self.gate.clone(),
            })
            .await;

        match rx.await {
            Ok(GateReply::Cleared(clearance)) => Ok(clearance),
            Ok(GateReply::Refused) => bail!("security gate is no longer accepting trailers"),
            Err(_) => Err(anyhow!(
                "security gate dropped the check for trailer-{}",
                trailer
            )),
        }
    }
}
