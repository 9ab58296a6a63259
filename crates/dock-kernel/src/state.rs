//! Shared dock state handed to every actor.

use std::sync::Arc;

use anyhow::Result;

use crate::backlog::ContainerBacklog;
use crate::bays::LoadingBayPool;
use crate::config::DockConfig;
use crate::events::{DockEvent, EventSink};
use crate::timing::DelaySampler;

/// Everything the actors share: pools, counters, the delay source and the
/// event sink. Built once per run and passed around as `Arc<DockState>`.
#[derive(Debug)]
pub struct DockState {
    config: DockConfig,
    bays: LoadingBayPool,
    backlog: ContainerBacklog,
    sampler: DelaySampler,
    events: EventSink,
}

impl DockState {
    /// Validate `config` and build the shared primitives.
    pub fn new(config: DockConfig, seed: u64, events: EventSink) -> Result<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(Self {
            bays: LoadingBayPool::new(config.loading_bays),
            backlog: ContainerBacklog::new(),
            sampler: DelaySampler::new(seed, config.time_unit()),
            events,
            config,
        }))
    }

    pub fn config(&self) -> &DockConfig {
        &self.config
    }

    pub fn bays(&self) -> &LoadingBayPool {
        &self.bays
    }

    pub fn backlog(&self) -> &ContainerBacklog {
        &self.backlog
    }

    pub fn sampler(&self) -> &DelaySampler {
        &self.sampler
    }

    pub fn emit(&self, event: DockEvent) {
        self.events.emit(event);
    }
}
