//! Container backlog: reported containers plus claimable tokens.
//!
//! Trailers `report` containers as soon as they clear security and only
//! `publish` claim tokens once unloading is done. Forklifts `claim` a token
//! and then decrement the reported count. Because a trailer always reports
//! before it publishes, outstanding tokens never exceed the reported count
//! and the remaining counter cannot go negative.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::sync::Semaphore;

#[derive(Debug)]
pub struct ContainerBacklog {
    tokens: Semaphore,
    remaining: Mutex<u32>,
    reported: AtomicU64,
    published: AtomicU64,
    claimed: AtomicU64,
}

impl ContainerBacklog {
    pub fn new() -> Self {
        Self {
            tokens: Semaphore::new(0),
            remaining: Mutex::new(0),
            reported: AtomicU64::new(0),
            published: AtomicU64::new(0),
            claimed: AtomicU64::new(0),
        }
    }

    /// Add `count` containers to the remaining counter. Returns the new value.
    pub fn report(&self, count: u32) -> u32 {
        let mut remaining = self.remaining.lock().unwrap_or_else(|e| e.into_inner());
        *remaining = remaining.saturating_add(count);
        self.reported.fetch_add(u64::from(count), Ordering::SeqCst);
        *remaining
    }

    /// Make `count` reported containers claimable by forklifts.
    pub fn publish(&self, count: u32) {
        self.published.fetch_add(u64::from(count), Ordering::SeqCst);
        self.tokens.add_permits(count as usize);
    }

    /// Wait for one token, then take its container off the counter.
    ///
    /// Returns the remaining count after the decrement.
    pub async fn claim(&self) -> Result<u32> {
        let permit = self
            .tokens
            .acquire()
            .await
            .context("container claim signal closed")?;
        permit.forget();

        let mut remaining = self.remaining.lock().unwrap_or_else(|e| e.into_inner());
        *remaining = remaining
            .checked_sub(1)
            .ok_or_else(|| anyhow!("claimed a container that was never reported"))?;
        self.claimed.fetch_add(1, Ordering::SeqCst);
        Ok(*remaining)
    }

    /// Like [`claim`](Self::claim) but gives up after `wait`.
    ///
    /// `Ok(None)` means no token arrived in time.
    pub async fn claim_within(&self, wait: Duration) -> Result<Option<u32>> {
        match tokio::time::timeout(wait, self.claim()).await {
            Ok(result) => result.map(Some),
            Err(_elapsed) => Ok(None),
        }
    }

    /// Close the claim signal; every pending and future claim fails.
    pub fn close(&self) {
        self.tokens.close();
    }

    pub fn remaining(&self) -> u32 {
        *self.remaining.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Tokens published but not yet claimed.
    pub fn available(&self) -> usize {
        self.tokens.available_permits()
    }

    pub fn reported(&self) -> u64 {
        self.reported.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }

    pub fn claimed(&self) -> u64 {
        self.claimed.load(Ordering::SeqCst)
    }
}

impl Default for ContainerBacklog {
    fn default() -> Self {
        Self::new()
    }
}
