//! Loading bay pool: fixed-capacity exclusive slots.
//!
//! Admission order among blocked acquirers is whatever order the semaphore
//! wakes them in; callers must not rely on arrival order, only on the
//! occupancy bound.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use tokio::sync::{Semaphore, SemaphorePermit};

/// Pool of loading bay slots.
#[derive(Debug)]
pub struct LoadingBayPool {
    slots: Semaphore,
    capacity: usize,
    occupied: AtomicUsize,
    peak: AtomicUsize,
}

/// Occupancy of one bay slot. The slot frees itself on drop.
#[derive(Debug)]
pub struct BaySlot<'a> {
    pool: &'a LoadingBayPool,
    _permit: SemaphorePermit<'a>,
    occupied_at_entry: usize,
}

impl LoadingBayPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Semaphore::new(capacity),
            capacity,
            occupied: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Wait until a slot is free, then occupy it.
    pub async fn acquire(&self) -> Result<BaySlot<'_>> {
        let permit = self
            .slots
            .acquire()
            .await
            .context("loading bay pool closed")?;
        let occupied = self.occupied.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(occupied, Ordering::SeqCst);
        Ok(BaySlot {
            pool: self,
            _permit: permit,
            occupied_at_entry: occupied,
        })
    }

    /// Close the pool; every pending and future acquire fails.
    pub fn close(&self) {
        self.slots.close();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots occupied right now.
    pub fn occupied(&self) -> usize {
        self.occupied.load(Ordering::SeqCst)
    }

    /// Highest occupancy seen since the pool was built.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl BaySlot<'_> {
    /// Occupancy including this slot, as seen when it was granted.
    pub fn occupied_at_entry(&self) -> usize {
        self.occupied_at_entry
    }

    /// Free the slot, possibly waking a blocked acquirer.
    pub fn release(self) {}
}

impl Drop for BaySlot<'_> {
    fn drop(&mut self) {
        // Runs before the permit field is dropped, so the count falls first.
        self.pool.occupied.fetch_sub(1, Ordering::SeqCst);
    }
}
