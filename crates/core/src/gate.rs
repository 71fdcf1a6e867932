//! Admission control for concurrent fetches.

use cidpull_api::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug)]
struct Counters {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// A counting gate bounding how many fetches may be in flight at once.
///
/// Cloning yields another handle to the same gate.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    sem: Arc<Semaphore>,
    capacity: usize,
    counters: Arc<Counters>,
}

impl ConcurrencyGate {
    /// Construct a gate admitting `capacity` holders at once.
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            sem: Arc::new(Semaphore::new(capacity)),
            capacity,
            counters: Arc::new(Counters {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    /// The number of slots in this gate.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of permits currently held.
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    /// The highest number of permits ever held at once.
    pub fn peak(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    /// Wait for a free slot. The slot is released when the returned
    /// permit is dropped.
    pub async fn acquire(&self) -> PullResult<GatePermit> {
        let permit = self
            .sem
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| PullError::other_src("concurrency gate closed", e))?;

        let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(now, Ordering::SeqCst);

        Ok(GatePermit {
            _permit: permit,
            counters: self.counters.clone(),
        })
    }
}

/// A held slot of a [ConcurrencyGate].
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    counters: Arc<Counters>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
