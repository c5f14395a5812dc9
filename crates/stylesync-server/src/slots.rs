//! Cap on concurrently running browser jobs.
//!
//! Every accepted job launches its own Chromium. A slot is claimed when the
//! job is admitted and held until the job has closed its browser, which for
//! streamed jobs is after the HTTP handler has already returned.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone)]
pub struct BrowserSlots {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl BrowserSlots {
    /// A capacity of 0 is raised to 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Claim a slot without waiting. `None` when every slot is taken.
    #[must_use]
    pub fn try_claim(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.permits).try_acquire_owned().ok()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn in_use(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    /// Wait until every running job has released its slot. Returns `false`
    /// if some were still held when `bound` elapsed.
    pub async fn drain(&self, bound: Duration) -> bool {
        let Ok(all) = u32::try_from(self.capacity) else {
            return false;
        };
        matches!(
            tokio::time::timeout(bound, self.permits.acquire_many(all)).await,
            Ok(Ok(_))
        )
    }
}
