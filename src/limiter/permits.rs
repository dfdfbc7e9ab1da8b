use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Admission gate capped at `capacity` concurrently admitted calls.
#[derive(Debug, Clone)]
pub struct PermitPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl PermitPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Non-blocking acquire. The returned permit is released on drop.
    pub fn try_acquire(&self) -> Option<Permit> {
        let permit = self.semaphore.clone().try_acquire_owned().ok()?;
        Some(Permit {
            _permit: permit,
            pool: self.clone(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.capacity - self.available_permits()
    }

    pub fn is_idle(&self) -> bool {
        self.available_permits() == self.capacity
    }

    /// Resolves once every outstanding permit has been returned.
    pub async fn wait_idle(&self) {
        // The semaphore is never closed, so this only waits.
        if let Ok(all) = self.semaphore.acquire_many(self.capacity as u32).await {
            drop(all);
        }
    }
}

/// One unit of concurrency budget, held from admission to completion.
#[must_use = "dropping a permit releases it immediately"]
#[derive(Debug)]
pub struct Permit {
    _permit: OwnedSemaphorePermit,
    pool: PermitPool,
}

impl Permit {
    pub fn pool(&self) -> &PermitPool {
        &self.pool
    }
}
