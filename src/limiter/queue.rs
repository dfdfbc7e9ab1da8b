use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::error::{AppError, Result};
use crate::limiter::item::WorkItem;
use crate::limiter::permits::{Permit, PermitPool};

/// FIFO of items awaiting admission. Many producers, one consumer (the pacer).
#[derive(Debug)]
pub struct SubmissionQueue<P> {
    state: Mutex<QueueState<P>>,
    max_depth: Option<usize>,
}

#[derive(Debug)]
struct QueueState<P> {
    items: VecDeque<WorkItem<P>>,
    closed: bool,
}

impl<P> SubmissionQueue<P> {
    pub fn new(max_depth: Option<usize>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            max_depth,
        }
    }

    /// Append to the tail. Never blocks.
    pub fn enqueue(&self, item: WorkItem<P>) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(AppError::Closed);
        }
        if let Some(max) = self.max_depth {
            if state.items.len() >= max {
                return Err(AppError::Rejected(max));
            }
        }
        state.items.push_back(item);
        Ok(())
    }

    /// Pop the head only if a permit is available; otherwise leave it queued.
    pub fn admit_next(&self, pool: &PermitPool) -> Option<(WorkItem<P>, Permit)> {
        let mut state = self.state.lock();
        if state.items.is_empty() {
            return None;
        }
        let permit = pool.try_acquire()?;
        state.items.pop_front().map(|item| (item, permit))
    }

    /// Refuse all further submissions.
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Remove everything still waiting, in submission order.
    pub fn drain(&self) -> Vec<WorkItem<P>> {
        self.state.lock().items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
