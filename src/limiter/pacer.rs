use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, trace};

use crate::limiter::dispatcher::Dispatcher;
use crate::limiter::permits::PermitPool;
use crate::limiter::queue::SubmissionQueue;

/// Admits at most one queued item per period, if a permit is free.
pub struct PacingDriver<P> {
    queue: Arc<SubmissionQueue<P>>,
    pool: PermitPool,
    dispatcher: Arc<Dispatcher<P>>,
    period: Duration,
}

impl<P: Send + 'static> PacingDriver<P> {
    pub fn new(
        queue: Arc<SubmissionQueue<P>>,
        pool: PermitPool,
        dispatcher: Arc<Dispatcher<P>>,
        period: Duration,
    ) -> Self {
        Self {
            queue,
            pool,
            dispatcher,
            period,
        }
    }

    /// One admission attempt. Never waits for a permit; an exhausted pool
    /// leaves the head queued for a later tick.
    pub fn tick(&self) -> bool {
        match self.queue.admit_next(&self.pool) {
            Some((item, permit)) => {
                self.dispatcher.dispatch(item, permit);
                true
            }
            None => {
                if !self.queue.is_empty() {
                    trace!(
                        "All {} permits in use, {} items waiting",
                        self.pool.capacity(),
                        self.queue.len()
                    );
                }
                false
            }
        }
    }

    /// Run the tick loop until a shutdown signal arrives. The first tick fires immediately.
    pub fn spawn(self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.period);
            // Late ticks are pushed back rather than bursted.
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!("Pacing driver started. Period: {:?}", self.period);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.recv() => {
                        info!("Pacing driver shutting down...");
                        break;
                    }
                    _ = interval.tick() => {
                        self.tick();
                    }
                }
            }
            info!("Pacing driver stopped.");
        })
    }
}
