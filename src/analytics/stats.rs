use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::info;

#[derive(Debug, Default)]
pub struct ThrottleStats {
    // Accepted into the queue; refused submits are not counted here
    pub submitted: AtomicU64,
    pub rejected: AtomicU64,
    pub admitted: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub cancelled: AtomicU64,

    // Highest number of simultaneously admitted calls seen so far
    pub peak_in_flight: AtomicUsize,
    pub last_call_latency_ms: AtomicU64,
}

impl ThrottleStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_admission(&self, in_flight: usize) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
        self.peak_in_flight.fetch_max(in_flight, Ordering::Relaxed);
    }

    pub fn inc_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_cancelled(&self, count: u64) {
        self.cancelled.fetch_add(count, Ordering::Relaxed);
    }

    pub fn update_call_latency(&self, ms: u64) {
        self.last_call_latency_ms.store(ms, Ordering::Relaxed);
    }

    pub fn admitted(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }

    pub fn log_stats(&self) {
        let submitted = self.submitted.load(Ordering::Relaxed);
        let rejected = self.rejected.load(Ordering::Relaxed);
        let admitted = self.admitted.load(Ordering::Relaxed);
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let cancelled = self.cancelled.load(Ordering::Relaxed);
        let peak = self.peak_in_flight.load(Ordering::Relaxed);
        let latency = self.last_call_latency_ms.load(Ordering::Relaxed);

        info!(
            "STATS: Accepted: {} | Rejected: {} | Admitted: {} (peak {} in flight) | \
             Calls: {} OK, {} Failed, {} Cancelled | Last latency {}ms",
            submitted,
            rejected,
            admitted,
            peak,
            succeeded,
            failed,
            cancelled,
            latency
        );
    }
}
