use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::analytics::ThrottleStats;
use crate::error::{AppError, Result};
use crate::limiter::config::ThrottleConfig;
use crate::limiter::dispatcher::Dispatcher;
use crate::limiter::item::{ResultHandle, WorkItem};
use crate::limiter::pacer::PacingDriver;
use crate::limiter::permits::PermitPool;
use crate::limiter::queue::SubmissionQueue;
use crate::transport::{Credential, JsonSerializer, PayloadSerializer, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    Draining,
    Stopped,
}

/// Outcome of `Throttle::shutdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Every admitted call finished before the timeout. Covers admitted work
    /// only: queued items that were never admitted show up in `cancelled`.
    pub drained: bool,
    /// Admitted calls still running when the throttle stopped.
    pub outstanding: usize,
    /// Queued items resolved as `Cancelled` at stop.
    pub cancelled: usize,
}

struct Lifecycle {
    pacer: Option<JoinHandle<()>>,
    report: Option<ShutdownReport>,
}

/// Paces submitted calls so that at most `request_limit` are in flight and
/// at most one is admitted per `window / request_limit`.
pub struct Throttle<P> {
    config: ThrottleConfig,
    queue: Arc<SubmissionQueue<P>>,
    pool: PermitPool,
    stats: Arc<ThrottleStats>,
    state: Mutex<LifecycleState>,
    lifecycle: AsyncMutex<Lifecycle>,
    shutdown_tx: broadcast::Sender<()>,
}

impl<P: Send + 'static> Throttle<P> {
    /// Start the pacing driver. Must be called from within a tokio runtime.
    pub fn new(
        config: ThrottleConfig,
        transport: Arc<dyn Transport>,
        serializer: Arc<dyn PayloadSerializer<P>>,
    ) -> Result<Self> {
        Handle::try_current()
            .map_err(|_| AppError::Init("Throttle must be created inside a tokio runtime".into()))?;

        let queue = Arc::new(SubmissionQueue::new(config.max_queue_depth()));
        let pool = PermitPool::new(config.request_limit() as usize);
        let stats = Arc::new(ThrottleStats::new());
        let dispatcher = Arc::new(Dispatcher::new(transport, serializer, stats.clone()));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let pacer =
            PacingDriver::new(queue.clone(), pool.clone(), dispatcher, config.pacing_period())
                .spawn(shutdown_rx);

        info!(
            "Throttle running: {} requests per {:?}",
            config.request_limit(),
            config.window()
        );

        Ok(Self {
            config,
            queue,
            pool,
            stats,
            state: Mutex::new(LifecycleState::Running),
            lifecycle: AsyncMutex::new(Lifecycle {
                pacer: Some(pacer),
                report: None,
            }),
            shutdown_tx,
        })
    }

    /// Queue a call and return immediately with its handle.
    pub fn submit(&self, payload: P, credential: impl Into<Credential>) -> Result<ResultHandle> {
        let (item, handle) = WorkItem::new(payload, credential.into());

        match self.queue.enqueue(item) {
            Ok(()) => {
                self.stats.inc_submitted();
                Ok(handle)
            }
            Err(e) => {
                if matches!(e, AppError::Rejected(_)) {
                    self.stats.inc_rejected();
                }
                Err(e)
            }
        }
    }

    /// Stop admitting, wait up to `timeout` for admitted calls, then cancel
    /// whatever is still queued. Later calls return the first report.
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownReport {
        let mut lifecycle = self.lifecycle.lock().await;
        if let Some(report) = lifecycle.report {
            return report;
        }

        info!(
            "Throttle draining ({} in flight, {} queued)...",
            self.pool.in_flight(),
            self.queue.len()
        );
        *self.state.lock() = LifecycleState::Draining;
        self.queue.close();
        let _ = self.shutdown_tx.send(());

        let pool = self.pool.clone();
        let pacer = &mut lifecycle.pacer;
        let drained = tokio::time::timeout(timeout, async {
            if let Some(handle) = pacer.as_mut() {
                let _ = handle.await;
            }
            pool.wait_idle().await;
        })
        .await
        .is_ok();

        if let Some(handle) = lifecycle.pacer.take() {
            handle.abort();
        }
        if !drained {
            warn!(
                "Shutdown timed out after {:?}; {} calls still in flight",
                timeout,
                self.pool.in_flight()
            );
        }

        *self.state.lock() = LifecycleState::Stopped;
        let cancelled = self.cancel_queued();

        let report = ShutdownReport {
            drained,
            outstanding: self.pool.in_flight(),
            cancelled,
        };
        lifecycle.report = Some(report);

        self.stats.log_stats();
        info!("Throttle stopped: {:?}", report);
        report
    }

    fn cancel_queued(&self) -> usize {
        let remaining = self.queue.drain();
        let count = remaining.len();
        for item in remaining {
            item.cancel();
        }
        if count > 0 {
            self.stats.add_cancelled(count as u64);
            warn!("Cancelled {} queued items that were never admitted", count);
        }
        count
    }
}

impl<P> Throttle<P> {
    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    pub fn stats(&self) -> &ThrottleStats {
        &self.stats
    }

    pub fn available_permits(&self) -> usize {
        self.pool.available_permits()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

impl<P: Serialize + Send + 'static> Throttle<P> {
    /// Throttle whose payloads are sent as JSON.
    pub fn with_json(config: ThrottleConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::new(config, transport, Arc::new(JsonSerializer))
    }
}

impl<P> Drop for Throttle<P> {
    fn drop(&mut self) {
        if let Some(handle) = self.lifecycle.get_mut().pacer.take() {
            handle.abort();
            self.queue.close();
            for item in self.queue.drain() {
                item.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures_util::future::join_all;
    use futures_util::FutureExt;
    use serde::ser::Error as _;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    use crate::transport::ApiResponse;

    /// Records call order and concurrency; answers after `delay`.
    #[derive(Default)]
    struct StubTransport {
        delay: Duration,
        fail: bool,
        current: AtomicUsize,
        peak: AtomicUsize,
        calls: parking_lot::Mutex<Vec<(Instant, String)>>,
    }

    impl StubTransport {
        fn with_delay(delay: Duration) -> Arc<Self> {
            Arc::new(Self { delay, ..Default::default() })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { fail: true, ..Default::default() })
        }

        fn bodies(&self) -> Vec<String> {
            self.calls.lock().iter().map(|(_, body)| body.clone()).collect()
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().iter().map(|(at, _)| *at).collect()
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn perform_call(
            &self,
            body: Vec<u8>,
            credential: &Credential,
        ) -> Result<ApiResponse> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls
                .lock()
                .push((Instant::now(), String::from_utf8_lossy(&body).into_owned()));

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.current.fetch_sub(1, Ordering::SeqCst);

            if self.fail {
                return Err(AppError::Transport("connection reset".into()));
            }
            Ok(ApiResponse {
                status: 200,
                body: format!("{}:{}", credential.expose(), String::from_utf8_lossy(&body)),
            })
        }
    }

    struct PanickingTransport;

    #[async_trait]
    impl Transport for PanickingTransport {
        async fn perform_call(
            &self,
            _body: Vec<u8>,
            _credential: &Credential,
        ) -> Result<ApiResponse> {
            panic!("transport bug");
        }
    }

    /// Refuses to encode odd numbers.
    struct EvenOnly;

    impl PayloadSerializer<u32> for EvenOnly {
        fn serialize(&self, payload: &u32) -> Result<Vec<u8>> {
            if payload % 2 == 1 {
                return Err(AppError::Encoding(serde_json::Error::custom("odd payload")));
            }
            Ok(payload.to_string().into_bytes())
        }
    }

    fn config(window_ms: u64, limit: u32) -> ThrottleConfig {
        ThrottleConfig::new(Duration::from_millis(window_ms), limit).unwrap()
    }

    async fn wait_for_admissions(throttle: &Throttle<u32>, count: u64) {
        while throttle.stats().admitted() < count {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_bound_thirty_items_five_per_second() {
        let transport = StubTransport::with_delay(Duration::ZERO);
        let start = Instant::now();
        let throttle = Throttle::<u32>::with_json(config(1000, 5), transport.clone()).unwrap();

        let handles: Vec<_> = (0..30).map(|n| throttle.submit(n, "token").unwrap()).collect();
        let results = join_all(handles).await;

        assert!(results.iter().all(|r| r.is_ok()));
        let times = transport.call_times();
        assert_eq!(times.len(), 30);

        let last = *times.last().unwrap() - start;
        let tick = Duration::from_millis(200);
        assert!(last >= Duration::from_secs(6) - 2 * tick, "admitted too fast: {:?}", last);
        assert!(last <= Duration::from_secs(6) + tick, "admitted too slow: {:?}", last);

        // Consecutive admissions never come closer than one pacing period.
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= tick);
        }
        assert!(transport.peak.load(Ordering::SeqCst) <= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_cap_with_slow_transport() {
        let transport = StubTransport::with_delay(Duration::from_millis(50));
        let throttle = Throttle::<u32>::with_json(config(20, 2), transport.clone()).unwrap();

        let handles: Vec<_> = (0..10).map(|n| throttle.submit(n, "token").unwrap()).collect();
        for result in join_all(handles).await {
            assert!(result.is_ok());
        }

        assert_eq!(transport.peak.load(Ordering::SeqCst), 2);
        assert_eq!(throttle.stats().peak_in_flight.load(Ordering::Relaxed), 2);
        assert_eq!(throttle.stats().admitted(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_admission_when_permits_available() {
        let transport = StubTransport::with_delay(Duration::ZERO);
        let throttle = Throttle::<u32>::with_json(config(100, 10), transport.clone()).unwrap();

        let handles: Vec<_> = (0..8).map(|n| throttle.submit(n, "token").unwrap()).collect();
        join_all(handles).await;

        let expected: Vec<String> = (0..8).map(|n| n.to_string()).collect();
        assert_eq!(transport.bodies(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_resolves_and_releases() {
        let transport = StubTransport::failing();
        let throttle = Throttle::<u32>::with_json(config(50, 5), transport).unwrap();

        let handles: Vec<_> = (0..5).map(|n| throttle.submit(n, "token").unwrap()).collect();
        for result in join_all(handles).await {
            assert!(matches!(result, Err(AppError::Transport(_))));
        }

        let report = throttle.shutdown(Duration::from_secs(1)).await;
        assert!(report.drained);
        assert_eq!(throttle.available_permits(), 5);
        assert_eq!(throttle.stats().failed.load(Ordering::Relaxed), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_encoding_failure_resolves_and_releases() {
        let transport = StubTransport::with_delay(Duration::ZERO);
        let throttle =
            Throttle::<u32>::new(config(40, 2), transport.clone(), Arc::new(EvenOnly)).unwrap();

        let handles: Vec<_> = (0..4).map(|n| throttle.submit(n, "token").unwrap()).collect();
        let results = join_all(handles).await;

        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(AppError::Encoding(_))));
        assert!(results[2].is_ok());
        assert!(matches!(results[3], Err(AppError::Encoding(_))));
        assert_eq!(transport.bodies(), vec!["0".to_string(), "2".to_string()]);

        throttle.shutdown(Duration::from_secs(1)).await;
        assert_eq!(throttle.available_permits(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_permit_leak_after_all_terminal() {
        let transport = StubTransport::with_delay(Duration::from_millis(30));
        let throttle = Throttle::<u32>::with_json(config(30, 3), transport).unwrap();

        let handles: Vec<_> = (0..12).map(|n| throttle.submit(n, "token").unwrap()).collect();
        join_all(handles).await;

        let report = throttle.shutdown(Duration::from_secs(1)).await;
        assert_eq!(report, ShutdownReport { drained: true, outstanding: 0, cancelled: 0 });
        assert_eq!(throttle.available_permits(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_first_tick_cancels_every_queued_item() {
        let transport = StubTransport::with_delay(Duration::from_millis(100));
        let throttle = Throttle::<u32>::with_json(config(1000, 5), transport.clone()).unwrap();

        // No await between submit and shutdown, so the pacer never ticks.
        let handles: Vec<_> = (0..3).map(|n| throttle.submit(n, "token").unwrap()).collect();
        let report = throttle.shutdown(Duration::from_secs(1)).await;

        assert_eq!(report, ShutdownReport { drained: true, outstanding: 0, cancelled: 3 });
        assert_eq!(throttle.stats().admitted(), 0);
        assert!(transport.bodies().is_empty());

        for handle in handles {
            let outcome = handle.now_or_never().expect("resolved before shutdown returned");
            assert!(matches!(outcome, Err(AppError::Cancelled)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_admitted_work() {
        let transport = StubTransport::with_delay(Duration::from_millis(100));
        let throttle = Throttle::<u32>::with_json(config(3, 3), transport).unwrap();

        let handles: Vec<_> = (0..3).map(|n| throttle.submit(n, "token").unwrap()).collect();
        wait_for_admissions(&throttle, 3).await;

        let report = throttle.shutdown(Duration::from_secs(1)).await;
        assert!(report.drained);
        assert_eq!(throttle.state(), LifecycleState::Stopped);

        for handle in handles {
            let response = handle.now_or_never().expect("resolved before shutdown returned");
            assert_eq!(response.unwrap().status, 200);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_timeout_cancels_queued_items() {
        let transport = StubTransport::with_delay(Duration::from_secs(10));
        let throttle = Throttle::<u32>::with_json(config(10, 1), transport).unwrap();

        let first = throttle.submit(0, "token").unwrap();
        let queued: Vec<_> = (1..3).map(|n| throttle.submit(n, "token").unwrap()).collect();
        wait_for_admissions(&throttle, 1).await;

        let report = throttle.shutdown(Duration::from_millis(100)).await;
        assert_eq!(report, ShutdownReport { drained: false, outstanding: 1, cancelled: 2 });
        assert_eq!(throttle.state(), LifecycleState::Stopped);

        for handle in queued {
            assert!(matches!(handle.await, Err(AppError::Cancelled)));
        }

        // The admitted call still completes and returns its permit.
        assert!(first.await.is_ok());
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(throttle.available_permits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_after_shutdown_is_closed() {
        let transport = StubTransport::with_delay(Duration::ZERO);
        let throttle = Throttle::<u32>::with_json(config(100, 5), transport).unwrap();

        let first = throttle.shutdown(Duration::from_secs(1)).await;
        assert!(matches!(throttle.submit(1, "token"), Err(AppError::Closed)));
        assert_eq!(throttle.stats().submitted.load(Ordering::Relaxed), 0);

        let second = throttle.shutdown(Duration::from_secs(1)).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_bounded_queue_rejects() {
        let config = config(60_000, 1).with_max_queue_depth(2);
        let transport = StubTransport::with_delay(Duration::ZERO);
        let throttle = Throttle::<u32>::with_json(config, transport).unwrap();

        // The pacer has not run yet, so nothing has left the queue.
        let _a = throttle.submit(0, "token").unwrap();
        let _b = throttle.submit(1, "token").unwrap();
        assert!(matches!(throttle.submit(2, "token"), Err(AppError::Rejected(2))));
        assert_eq!(throttle.stats().rejected.load(Ordering::Relaxed), 1);
        assert_eq!(throttle.stats().submitted.load(Ordering::Relaxed), 2);
        assert_eq!(throttle.queued(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_transport_still_releases_permit() {
        let throttle =
            Throttle::<u32>::with_json(config(10, 1), Arc::new(PanickingTransport)).unwrap();

        let handle = throttle.submit(0, "token").unwrap();
        assert!(matches!(handle.await, Err(AppError::Cancelled)));

        let report = throttle.shutdown(Duration::from_secs(1)).await;
        assert!(report.drained);
        assert_eq!(throttle.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_drop_without_shutdown_cancels_queue() {
        let transport = StubTransport::with_delay(Duration::ZERO);
        let throttle = Throttle::<u32>::with_json(config(60_000, 1), transport).unwrap();
        let handles: Vec<_> = (0..3).map(|n| throttle.submit(n, "token").unwrap()).collect();
        drop(throttle);

        for handle in handles {
            assert!(matches!(handle.await, Err(AppError::Cancelled)));
        }
    }

    #[test]
    fn test_requires_runtime() {
        let transport = StubTransport::with_delay(Duration::ZERO);
        let result = Throttle::<u32>::with_json(config(100, 1), transport);
        assert!(matches!(result, Err(AppError::Init(_))));
    }
}
