use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::transport::{ApiResponse, Credential};

/// A submitted call waiting for admission, or in flight after it.
#[derive(Debug)]
pub struct WorkItem<P> {
    pub id: Uuid,
    pub payload: P,
    pub credential: Credential,
    pub submitted_at: Instant,
    pub(crate) responder: Responder,
}

impl<P> WorkItem<P> {
    pub fn new(payload: P, credential: Credential) -> (Self, ResultHandle) {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();

        let item = Self {
            id,
            payload,
            credential,
            submitted_at: Instant::now(),
            responder: Responder(tx),
        };
        (item, ResultHandle { id, rx })
    }

    /// Resolve as `Cancelled` without ever dispatching.
    pub fn cancel(self) {
        self.responder.resolve(Err(AppError::Cancelled));
    }
}

/// Sending half of a `ResultHandle`. Consumed on use, so it resolves at most once.
#[derive(Debug)]
pub(crate) struct Responder(oneshot::Sender<Result<ApiResponse>>);

impl Responder {
    /// Returns `false` if the caller already dropped its handle.
    pub(crate) fn resolve(self, outcome: Result<ApiResponse>) -> bool {
        self.0.send(outcome).is_ok()
    }
}

/// Caller-side future for one submitted call.
///
/// Resolves to `AppError::Cancelled` if the item is dropped before it is
/// resolved (shutdown, runtime teardown, or a panicking transport).
#[derive(Debug)]
#[must_use = "a ResultHandle does nothing unless awaited"]
pub struct ResultHandle {
    id: Uuid,
    rx: oneshot::Receiver<Result<ApiResponse>>,
}

impl ResultHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Future for ResultHandle {
    type Output = Result<ApiResponse>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(AppError::Cancelled)))
    }
}
