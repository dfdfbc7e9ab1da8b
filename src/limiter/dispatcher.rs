use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::analytics::ThrottleStats;
use crate::error::Result;
use crate::limiter::item::{Responder, WorkItem};
use crate::limiter::permits::Permit;
use crate::transport::{ApiResponse, PayloadSerializer, Transport};
use crate::utils::time::{elapsed_ms, log_timestamp, now_instant};

/// Turns admitted items into transport calls, one spawned task per item.
pub struct Dispatcher<P> {
    transport: Arc<dyn Transport>,
    serializer: Arc<dyn PayloadSerializer<P>>,
    stats: Arc<ThrottleStats>,
}

impl<P: Send + 'static> Dispatcher<P> {
    pub fn new(
        transport: Arc<dyn Transport>,
        serializer: Arc<dyn PayloadSerializer<P>>,
        stats: Arc<ThrottleStats>,
    ) -> Self {
        Self {
            transport,
            serializer,
            stats,
        }
    }

    /// Spawn the call for an admitted item. Returns without waiting on the network.
    pub fn dispatch(&self, item: WorkItem<P>, permit: Permit) {
        self.stats.record_admission(permit.pool().in_flight());

        let WorkItem {
            id,
            payload,
            credential,
            submitted_at,
            responder,
        } = item;
        debug!(item = %id, queued_ms = elapsed_ms(submitted_at), "Admitted");

        let transport = Arc::clone(&self.transport);
        let serializer = Arc::clone(&self.serializer);
        let stats = Arc::clone(&self.stats);

        tokio::spawn(
            async move {
                let started = now_instant();
                // Encoding failures take the same completion path as transport failures.
                let encoded = serializer.serialize(&payload);
                drop(payload);
                let outcome = match encoded {
                    Ok(body) => transport.perform_call(body, &credential).await,
                    Err(e) => Err(e),
                };
                complete(id, outcome, responder, permit, &stats, started);
            }
            .instrument(info_span!("dispatch", item = %id)),
        );
    }
}

/// Single completion point for an admitted item: resolve its handle, then
/// return its permit. The permit guard releases even if resolving unwinds.
fn complete(
    id: Uuid,
    outcome: Result<ApiResponse>,
    responder: Responder,
    permit: Permit,
    stats: &ThrottleStats,
    started: Instant,
) {
    let latency = elapsed_ms(started);
    stats.update_call_latency(latency);

    match &outcome {
        Ok(response) => {
            stats.inc_succeeded();
            info!(
                "Response: {{Item: {}, Time: {}, Status: {}, Latency: {}ms}}",
                id,
                log_timestamp(),
                response.status,
                latency
            );
        }
        Err(e) => {
            stats.inc_failed();
            warn!("Call for item {} failed after {}ms: {}", id, latency, e);
        }
    }

    if !responder.resolve(outcome) {
        debug!(item = %id, "Caller dropped its handle before completion");
    }
    drop(permit);
}
