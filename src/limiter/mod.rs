//! Admission and pacing for outbound calls.
//!
//! Callers push work into a [`SubmissionQueue`]; a single [`PacingDriver`]
//! tick admits the head item whenever the [`PermitPool`] has room, and the
//! [`Dispatcher`] runs the call on its own task. The permit travels with the
//! call and is returned when its [`ResultHandle`] is resolved.

pub mod config;
pub mod dispatcher;
pub mod item;
pub mod pacer;
pub mod permits;
pub mod queue;
pub mod throttle;

pub use config::ThrottleConfig;
pub use dispatcher::Dispatcher;
pub use item::{ResultHandle, WorkItem};
pub use pacer::PacingDriver;
pub use permits::{Permit, PermitPool};
pub use queue::SubmissionQueue;
pub use throttle::{LifecycleState, ShutdownReport, Throttle};
