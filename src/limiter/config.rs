use std::time::Duration;
use crate::error::{AppError, Result};

/// Immutable throttling parameters, validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    window: Duration,
    request_limit: u32,
    max_queue_depth: Option<usize>,
}

impl ThrottleConfig {
    pub fn new(window: Duration, request_limit: u32) -> Result<Self> {
        if request_limit == 0 {
            return Err(AppError::InvalidConfig("request_limit must be greater than zero".into()));
        }
        if (window / request_limit).is_zero() {
            return Err(AppError::InvalidConfig(format!(
                "window {:?} is too short for {} requests",
                window, request_limit
            )));
        }

        Ok(Self {
            window,
            request_limit,
            max_queue_depth: None,
        })
    }

    /// Bound the submission queue; further submits fail with `Rejected`.
    pub fn with_max_queue_depth(mut self, depth: usize) -> Self {
        self.max_queue_depth = Some(depth);
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn request_limit(&self) -> u32 {
        self.request_limit
    }

    pub fn max_queue_depth(&self) -> Option<usize> {
        self.max_queue_depth
    }

    /// Interval between admission attempts: `window / request_limit`.
    pub fn pacing_period(&self) -> Duration {
        self.window / self.request_limit
    }
}
