pub mod stats;

pub use stats::ThrottleStats;
