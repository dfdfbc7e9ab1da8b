use std::time::Instant;
use chrono::Local;

pub fn now_instant() -> Instant {
    Instant::now()
}

pub fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Wall-clock timestamp in the `MM-dd-yyyy HH:mm:ss` form used in completion logs.
pub fn log_timestamp() -> String {
    Local::now().format("%m-%d-%Y %H:%M:%S").to_string()
}
