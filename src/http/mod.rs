pub mod client;
pub mod pool;

pub use client::DocumentApiClient;
