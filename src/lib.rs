pub mod analytics;
pub mod config;
pub mod document;
pub mod error;
pub mod http;
pub mod limiter;
pub mod transport;
pub mod utils;

pub use document::Document;
pub use error::{AppError, Result};
pub use http::DocumentApiClient;
pub use limiter::{ResultHandle, ShutdownReport, Throttle, ThrottleConfig};
pub use transport::{ApiResponse, Credential};
