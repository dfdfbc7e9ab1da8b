pub mod json;
pub mod traits;

pub use json::JsonSerializer;
pub use traits::{ApiResponse, Credential, PayloadSerializer, Transport};
