use async_trait::async_trait;
use std::fmt;
use crate::error::Result;

/// Bearer token attached to a single call. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// Raw outcome of a call that reached the server, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send an already-serialized payload. Resolves exactly once; network and
    /// protocol failures come back as `AppError::Transport`.
    async fn perform_call(&self, body: Vec<u8>, credential: &Credential) -> Result<ApiResponse>;
}

pub trait PayloadSerializer<P>: Send + Sync {
    fn serialize(&self, payload: &P) -> Result<Vec<u8>>;
}
