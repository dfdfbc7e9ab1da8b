use serde::Serialize;
use crate::error::Result;
use crate::transport::PayloadSerializer;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl<P: Serialize> PayloadSerializer<P> for JsonSerializer {
    fn serialize(&self, payload: &P) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(payload)?)
    }
}
