use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::{AppError, Result};
use crate::http::pool::{create_http_client, HttpSettings};
use crate::transport::{ApiResponse, Credential, Transport};

/// POSTs serialized documents to the registration endpoint.
#[derive(Clone)]
pub struct DocumentApiClient {
    client: Client,
    endpoint: Url,
}

impl DocumentApiClient {
    pub fn new(endpoint: &str, settings: HttpSettings) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| AppError::Init(format!("Invalid API URL {}: {}", endpoint, e)))?;

        Ok(Self {
            client: create_http_client(settings)?,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for DocumentApiClient {
    async fn perform_call(&self, body: Vec<u8>, credential: &Credential) -> Result<ApiResponse> {
        let response = self.client.post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", credential.expose()))
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("Request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response.text().await
            .map_err(|e| AppError::Transport(format!("Body error: {}", e)))?;

        debug!("Registration endpoint answered {}", status);
        Ok(ApiResponse { status, body })
    }
}
